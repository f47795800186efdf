//! As-run log (§4.8, §6.3): an append-only, daily-rotated JSONL record of
//! everything that happened to the Engine, independent of whether any
//! control client was connected to see it.

use crate::engine::{EngineEvent, SurfaceSlot};
use log::{error, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

/// One line of the as-run trail. `event` is drawn from a closed set: `load`,
/// `take`, `clear`, `freeze`, `unfreeze`, `update`, `updatePgm`, `error`,
/// `crash-recovery`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsRunEntry {
    timestamp: String,
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AsRunEntry {
    pub fn new(event: &'static str) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            event,
            template_id: None,
            template_name: None,
            variables: None,
            duration_ms: None,
            details: None,
        }
    }

    pub fn template_id(mut self, id: impl Into<String>) -> Self {
        self.template_id = Some(id.into());
        self
    }

    pub fn template_name(mut self, name: impl Into<String>) -> Self {
        self.template_name = Some(name.into());
        self
    }

    pub fn variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn date(&self) -> Option<time::Date> {
        OffsetDateTime::parse(&self.timestamp, &Rfc3339).ok().map(|t| t.date())
    }
}

/// Tails the Engine event bus and appends one JSON object per line to
/// `<dir>/as-run-YYYY-MM-DD.jsonl`, opening a new file at each UTC day
/// boundary. A write failure is logged and the entry is dropped — the
/// playout path never blocks or fails on log I/O (§10.2).
pub struct AsRunLog {
    dir: PathBuf,
    events: broadcast::Receiver<EngineEvent>,
}

impl AsRunLog {
    pub fn new(dir: impl Into<PathBuf>, events: broadcast::Receiver<EngineEvent>) -> Self {
        Self { dir: dir.into(), events }
    }

    pub async fn run(mut self) {
        let mut current_date: Option<time::Date> = None;
        let mut file: Option<tokio::fs::File> = None;

        loop {
            let event = match self.events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("as-run log lagged {n} events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let Some(entry) = entry_for_event(&event) else { continue };
            let date = entry.date().unwrap_or_else(|| OffsetDateTime::now_utc().date());
            if current_date != Some(date) {
                match open_for_date(&self.dir, date).await {
                    Ok(f) => {
                        file = Some(f);
                        current_date = Some(date);
                    }
                    Err(e) => {
                        error!("as-run log could not open file for {date}: {e}");
                        continue;
                    }
                }
            }

            let Some(f) = file.as_mut() else { continue };
            if let Err(e) = write_entry(f, &entry).await {
                error!("as-run log write failed: {e}");
            }
        }
    }
}

async fn open_for_date(dir: &Path, date: time::Date) -> std::io::Result<tokio::fs::File> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("as-run-{date}.jsonl"));
    OpenOptions::new().create(true).append(true).open(path).await
}

async fn write_entry(file: &mut tokio::fs::File, entry: &AsRunEntry) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(entry).unwrap_or_default();
    bytes.push(b'\n');
    file.write_all(&bytes).await
}

/// Cheaply-cloneable writer for as-run entries generated outside the main
/// event-driven loop (crash recovery). Reopens the day's file fresh on every
/// write rather than caching a handle — these writes are rare enough that
/// the per-write open cost doesn't matter.
#[derive(Clone)]
pub struct AsRunWriter {
    dir: PathBuf,
}

impl AsRunWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn write(&self, entry: AsRunEntry) {
        let date = entry.date().unwrap_or_else(|| OffsetDateTime::now_utc().date());
        match open_for_date(&self.dir, date).await {
            Ok(mut f) => {
                if let Err(e) = write_entry(&mut f, &entry).await {
                    error!("as-run log write failed: {e}");
                }
            }
            Err(e) => error!("as-run log could not open file for {date}: {e}"),
        }
    }
}

/// Maps an Engine event onto the closed as-run vocabulary. `None` means the
/// event has no as-run entry of its own — `StateChanged` and the mix-in-
/// flight events are reflected by the `take`/`clear` entries that cause
/// them, not logged separately.
fn entry_for_event(event: &EngineEvent) -> Option<AsRunEntry> {
    match event {
        EngineEvent::Loaded { template_id } => {
            let mut entry = AsRunEntry::new("load");
            if let Some(id) = template_id {
                entry = entry.template_id(id.clone());
            }
            Some(entry)
        }
        EngineEvent::TookAir => Some(AsRunEntry::new("take")),
        EngineEvent::MixCompleted => Some(AsRunEntry::new("take").details("via mix")),
        EngineEvent::MixStarted { .. } | EngineEvent::MixCancelled => None,
        EngineEvent::Cleared => Some(AsRunEntry::new("clear")),
        EngineEvent::FreezeChanged { frozen: true } => Some(AsRunEntry::new("freeze")),
        EngineEvent::FreezeChanged { frozen: false } => Some(AsRunEntry::new("unfreeze")),
        EngineEvent::Updated { surface: SurfaceSlot::Pvw, variables } => {
            Some(AsRunEntry::new("update").variables(variables.clone()))
        }
        EngineEvent::Updated { surface: SurfaceSlot::Pgm, variables } => {
            Some(AsRunEntry::new("updatePgm").variables(variables.clone()))
        }
        EngineEvent::SurfaceFailure { surface, reason } => {
            Some(AsRunEntry::new("error").details(format!("{surface:?}: {reason}")))
        }
        EngineEvent::StateChanged { .. } | EngineEvent::EngineShutdown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_one_jsonl_line_per_event() {
        let dir = tempdir().unwrap();
        let (tx, rx) = broadcast::channel(8);
        let log = AsRunLog::new(dir.path(), rx);
        let handle = tokio::spawn(log.run());

        tx.send(EngineEvent::TookAir).unwrap();
        tx.send(EngineEvent::Cleared).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(tx);
        let _ = handle.await;

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let file = entries.next_entry().await.unwrap().expect("log file written");
        let contents = tokio::fs::read_to_string(file.path()).await.unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"take\""));
        assert!(lines[1].contains("\"clear\""));
    }

    #[tokio::test]
    async fn state_changed_produces_no_entry() {
        let dir = tempdir().unwrap();
        let (tx, rx) = broadcast::channel(8);
        let log = AsRunLog::new(dir.path(), rx);
        let handle = tokio::spawn(log.run());

        tx.send(EngineEvent::StateChanged { state: crate::engine::EngineState::Idle }).unwrap();
        tx.send(EngineEvent::Cleared).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(tx);
        let _ = handle.await;

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let file = entries.next_entry().await.unwrap().expect("log file written");
        let contents = tokio::fs::read_to_string(file.path()).await.unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn writer_produces_crash_recovery_entry() {
        let dir = tempdir().unwrap();
        let writer = AsRunWriter::new(dir.path());
        writer.write(AsRunEntry::new("crash-recovery").details("pgm: renderer gone")).await;

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let file = entries.next_entry().await.unwrap().expect("log file written");
        let contents = tokio::fs::read_to_string(file.path()).await.unwrap();
        assert!(contents.contains("\"crash-recovery\""));
        assert!(contents.contains("renderer gone"));
    }
}
