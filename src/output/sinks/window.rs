//! On-screen window output driver (§4.4): full-screen preview on a given
//! display index. The windowing toolkit binding is out of scope (§1 Non-
//! goals; the rendering engine and its host window are external
//! collaborators) — this tracks the frames a real preview window would
//! blit.

use crate::errors::PlayoutError;
use crate::frame::Size;
use crate::output::driver::OutputDriver;
use log::info;

/// What a window sink displays. An alpha-monitor window previews the key
/// signal rather than the program fill — the output manager is responsible
/// for routing the right buffer into `send_frame`'s `fill` parameter based
/// on this role; the driver itself is agnostic to what it's handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRole {
    Fill,
    AlphaMonitor,
}

pub struct WindowSink {
    name: String,
    monitor: i32,
    role: WindowRole,
    frames_shown: u64,
}

impl WindowSink {
    pub fn open(name: impl Into<String>, monitor: i32, role: WindowRole) -> Result<Self, PlayoutError> {
        if monitor < 0 {
            return Err(PlayoutError::SurfaceRejected("window monitor index disabled".into()));
        }
        let name = name.into();
        info!("window sink '{name}' opened on monitor {monitor} ({role:?})");
        Ok(Self { name, monitor, role, frames_shown: 0 })
    }

    pub fn role(&self) -> WindowRole {
        self.role
    }
}

impl OutputDriver for WindowSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn needs_key(&self) -> bool {
        false
    }

    fn send_frame(&mut self, fill: &[u8], _key: Option<&[u8]>, size: Size) -> Result<(), PlayoutError> {
        if fill.len() != size.byte_len() {
            return Err(PlayoutError::BufferSizeMismatch(fill.len(), size.byte_len()));
        }
        let _ = self.monitor;
        self.frames_shown += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        info!("window sink '{}' closing on monitor {} ({:?})", self.name, self.monitor, self.role);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_monitor_rejected() {
        assert!(WindowSink::open("rgb", -1, WindowRole::Fill).is_err());
    }

    #[test]
    fn enabled_monitor_opens() {
        let sink = WindowSink::open("rgb", 0, WindowRole::Fill).unwrap();
        assert_eq!(sink.role(), WindowRole::Fill);
    }
}
