//! Frame capture pacing (§4.2): decouples the rendering surface's paint
//! callback (the producer) from a fixed-rate consumer tick.
//!
//! The producer never blocks — paints are pushed into a bounded channel with
//! `try_send`, and a full channel means the paint is dropped, not queued.
//! The consumer runs on its own `tokio::time::interval` at the configured
//! frame rate, always forwarding the most recently received frame rather
//! than draining history, so a burst of paints collapses into one tick.

use crate::engine::CapturedPaint;
use crate::frame::{CaptureStats, OwnedFrame};
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// Bound on the producer→consumer paint channel. Small and deliberate: a
/// backlog means the consumer is behind, and we want that to show up as
/// drops in [`CaptureStats`], not as growing latency.
pub const PAINT_CHANNEL_CAPACITY: usize = 4;

/// Invoked at 2x frame rate to force the surface to repaint even when its
/// content is static (§4.2). Decoupled from the Engine command channel so
/// this module doesn't need to know about `EngineCommand`/`EngineHandle` —
/// the caller that owns both Engine and Capture supplies the closure.
pub type InvalidateCallback = Box<dyn Fn() + Send>;

/// Cheaply-cloneable handle to toggle a running [`FrameCapture`]'s freeze
/// state. [`FrameCapture::run`] consumes the struct, so this is the only way
/// to flip `frozen` once the pacing task is spawned.
#[derive(Clone)]
pub struct FreezeHandle(Arc<AtomicBool>);

impl FreezeHandle {
    pub fn set(&self, frozen: bool) {
        self.0.store(frozen, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Paces paints from one rendering surface into a stream of owned frames at
/// a fixed rate, publishing the latest frame via a `watch` channel and
/// rolling [`CaptureStats`] once a second.
pub struct FrameCapture {
    paint_rx: mpsc::Receiver<CapturedPaint>,
    frame_rate: u32,
    frame_tx: watch::Sender<Option<OwnedFrame>>,
    stats_tx: watch::Sender<CaptureStats>,
    frozen: Arc<AtomicBool>,
    invalidate: InvalidateCallback,
}

impl FrameCapture {
    pub fn new(paint_rx: mpsc::Receiver<CapturedPaint>, frame_rate: u32, invalidate: InvalidateCallback) -> Self {
        let (frame_tx, _) = watch::channel(None);
        let (stats_tx, _) = watch::channel(CaptureStats::default());
        Self { paint_rx, frame_rate, frame_tx, stats_tx, frozen: Arc::new(AtomicBool::new(false)), invalidate }
    }

    /// Subscribe to the latest ticked frame.
    pub fn subscribe_frames(&self) -> watch::Receiver<Option<OwnedFrame>> {
        self.frame_tx.subscribe()
    }

    /// Subscribe to the once-a-second capture stats.
    pub fn subscribe_stats(&self) -> watch::Receiver<CaptureStats> {
        self.stats_tx.subscribe()
    }

    /// A handle that can flip the freeze flag after `run` has been spawned.
    pub fn freeze_handle(&self) -> FreezeHandle {
        FreezeHandle(self.frozen.clone())
    }

    /// Run the pacing loop until the paint channel closes. Intended to be
    /// spawned as its own task per surface.
    pub async fn run(mut self) {
        if self.frame_rate == 0 {
            warn!("frame capture started with frame_rate=0, exiting immediately");
            return;
        }
        let period = Duration::from_secs_f64(1.0 / self.frame_rate as f64);
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut stats_tick = tokio::time::interval(Duration::from_secs(1));
        stats_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut invalidate_tick = tokio::time::interval(period / 2);
        invalidate_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut pending: Option<CapturedPaint> = None;
        let mut stats = CaptureStats::default();
        let mut frames_this_second: u64 = 0;

        loop {
            tokio::select! {
                maybe_paint = self.paint_rx.recv() => {
                    match maybe_paint {
                        Some(paint) => {
                            if pending.is_some() {
                                stats.dropped += 1;
                            }
                            pending = Some(paint);
                        }
                        None => break,
                    }
                }
                _ = tick.tick() => {
                    if self.frozen.load(Ordering::SeqCst) {
                        continue;
                    }
                    if let Some(paint) = pending.take() {
                        let mut owned = OwnedFrame::default();
                        owned.width = paint.width;
                        owned.height = paint.height;
                        owned.buffer = paint.buffer;
                        stats.total_frames += 1;
                        frames_this_second += 1;
                        let _ = self.frame_tx.send(Some(owned));
                    }
                }
                _ = stats_tick.tick() => {
                    stats.fps = frames_this_second as f32;
                    frames_this_second = 0;
                    let _ = self.stats_tx.send(stats);
                }
                _ = invalidate_tick.tick() => {
                    (self.invalidate)();
                }
            }
        }
    }

    /// Suspend (or resume) the pacing tick before `run` takes ownership.
    /// Once spawned, use [`FrameCapture::freeze_handle`] instead.
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen.store(frozen, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::DirtyRect;
    use std::time::Instant;

    fn paint(w: u32, h: u32) -> CapturedPaint {
        CapturedPaint {
            buffer: vec![0u8; (w * h * 4) as usize],
            width: w,
            height: h,
            dirty: DirtyRect { x: 0, y: 0, width: w, height: h },
            timestamp: Instant::now(),
        }
    }

    #[tokio::test]
    async fn ticks_forward_latest_paint() {
        let (tx, rx) = mpsc::channel(PAINT_CHANNEL_CAPACITY);
        let capture = FrameCapture::new(rx, 1000, Box::new(|| {}));
        let mut frames = capture.subscribe_frames();
        let handle = tokio::spawn(capture.run());

        tx.send(paint(4, 4)).await.unwrap();
        frames.changed().await.unwrap();
        let frame = frames.borrow().clone().expect("frame ticked");
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 4);

        drop(tx);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn burst_of_paints_drops_without_blocking() {
        let (tx, rx) = mpsc::channel(PAINT_CHANNEL_CAPACITY);
        let capture = FrameCapture::new(rx, 30, Box::new(|| {}));
        let mut stats = capture.subscribe_stats();
        let handle = tokio::spawn(capture.run());

        for _ in 0..20 {
            let _ = tx.try_send(paint(2, 2));
        }
        drop(tx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = handle.await;
        let final_stats = *stats.borrow_and_update();
        assert!(final_stats.dropped > 0 || final_stats.total_frames > 0);
    }

    #[tokio::test]
    async fn freeze_handle_holds_last_ticked_buffer() {
        let (tx, rx) = mpsc::channel(PAINT_CHANNEL_CAPACITY);
        let capture = FrameCapture::new(rx, 200, Box::new(|| {}));
        let mut frames = capture.subscribe_frames();
        let freeze = capture.freeze_handle();
        let handle = tokio::spawn(capture.run());

        tx.send(paint(2, 2)).await.unwrap();
        frames.changed().await.unwrap();
        let held = frames.borrow().clone().expect("frame ticked");

        freeze.set(true);
        for _ in 0..5 {
            let _ = tx.try_send(paint(2, 2));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!frames.has_changed().unwrap(), "frozen capture must not re-tick a new frame");
        assert_eq!(frames.borrow().clone().unwrap().buffer, held.buffer);

        drop(tx);
        let _ = handle.await;
    }
}
