//! Black-burst idle filler (§4.8): the frame source the output path runs
//! while no real content has ever been produced, so downstream hardware
//! always sees a clean, ticking signal rather than silence.

use crate::frame::{OwnedFrame, Size};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// An opaque black BGRA frame at `size`, full alpha.
pub fn black_frame(size: Size) -> OwnedFrame {
    let mut buffer = vec![0u8; size.byte_len()];
    for px in buffer.chunks_exact_mut(4) {
        px[3] = 0xFF;
    }
    OwnedFrame { buffer, width: size.width, height: size.height }
}

/// Ticks a static black frame into a callback at `frame_rate`, standing in
/// for a real signal while the Engine is Idle. `start`/`stop` are idempotent
/// so callers can drive this straight off `EngineEvent::StateChanged`
/// without tracking whether it's already running.
pub struct BlackBurst {
    frame: OwnedFrame,
    frame_rate: u32,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BlackBurst {
    pub fn new(size: Size, frame_rate: u32) -> Self {
        Self { frame: black_frame(size), frame_rate, running: Arc::new(AtomicBool::new(false)), task: Mutex::new(None) }
    }

    /// Spawn the ticking task if it isn't already running. A second call
    /// while running is a no-op.
    pub fn start(&self, callback: impl Fn(OwnedFrame) + Send + 'static) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return;
        }
        if self.frame_rate == 0 {
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let frame = self.frame.clone();
        let period = std::time::Duration::from_secs_f64(1.0 / self.frame_rate as f64);
        *task = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            while running.load(Ordering::SeqCst) {
                tick.tick().await;
                callback(frame.clone());
            }
        }));
    }

    /// Stop the ticking task if one is running. A call while already
    /// stopped is a no-op.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().unwrap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_frame_is_opaque_black() {
        let frame = black_frame(Size::new(2, 2));
        assert_eq!(frame.buffer.len(), 16);
        assert!(frame.buffer.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let burst = BlackBurst::new(Size::new(2, 2), 1000);
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c1 = count.clone();
        burst.start(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        assert!(burst.is_running());
        // Second start must not spawn a competing task.
        burst.start(|_| panic!("second start callback must never run"));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        burst.stop();
        assert!(!burst.is_running());
        assert!(count.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let burst = BlackBurst::new(Size::new(2, 2), 60);
        burst.stop();
        assert!(!burst.is_running());
    }
}
