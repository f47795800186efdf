//! An in-memory [`OutputDriver`] for asserting on what the output manager
//! actually distributed, without a real hardware or network sink attached.

use crate::errors::PlayoutError;
use crate::frame::Size;
use crate::output::driver::OutputDriver;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct RecordedFrame {
    pub fill: Vec<u8>,
    pub key: Option<Vec<u8>>,
}

#[derive(Clone)]
pub struct TestSink {
    name: Arc<str>,
    needs_key: bool,
    frames: Arc<Mutex<Vec<RecordedFrame>>>,
    fail_always: Arc<Mutex<bool>>,
    failed_attempts: Arc<Mutex<u32>>,
    destroyed: Arc<Mutex<bool>>,
}

impl TestSink {
    pub fn new(name: impl Into<Arc<str>>, needs_key: bool) -> Self {
        Self {
            name: name.into(),
            needs_key,
            frames: Arc::new(Mutex::new(Vec::new())),
            fail_always: Arc::new(Mutex::new(false)),
            failed_attempts: Arc::new(Mutex::new(0)),
            destroyed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail_always.lock().unwrap() = failing;
    }

    /// Total number of `send_frame` calls that returned `Err`. Since the
    /// output manager stops calling a sink once it disables it, this
    /// plateaus at the removal threshold rather than growing without bound.
    pub fn failed_attempts(&self) -> u32 {
        *self.failed_attempts.lock().unwrap()
    }

    pub fn destroyed(&self) -> bool {
        *self.destroyed.lock().unwrap()
    }
}

impl OutputDriver for TestSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn needs_key(&self) -> bool {
        self.needs_key
    }

    fn send_frame(&mut self, fill: &[u8], key: Option<&[u8]>, size: Size) -> Result<(), PlayoutError> {
        if *self.fail_always.lock().unwrap() {
            *self.failed_attempts.lock().unwrap() += 1;
            return Err(PlayoutError::SurfaceRejected("test sink forced failure".into()));
        }
        if fill.len() != size.byte_len() {
            return Err(PlayoutError::BufferSizeMismatch(fill.len(), size.byte_len()));
        }
        self.frames.lock().unwrap().push(RecordedFrame { fill: fill.to_vec(), key: key.map(|k| k.to_vec()) });
        Ok(())
    }

    fn destroy(&mut self) {
        *self.destroyed.lock().unwrap() = true;
    }
}
