//! NDI output driver (§4.4): single BGRA stream with native alpha, no
//! separate key channel. The network SDK binding is out of scope (§1
//! Non-goals); this accounts frames as `{width, height, stride, frameRate,
//! fourCC=BGRA}` the way a real sender would.

use crate::config::NdiConfig;
use crate::errors::PlayoutError;
use crate::frame::Size;
use crate::output::driver::OutputDriver;
use log::info;

pub struct NdiSink {
    name: String,
    sender_name: String,
    frame_rate: u32,
    frames_sent: u64,
}

impl NdiSink {
    pub fn open(name: impl Into<String>, cfg: &NdiConfig, frame_rate: u32) -> Result<Self, PlayoutError> {
        if cfg.sender_name.is_empty() {
            return Err(PlayoutError::SurfaceRejected("ndi sender name not configured".into()));
        }
        let name = name.into();
        info!("ndi sink '{name}' opened as sender '{}'", cfg.sender_name);
        Ok(Self { name, sender_name: cfg.sender_name.clone(), frame_rate, frames_sent: 0 })
    }
}

impl OutputDriver for NdiSink {
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
        let _stride = size.width * 4;
        let _ = (&self.sender_name, self.frame_rate);
        self.frames_sent += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        info!("ndi sink '{}' closing sender '{}'", self.name, self.sender_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sender_name_rejected() {
        let cfg = NdiConfig { enabled: true, sender_name: String::new() };
        assert!(NdiSink::open("ndi-0", &cfg, 60).is_err());
    }

    #[test]
    fn needs_key_is_always_false() {
        let cfg = NdiConfig { enabled: true, sender_name: "Playout".into() };
        let sink = NdiSink::open("ndi-0", &cfg, 60).unwrap();
        assert!(!sink.needs_key());
    }
}
