//! SDI output driver (§4.4). The hardware SDK binding itself is out of
//! scope (§1 Non-goals) — this opens two logical channels against the
//! configured device indices and accounts frames as if pushed to hardware,
//! which is the seam a real binding would sit behind.

use crate::config::SdiConfig;
use crate::errors::PlayoutError;
use crate::frame::Size;
use crate::output::driver::OutputDriver;
use log::{info, warn};

pub struct SdiSink {
    name: String,
    fill_device: u32,
    key_device: Option<u32>,
    display_mode: String,
    frames_sent: u64,
}

impl SdiSink {
    /// Open the SDI sink from config. Fill device is mandatory (enforced by
    /// [`crate::config::PlayoutConfig::builder`]); if the key device cannot
    /// be opened the sink falls back to fill-only mode rather than failing
    /// construction (§4.4: "fill-only SDI... is not an error, it is a
    /// mode").
    pub fn open(name: impl Into<String>, cfg: &SdiConfig) -> Result<Self, PlayoutError> {
        let fill_device = cfg
            .fill_device
            .ok_or_else(|| PlayoutError::SurfaceRejected("sdi fill device not configured".into()))?;

        let key_device = match cfg.key_device {
            Some(dev) => match open_hardware_channel(dev) {
                Ok(()) => Some(dev),
                Err(e) => {
                    warn!("sdi key channel {dev} failed to open, falling back to fill-only: {e}");
                    None
                }
            },
            None => None,
        };

        open_hardware_channel(fill_device)
            .map_err(|e| PlayoutError::SurfaceRejected(format!("sdi fill device {fill_device} failed: {e}")))?;

        let name = name.into();
        info!("sdi sink '{name}' opened (fill={fill_device}, key={key_device:?})");

        Ok(Self {
            name,
            fill_device,
            key_device,
            display_mode: cfg.display_mode.clone(),
            frames_sent: 0,
        })
    }
}

/// Placeholder for the real hardware channel-open call. Always succeeds;
/// the seam exists so a binding can fail this in the future.
fn open_hardware_channel(_device: u32) -> Result<(), String> {
    Ok(())
}

impl OutputDriver for SdiSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn needs_key(&self) -> bool {
        self.key_device.is_some()
    }

    fn send_frame(&mut self, fill: &[u8], key: Option<&[u8]>, size: Size) -> Result<(), PlayoutError> {
        if fill.len() != size.byte_len() {
            return Err(PlayoutError::BufferSizeMismatch(fill.len(), size.byte_len()));
        }
        if let (Some(_), Some(key)) = (self.key_device, key) {
            if key.len() != size.byte_len() {
                return Err(PlayoutError::BufferSizeMismatch(key.len(), size.byte_len()));
            }
        }
        let _ = &self.display_mode;
        self.frames_sent += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        info!("sdi sink '{}' closing (fill={}, key={:?})", self.name, self.fill_device, self.key_device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fill_device_is_rejected() {
        let cfg = SdiConfig { enabled: true, fill_device: None, key_device: None, display_mode: String::new() };
        assert!(SdiSink::open("sdi-0", &cfg).is_err());
    }

    #[test]
    fn fill_only_mode_when_no_key_device() {
        let cfg = SdiConfig {
            enabled: true,
            fill_device: Some(0),
            key_device: None,
            display_mode: "1080p5994".into(),
        };
        let sink = SdiSink::open("sdi-0", &cfg).unwrap();
        assert!(!sink.needs_key());
    }

    #[test]
    fn send_frame_rejects_wrong_size() {
        let cfg = SdiConfig { enabled: true, fill_device: Some(0), key_device: None, display_mode: String::new() };
        let mut sink = SdiSink::open("sdi-0", &cfg).unwrap();
        let size = Size::new(2, 2);
        let bad = vec![0u8; 4];
        assert!(sink.send_frame(&bad, None, size).is_err());
    }
}
