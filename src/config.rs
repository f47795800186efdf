//! Playout service configuration.
//!
//! [`PlayoutConfig`] collects every option an embedder can recognize (§6.4 of
//! the design): control channel, health endpoint, output frame rate and
//! resolution, monitor/window output selection, and the SDI/NDI sink
//! configuration groups. Use [`PlayoutConfig::default`] for sensible
//! defaults, or [`PlayoutConfig::builder`] for a fluent, validated builder —
//! the same shape as the rendering engine's own engine-wide config.
//!
//! # Examples
//!
//! ```rust
//! use playout_engine::config::PlayoutConfig;
//!
//! let cfg = PlayoutConfig::default();
//! assert_eq!(cfg.frame_rate, 60);
//! ```
//!
//! ```rust
//! use playout_engine::config::{PlayoutConfig, Resolution};
//!
//! let cfg = PlayoutConfig::builder()
//!     .frame_rate(50)
//!     .resolution(Resolution { width: 1920, height: 1080 })
//!     .control_port(9000)
//!     .health_port(9001)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(cfg.control_port, 9000);
//! ```

use crate::errors::ConfigError;
use std::path::PathBuf;

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self { width: 1920, height: 1080 }
    }
}

/// SDI sink configuration group.
#[derive(Debug, Clone, Default)]
pub struct SdiConfig {
    pub enabled: bool,
    /// Hardware device index for the fill channel.
    pub fill_device: Option<u32>,
    /// Hardware device index for the key channel. `None` forces fill-only
    /// mode even when `enabled`.
    pub key_device: Option<u32>,
    /// Display mode string understood by the hardware driver (e.g.
    /// `"1080p5994"`). Opaque to the core.
    pub display_mode: String,
}

/// NDI sink configuration group.
#[derive(Debug, Clone, Default)]
pub struct NdiConfig {
    pub enabled: bool,
    pub sender_name: String,
}

/// Global playout service configuration.
#[derive(Debug, Clone)]
pub struct PlayoutConfig {
    /// Listen port for the persistent control channel.
    pub control_port: u16,
    /// Non-empty enforces token auth on control-channel connect.
    pub control_auth_token: Option<String>,
    /// Listen port for the health endpoint. `0` disables it.
    pub health_port: u16,
    /// Target output frame rate for Capture and BlackBurst.
    pub frame_rate: u32,
    /// Surface and output frame size.
    pub resolution: Resolution,
    /// Display index for the fill (RGB) window output; `-1` disables it.
    pub rgb_monitor: i32,
    /// Display index for the alpha-monitoring window output; `-1` disables
    /// it.
    pub alpha_monitor: i32,
    pub sdi: SdiConfig,
    pub ndi: NdiConfig,
    /// Ceiling in bytes for the template cache, an external collaborator
    /// (§1); carried here so an embedder that owns a cache can read it back.
    pub cache_max_bytes: u64,
    /// Directory the as-run log rotates its daily JSONL files into.
    pub as_run_dir: PathBuf,
}

impl Default for PlayoutConfig {
    fn default() -> Self {
        Self {
            control_port: 8787,
            control_auth_token: None,
            health_port: 8788,
            frame_rate: 60,
            resolution: Resolution::default(),
            rgb_monitor: -1,
            alpha_monitor: -1,
            sdi: SdiConfig::default(),
            ndi: NdiConfig::default(),
            cache_max_bytes: 256 * 1024 * 1024,
            as_run_dir: PathBuf::from("as-run"),
        }
    }
}

impl PlayoutConfig {
    /// Start building a [`PlayoutConfig`] from defaults using a fluent
    /// builder.
    pub fn builder() -> PlayoutConfigBuilder {
        PlayoutConfigBuilder::default()
    }
}

/// Fluent, validating builder for [`PlayoutConfig`].
#[derive(Debug, Clone)]
pub struct PlayoutConfigBuilder {
    inner: PlayoutConfig,
}

impl Default for PlayoutConfigBuilder {
    fn default() -> Self {
        Self { inner: PlayoutConfig::default() }
    }
}

impl PlayoutConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut PlayoutConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn control_port(self, port: u16) -> Self {
        self.map(|c| c.control_port = port)
    }

    pub fn control_auth_token<S: Into<String>>(self, token: S) -> Self {
        self.map(|c| c.control_auth_token = Some(token.into()))
    }

    pub fn health_port(self, port: u16) -> Self {
        self.map(|c| c.health_port = port)
    }

    pub fn frame_rate(self, fps: u32) -> Self {
        self.map(|c| c.frame_rate = fps)
    }

    pub fn resolution(self, res: Resolution) -> Self {
        self.map(|c| c.resolution = res)
    }

    pub fn rgb_monitor(self, index: i32) -> Self {
        self.map(|c| c.rgb_monitor = index)
    }

    pub fn alpha_monitor(self, index: i32) -> Self {
        self.map(|c| c.alpha_monitor = index)
    }

    pub fn sdi(self, sdi: SdiConfig) -> Self {
        self.map(|c| c.sdi = sdi)
    }

    pub fn ndi(self, ndi: NdiConfig) -> Self {
        self.map(|c| c.ndi = ndi)
    }

    pub fn cache_max_bytes(self, bytes: u64) -> Self {
        self.map(|c| c.cache_max_bytes = bytes)
    }

    pub fn as_run_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.map(|c| c.as_run_dir = dir.into())
    }

    /// Validate and build the final [`PlayoutConfig`].
    pub fn build(self) -> Result<PlayoutConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

fn validate(c: &PlayoutConfig) -> Result<(), ConfigError> {
    if c.frame_rate == 0 {
        return Err(ConfigError::InvalidFrameRate(c.frame_rate));
    }
    if c.resolution.width == 0 || c.resolution.height == 0 {
        return Err(ConfigError::InvalidResolution(c.resolution.width, c.resolution.height));
    }
    if c.sdi.enabled && c.sdi.fill_device.is_none() {
        return Err(ConfigError::SdiMissingFillDevice);
    }
    if c.ndi.enabled && c.ndi.sender_name.is_empty() {
        return Err(ConfigError::NdiMissingSenderName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = PlayoutConfig::builder().build().unwrap();
        assert_eq!(cfg.frame_rate, 60);
        assert_eq!(cfg.resolution, Resolution { width: 1920, height: 1080 });
    }

    #[test]
    fn zero_frame_rate_rejected() {
        let err = PlayoutConfig::builder().frame_rate(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFrameRate(0)));
    }

    #[test]
    fn sdi_enabled_without_fill_device_rejected() {
        let err = PlayoutConfig::builder()
            .sdi(SdiConfig { enabled: true, ..Default::default() })
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::SdiMissingFillDevice));
    }

    #[test]
    fn ndi_enabled_without_name_rejected() {
        let err = PlayoutConfig::builder()
            .ndi(NdiConfig { enabled: true, sender_name: String::new() })
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NdiMissingSenderName));
    }
}
