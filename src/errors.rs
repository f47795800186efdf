//! Crate-wide error type.

/// Errors surfaced by the playout engine, capture pipeline, output manager
/// and control server.
#[derive(Debug, thiserror::Error)]
pub enum PlayoutError {
    /// A command that requires an attached PVW surface was issued before one
    /// was attached.
    #[error("preview surface is not attached")]
    NotAttached,

    /// `take` or `takeMix` was issued without a loaded, ready preview.
    #[error("preview is not ready for take")]
    PreviewNotReady,

    /// A control-channel command referenced an unknown session.
    #[error("unknown client session")]
    UnknownSession,

    /// A sink name collided with one already registered on the output
    /// manager.
    #[error("sink '{0}' is already registered")]
    DuplicateSink(String),

    /// A sink name was not found when trying to remove or address it.
    #[error("sink '{0}' not found")]
    UnknownSink(String),

    /// Frame buffers that were expected to match in length did not
    /// (MIX blend, alpha-key extraction).
    #[error("frame buffers differ in length: {0} vs {1}")]
    BufferSizeMismatch(usize, usize),

    /// A control message failed to parse.
    #[error("invalid control message: {0}")]
    InvalidMessage(String),

    /// As-run log I/O failed. Logged and swallowed by callers; never
    /// propagated into the playout path.
    #[error("as-run log I/O error: {0}")]
    AsRunIo(#[from] std::io::Error),

    /// JSON (de)serialization failure on the control channel or as-run log.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Surface-adapter failure that is mandatory to propagate (load, or
    /// play-on-incoming during a take).
    #[error("surface operation failed: {0}")]
    SurfaceRejected(String),

    /// Engine configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Validation failures for [`crate::config::PlayoutConfig`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("frame rate must be > 0 (got {0})")]
    InvalidFrameRate(u32),

    #[error("resolution must be non-zero in both dimensions (got {0}x{1})")]
    InvalidResolution(u32, u32),

    #[error("sdi is enabled but fillDevice was not set")]
    SdiMissingFillDevice,

    #[error("ndi is enabled but senderName is empty")]
    NdiMissingSenderName,
}
