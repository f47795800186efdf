#![forbid(unsafe_code)]

//! # Playout Engine
//!
//! A broadcast graphics playout renderer: two off-screen HTML/CSS rendering
//! surfaces (preview PVW and program PGM), a fixed-rate frame capture
//! pipeline, a blending transition between them, and fan-out to several
//! simultaneous downstream sinks (SDI, NDI, on-screen windows). A
//! persistent control channel drives the whole pipeline remotely.
//!
//! ## Concepts
//! - [`engine::PlayoutEngine`] / [`engine::EngineHandle`] — the PVW/PGM
//!   state machine and the command loop that owns both surfaces.
//! - [`surface::RenderingSurface`] — the contract a rendering engine adapter
//!   implements; binding to a concrete engine is the integrator's job.
//! - [`capture::FrameCapture`] — decouples a surface's paint callback from a
//!   fixed-rate output tick.
//! - [`output::OutputManager`] / [`output::driver::OutputDriver`] — named
//!   sink fan-out, alpha-key extraction, per-sink failure isolation.
//! - [`control`] — the persistent WebSocket control channel.
//! - [`observability`] — as-run log, health endpoint, crash recovery.
//!
//! ## Quick start
//!
//! The top-level entry point is [`PlayoutService::start`], which wires the
//! Engine, Capture, Output Manager, control channel, health endpoint and
//! as-run log/crash recovery together and hands back a handle to drive it:
//!
//! ```rust,no_run
//! use playout_engine::config::PlayoutConfig;
//! use playout_engine::frame::Size;
//! use playout_engine::service::PlayoutService;
//! use playout_engine::testsupport::TestSurface;
//!
//! # async fn run() -> Result<(), playout_engine::errors::PlayoutError> {
//! let config = PlayoutConfig::default();
//! let size = Size::new(config.resolution.width, config.resolution.height);
//! let pvw = Box::new(TestSurface::new(size, config.frame_rate));
//! let pgm = Box::new(TestSurface::new(size, config.frame_rate));
//!
//! let service = PlayoutService::start(config, pvw, pgm).await?;
//! service.handle().load(Default::default()).await?;
//! service.handle().take().await?;
//! # Ok(()) }
//! ```
//!
//! Lower-level callers that want to assemble their own pipeline (a custom
//! sink set, a different Capture pacing) can drive [`engine::PlayoutEngine`]
//! directly instead:
//!
//! ```rust,no_run
//! use playout_engine::config::PlayoutConfig;
//! use playout_engine::engine::PlayoutEngine;
//! use playout_engine::frame::Size;
//! use playout_engine::testsupport::TestSurface;
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> Result<(), playout_engine::errors::PlayoutError> {
//! let config = PlayoutConfig::default();
//! let size = Size::new(config.resolution.width, config.resolution.height);
//!
//! let pvw = Box::new(TestSurface::new(size, config.frame_rate));
//! let pgm = Box::new(TestSurface::new(size, config.frame_rate));
//! let (pvw_tap_tx, _pvw_tap_rx) = mpsc::channel(4);
//! let (pgm_tap_tx, _pgm_tap_rx) = mpsc::channel(4);
//!
//! let (engine, handle) = PlayoutEngine::new(pvw, pgm, pvw_tap_tx, pgm_tap_tx);
//! tokio::spawn(engine.run());
//!
//! handle.load(Default::default()).await?;
//! handle.take().await?;
//! # Ok(()) }
//! ```

pub mod capture;
pub mod config;
pub mod control;
pub mod engine;
pub mod errors;
pub mod frame;
pub mod observability;
pub mod output;
pub mod service;
pub mod surface;
pub mod testsupport;

pub mod prelude {
    pub use crate::config::PlayoutConfig;
    pub use crate::engine::{EngineHandle, EngineSnapshot, EngineState, PlayoutEngine};
    pub use crate::errors::PlayoutError;
    pub use crate::service::PlayoutService;
    pub use crate::surface::{HookKind, RenderingSurface, TemplatePayload};
}
