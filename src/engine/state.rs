//! Coarse Engine state (§4.5).

use crate::surface::TemplatePayload;

/// The Engine's coarse state. Freeze is layered over on-air rather than
/// being its own branch of the take/clear machinery — `Frozen` is simply
/// "on-air, with Capture's pacing tick suspended".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing loaded, PGM is black.
    Idle,
    /// PVW holds a loaded document; PGM is still whatever it last was.
    PvwLoaded,
    /// PGM is live output.
    OnAir,
    /// PGM is live output but Capture has stopped ticking new frames.
    Frozen,
}

impl Default for EngineState {
    fn default() -> Self {
        EngineState::Idle
    }
}

/// A point-in-time read of Engine state, returned by `snapshot` and carried
/// in `EngineEvent::StateChanged`.
#[derive(Debug, Clone, Default)]
pub struct EngineSnapshot {
    pub state: EngineState,
    pub pvw_template: Option<TemplatePayload>,
    pub pgm_template: Option<TemplatePayload>,
    /// Set by `load`, cleared by a `take` (§3).
    pub pvw_ready: bool,
    /// Set by `take`/`takeMix` completion, cleared by `clear`.
    pub pgm_ready: bool,
    /// `true` while a `takeMix` is scheduled and hasn't completed or been
    /// cancelled yet.
    pub mixing: bool,
}
