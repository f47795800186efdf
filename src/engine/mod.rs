//! The PVW/PGM state machine (§4.5): owns the two rendering surfaces, drives
//! the Engine command loop, and emits the event bus other components
//! (control server, as-run log) subscribe to.

mod engine;
mod events;
mod handle;
mod state;

pub use engine::{CapturedPaint, PlayoutEngine};
pub use events::{EngineCommand, EngineEvent, SurfaceSlot};
pub use handle::EngineHandle;
pub use state::{EngineSnapshot, EngineState};

/// Default bound for the Engine's command and event channels, matching the
/// bound used for every other bus in this crate.
pub(crate) const DEFAULT_CHANNEL_CAPACITY: usize = 64;
