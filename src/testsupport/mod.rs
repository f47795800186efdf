//! In-memory fakes for the two external-collaborator contracts
//! ([`crate::surface::RenderingSurface`], [`crate::output::driver::OutputDriver`]),
//! used by this crate's own test suite and available to integrators writing
//! theirs. Not part of the operational playout path.

mod sink;
mod surface;

pub use sink::{RecordedFrame, TestSink};
pub use surface::{RecordedCall, TestSurface};
