//! Operational substrate (§4.8): the as-run log, the health endpoint, and
//! crash recovery — none of these sit on the playout hot path, but all of
//! them observe or react to it.

pub mod asrun;
pub mod crash_recovery;
pub mod health;

pub use asrun::{AsRunEntry, AsRunLog, AsRunWriter};
pub use crash_recovery::CrashRecovery;
