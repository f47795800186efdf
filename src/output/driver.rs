//! The output-sink contract (§4.4).

use crate::errors::PlayoutError;
use crate::frame::Size;

/// A single destination the output manager fans frames out to.
///
/// Implementations are hardware/network adapters (SDI, NDI) or local
/// previews (Window); all of them receive the same fill buffer and an
/// optional key buffer already computed by the output manager. A driver
/// that returns `Err` three times in a row is not torn down by itself —
/// the output manager owns the failure-count/removal policy (§4.4).
pub trait OutputDriver: Send {
    /// Stable name used in sink registration, logs and health reporting.
    fn name(&self) -> &str;

    /// Whether this sink wants a separate alpha-key buffer (SDI fill+key)
    /// as opposed to carrying alpha in the fill buffer itself (NDI, Window).
    fn needs_key(&self) -> bool;

    /// Push one frame. `key` is `Some` exactly when `needs_key()` is true.
    fn send_frame(&mut self, fill: &[u8], key: Option<&[u8]>, size: Size) -> Result<(), PlayoutError>;

    /// Release whatever the driver is holding onto (hardware channel, socket,
    /// window). Called once, when the sink is removed, whether because an
    /// operator asked for it or because it hit the failure threshold.
    fn destroy(&mut self);
}
