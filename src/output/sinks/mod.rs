//! Concrete output-driver variants (§4.4).

pub mod blackburst;
pub mod ndi;
pub mod sdi;
pub mod window;
