//! Persistent control plane (§4.7): wire protocol plus the WebSocket server
//! that drives the Engine on behalf of remote operator clients.

pub mod protocol;
mod server;

pub use server::serve;
