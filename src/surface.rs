//! The rendering-surface contract (§4.1, §6.5): an off-screen HTML/CSS
//! canvas that executes template commands and emits paint events.
//!
//! The actual renderer is an external collaborator (§1) — an embedder binds
//! a concrete web-engine adapter to [`RenderingSurface`]. This module only
//! defines the contract and the payload/hook vocabulary the Engine drives it
//! with.

use crate::errors::PlayoutError;
use crate::frame::Size;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An opaque rendering job (§3 `TemplatePayload`).
///
/// Immutable from the Engine's view except for `variables`, which may be
/// replaced while loaded (`update`/`updatePgm`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePayload {
    pub id: Option<String>,
    pub html: String,
    pub css: Option<String>,
    pub variables: HashMap<String, String>,
    pub is_ograf: bool,
    pub ograf_manifest: Option<String>,
}

/// Closed set of template-level hooks a loaded document may expose.
///
/// Hook absence is non-fatal — a surface adapter that has no binding for a
/// given hook treats the call as a no-op.
#[derive(Debug, Clone)]
pub enum HookKind {
    Play,
    Stop,
    Next,
    Update(HashMap<String, String>),
    Clear,
}

/// A rectangular region of a paint bitmap that changed since the last paint.
/// Advisory; a surface that cannot compute partial damage may always report
/// the full frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirtyRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Callback registered via [`RenderingSurface::on_paint`]. Invoked for every
/// rendered frame with the dirty rect, contiguous BGRA bitmap and its size.
/// Must not block — see §5 ("the producer must never block").
pub type PaintCallback = Box<dyn FnMut(DirtyRect, &[u8], Size) + Send>;

/// Callback registered for a surface failure signal (`renderer-gone` /
/// `unresponsive`), carrying a human-readable reason.
pub type FailureCallback = Box<dyn FnMut(&str) + Send>;

/// An off-screen rendering canvas at a fixed `(width, height)` and declared
/// frame rate (§4.1).
///
/// All operations that marshal into the rendering context are potentially
/// suspending (§5) and are modeled as boxed futures rather than plain async
/// fns so the trait stays object-safe — the Engine holds two of these behind
/// `Box<dyn RenderingSurface>`.
pub trait RenderingSurface: Send {
    /// Replace the surface's contents with the rendered document derived
    /// from `payload`. Mandatory: failures propagate.
    fn load_document(&mut self, payload: TemplatePayload) -> BoxFuture<'_, Result<(), PlayoutError>>;

    /// Invoke one of the closed set of template-level hooks. Hook absence is
    /// non-fatal.
    fn call_template_hook(&mut self, hook: HookKind) -> BoxFuture<'_, Result<(), PlayoutError>>;

    /// Register the paint callback. Replaces any previously registered
    /// callback. Implementations must be able to force a repaint at the
    /// declared frame rate even when content is static.
    fn on_paint(&mut self, callback: PaintCallback);

    /// Ask the surface to repaint right now (the "force-invalidate" path).
    fn force_invalidate(&mut self);

    /// Advisory freeze flag; freeze semantics live in Capture, not here.
    fn set_freeze_output(&mut self, freeze: bool);

    /// Register the renderer-gone failure signal.
    fn on_renderer_gone(&mut self, callback: FailureCallback);

    /// Register the unresponsive failure signal.
    fn on_unresponsive(&mut self, callback: FailureCallback);

    /// Re-initialize the surface to its blank host state.
    fn reload(&mut self) -> BoxFuture<'_, Result<(), PlayoutError>>;

    /// The surface's fixed size, set once at creation.
    fn size(&self) -> Size;

    /// The surface's fixed frame rate, set once at creation.
    fn frame_rate(&self) -> u32;
}
