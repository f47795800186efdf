//! An in-memory [`RenderingSurface`] for exercising the Engine without a
//! real rendering engine attached. Not part of the stable playout API —
//! only exported for this crate's own tests and for integrators writing
//! their own tests against the Engine.

use crate::errors::PlayoutError;
use crate::frame::Size;
use crate::surface::{DirtyRect, FailureCallback, HookKind, PaintCallback, RenderingSurface, TemplatePayload};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};

/// Every call a test made against a [`TestSurface`], in order. Lets a test
/// assert on hook sequencing without needing a real template runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Load(Option<String>),
    Hook(String),
    Reload,
}

#[derive(Default)]
struct Inner {
    calls: Vec<RecordedCall>,
    frozen: bool,
    paint: Option<PaintCallback>,
    on_gone: Option<FailureCallback>,
    on_unresponsive: Option<FailureCallback>,
    fail_next_load: bool,
}

/// A blank host surface at a fixed size/frame rate that records every call
/// made to it and can synthesize paints on demand via [`TestSurface::paint`].
pub struct TestSurface {
    size: Size,
    frame_rate: u32,
    inner: Arc<Mutex<Inner>>,
}

impl TestSurface {
    pub fn new(size: Size, frame_rate: u32) -> Self {
        Self { size, frame_rate, inner: Arc::new(Mutex::new(Inner::default())) }
    }

    /// Drive the registered paint callback with a fully opaque bitmap of
    /// this surface's size, as a real renderer would on a repaint tick.
    pub fn paint(&self, fill: u8) {
        let mut inner = self.inner.lock().unwrap();
        let bitmap = vec![fill; self.size.byte_len()];
        let dirty = DirtyRect { x: 0, y: 0, width: self.size.width, height: self.size.height };
        if let Some(cb) = inner.paint.as_mut() {
            cb(dirty, &bitmap, self.size);
        }
    }

    pub fn fire_renderer_gone(&self, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(cb) = inner.on_gone.as_mut() {
            cb(reason);
        }
    }

    pub fn fire_unresponsive(&self, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(cb) = inner.on_unresponsive.as_mut() {
            cb(reason);
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.lock().unwrap().frozen
    }

    /// Make the next `load_document` call fail, to exercise the mandatory
    /// error-propagation path.
    pub fn fail_next_load(&self) {
        self.inner.lock().unwrap().fail_next_load = true;
    }
}

impl RenderingSurface for TestSurface {
    fn load_document(&mut self, payload: TemplatePayload) -> BoxFuture<'_, Result<(), PlayoutError>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut inner = inner.lock().unwrap();
            if inner.fail_next_load {
                inner.fail_next_load = false;
                return Err(PlayoutError::SurfaceRejected("test surface forced failure".into()));
            }
            inner.calls.push(RecordedCall::Load(payload.id));
            Ok(())
        })
    }

    fn call_template_hook(&mut self, hook: HookKind) -> BoxFuture<'_, Result<(), PlayoutError>> {
        let inner = self.inner.clone();
        let label = match hook {
            HookKind::Play => "play".to_string(),
            HookKind::Stop => "stop".to_string(),
            HookKind::Next => "next".to_string(),
            HookKind::Update(_) => "update".to_string(),
            HookKind::Clear => "clear".to_string(),
        };
        Box::pin(async move {
            inner.lock().unwrap().calls.push(RecordedCall::Hook(label));
            Ok(())
        })
    }

    fn on_paint(&mut self, callback: PaintCallback) {
        self.inner.lock().unwrap().paint = Some(callback);
    }

    fn force_invalidate(&mut self) {
        self.paint(0);
    }

    fn set_freeze_output(&mut self, freeze: bool) {
        self.inner.lock().unwrap().frozen = freeze;
    }

    fn on_renderer_gone(&mut self, callback: FailureCallback) {
        self.inner.lock().unwrap().on_gone = Some(callback);
    }

    fn on_unresponsive(&mut self, callback: FailureCallback) {
        self.inner.lock().unwrap().on_unresponsive = Some(callback);
    }

    fn reload(&mut self) -> BoxFuture<'_, Result<(), PlayoutError>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.lock().unwrap().calls.push(RecordedCall::Reload);
            Ok(())
        })
    }

    fn size(&self) -> Size {
        self.size
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_load_and_hooks_in_order() {
        let mut surface = TestSurface::new(Size::new(4, 4), 60);
        surface.load_document(TemplatePayload { id: Some("lower-third".into()), ..Default::default() }).await.unwrap();
        surface.call_template_hook(HookKind::Play).await.unwrap();
        surface.call_template_hook(HookKind::Clear).await.unwrap();

        assert_eq!(
            surface.calls(),
            vec![
                RecordedCall::Load(Some("lower-third".into())),
                RecordedCall::Hook("play".into()),
                RecordedCall::Hook("clear".into()),
            ]
        );
    }

    #[tokio::test]
    async fn forced_load_failure_is_reported_once() {
        let mut surface = TestSurface::new(Size::new(2, 2), 60);
        surface.fail_next_load();
        assert!(surface.load_document(TemplatePayload::default()).await.is_err());
        assert!(surface.load_document(TemplatePayload::default()).await.is_ok());
    }

    #[test]
    fn paint_reaches_registered_callback() {
        let mut surface = TestSurface::new(Size::new(2, 2), 60);
        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        surface.on_paint(Box::new(move |_dirty, bitmap, _size| {
            *seen2.lock().unwrap() = Some(bitmap.to_vec());
        }));
        surface.paint(7);
        assert_eq!(seen.lock().unwrap().as_deref(), Some([7u8; 16].as_slice()));
    }
}
