//! End-to-end tests that wire the Engine, Capture and the Output Manager
//! together the way an embedder would, using the in-memory test doubles.

use playout_engine::engine::{EngineState, PlayoutEngine};
use playout_engine::frame::Size;
use playout_engine::output::{OutputManager, SinkKind};
use playout_engine::surface::TemplatePayload;
use playout_engine::testsupport::{TestSink, TestSurface};
use std::time::Duration;
use tokio::sync::mpsc;

const SIZE: Size = Size { width: 2, height: 2 };

fn payload(id: &str) -> TemplatePayload {
    TemplatePayload { id: Some(id.to_string()), ..Default::default() }
}

#[tokio::test]
async fn cold_take_round_trip() {
    let pvw = Box::new(TestSurface::new(SIZE, 60));
    let pgm = Box::new(TestSurface::new(SIZE, 60));
    let (pvw_tap, _pvw_rx) = mpsc::channel(4);
    let (pgm_tap, _pgm_rx) = mpsc::channel(4);
    let (engine, handle) = PlayoutEngine::new(pvw, pgm, pvw_tap, pgm_tap);
    tokio::spawn(engine.run());

    handle.load(payload("lower-third")).await.unwrap();
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.state, EngineState::PvwLoaded);

    handle.take().await.unwrap();
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.state, EngineState::OnAir);
    assert_eq!(snap.pgm_template.as_ref().and_then(|t| t.id.as_deref()), Some("lower-third"));
    assert!(snap.pvw_template.is_none());
    assert!(snap.pgm_ready);
    assert!(!snap.pvw_ready);
}

#[tokio::test]
async fn clear_after_take_returns_to_idle() {
    let pvw = Box::new(TestSurface::new(SIZE, 60));
    let pgm = Box::new(TestSurface::new(SIZE, 60));
    let (pvw_tap, _pvw_rx) = mpsc::channel(4);
    let (pgm_tap, _pgm_rx) = mpsc::channel(4);
    let (engine, handle) = PlayoutEngine::new(pvw, pgm, pvw_tap, pgm_tap);
    tokio::spawn(engine.run());

    handle.load(payload("bug")).await.unwrap();
    handle.take().await.unwrap();
    handle.clear().await.unwrap();

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.state, EngineState::Idle);
    assert!(snap.pgm_template.is_none());
    assert!(!snap.pgm_ready);
}

#[tokio::test]
async fn take_before_any_load_is_rejected() {
    let pvw = Box::new(TestSurface::new(SIZE, 60));
    let pgm = Box::new(TestSurface::new(SIZE, 60));
    let (pvw_tap, _pvw_rx) = mpsc::channel(4);
    let (pgm_tap, _pgm_rx) = mpsc::channel(4);
    let (engine, handle) = PlayoutEngine::new(pvw, pgm, pvw_tap, pgm_tap);
    tokio::spawn(engine.run());

    assert!(handle.take().await.is_err());
}

#[tokio::test]
async fn mix_transition_completes_and_swaps_roles() {
    let pvw = Box::new(TestSurface::new(SIZE, 60));
    let pgm = Box::new(TestSurface::new(SIZE, 60));
    let (pvw_tap, _pvw_rx) = mpsc::channel(4);
    let (pgm_tap, _pgm_rx) = mpsc::channel(4);
    let (engine, handle) = PlayoutEngine::new(pvw, pgm, pvw_tap, pgm_tap);
    tokio::spawn(engine.run());

    handle.load(payload("first")).await.unwrap();
    handle.take().await.unwrap();
    handle.load(payload("second")).await.unwrap();

    let mut events = handle.subscribe_events();
    handle.take_mix(Duration::from_millis(20)).await.unwrap();

    // Scheduling returns immediately; the swap hasn't happened yet.
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.pgm_template.as_ref().and_then(|t| t.id.as_deref()), Some("first"));
    assert!(snap.mixing);

    let mut saw_mix_started = false;
    let mut saw_mix_completed = false;
    for _ in 0..10 {
        match tokio::time::timeout(Duration::from_millis(200), events.recv()).await {
            Ok(Ok(playout_engine::engine::EngineEvent::MixStarted { .. })) => saw_mix_started = true,
            Ok(Ok(playout_engine::engine::EngineEvent::MixCompleted)) => {
                saw_mix_completed = true;
                break;
            }
            Ok(Ok(_)) => continue,
            _ => break,
        }
    }
    assert!(saw_mix_started);
    assert!(saw_mix_completed);

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.pgm_template.as_ref().and_then(|t| t.id.as_deref()), Some("second"));
    assert!(!snap.mixing);
}

#[tokio::test]
async fn mix_cancelled_by_clear_never_completes() {
    let pvw = Box::new(TestSurface::new(SIZE, 60));
    let pgm = Box::new(TestSurface::new(SIZE, 60));
    let (pvw_tap, _pvw_rx) = mpsc::channel(4);
    let (pgm_tap, _pgm_rx) = mpsc::channel(4);
    let (engine, handle) = PlayoutEngine::new(pvw, pgm, pvw_tap, pgm_tap);
    tokio::spawn(engine.run());

    handle.load(payload("first")).await.unwrap();
    handle.take().await.unwrap();
    handle.load(payload("second")).await.unwrap();

    let mut events = handle.subscribe_events();
    handle.take_mix(Duration::from_millis(500)).await.unwrap();
    handle.clear().await.unwrap();

    let mut saw_mix_cancelled = false;
    let mut saw_mix_completed = false;
    for _ in 0..10 {
        match tokio::time::timeout(Duration::from_millis(50), events.recv()).await {
            Ok(Ok(playout_engine::engine::EngineEvent::MixCancelled)) => saw_mix_cancelled = true,
            Ok(Ok(playout_engine::engine::EngineEvent::MixCompleted)) => saw_mix_completed = true,
            Ok(Ok(_)) => continue,
            _ => break,
        }
    }
    assert!(saw_mix_cancelled);
    assert!(!saw_mix_completed);

    // The cleared engine state is Idle, not whatever the mix would have
    // produced.
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.state, EngineState::Idle);
}

#[tokio::test]
async fn freeze_then_unfreeze_round_trips_state() {
    let pvw = Box::new(TestSurface::new(SIZE, 60));
    let pgm = Box::new(TestSurface::new(SIZE, 60));
    let (pvw_tap, _pvw_rx) = mpsc::channel(4);
    let (pgm_tap, _pgm_rx) = mpsc::channel(4);
    let (engine, handle) = PlayoutEngine::new(pvw, pgm, pvw_tap, pgm_tap);
    tokio::spawn(engine.run());

    handle.load(payload("bug")).await.unwrap();
    handle.take().await.unwrap();

    handle.freeze(true).await.unwrap();
    assert_eq!(handle.snapshot().await.unwrap().state, EngineState::Frozen);

    handle.freeze(false).await.unwrap();
    assert_eq!(handle.snapshot().await.unwrap().state, EngineState::OnAir);
}

#[tokio::test]
async fn sink_is_removed_after_ten_consecutive_failures() {
    let (fa_tx, fa_rx) = tokio::sync::watch::channel(None);
    let (_fb_tx, fb_rx) = tokio::sync::watch::channel(None);
    let (_ev_tx, ev_rx) = tokio::sync::broadcast::channel(8);
    let mut manager = OutputManager::new(200, SIZE, fa_rx, fb_rx, ev_rx);

    let sink = TestSink::new("flaky", false);
    sink.set_failing(true);
    manager.register_sink("flaky", Box::new(sink.clone()), SinkKind::Normal).unwrap();

    let run = tokio::spawn(manager.run());
    fa_tx.send(Some(playout_engine::frame::OwnedFrame { buffer: vec![0u8; SIZE.byte_len()], width: 2, height: 2 })).unwrap();

    // Long enough for well over 10 ticks at 200Hz; the manager must stop
    // calling the sink once it disables it, so the attempt count plateaus
    // exactly at the removal threshold instead of growing without bound.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let attempts_at_first_check = sink.failed_attempts();
    tokio::time::sleep(Duration::from_millis(200)).await;
    run.abort();

    assert_eq!(attempts_at_first_check, 10);
    assert_eq!(sink.failed_attempts(), 10, "sink must not be retried after removal");
    assert!(sink.frames().is_empty());
}

#[tokio::test]
async fn alpha_key_extraction_matches_fill_alpha_channel() {
    let fill = vec![10u8, 20, 30, 200, 1, 2, 3, 40];
    let mut key = Vec::new();
    playout_engine::output::blend::extract_alpha_as_luma(&fill, &mut key).unwrap();
    for chunk in key.chunks_exact(4) {
        assert_eq!(chunk[0], chunk[1]);
        assert_eq!(chunk[1], chunk[2]);
        assert_eq!(chunk[3], 255);
    }
    assert_eq!(key[0], fill[3]);
    assert_eq!(key[4], fill[7]);
}

#[tokio::test]
async fn key_extraction_is_skipped_when_no_sink_needs_it() {
    let (fa_tx, fa_rx) = tokio::sync::watch::channel(None);
    let (_fb_tx, fb_rx) = tokio::sync::watch::channel(None);
    let (_ev_tx, ev_rx) = tokio::sync::broadcast::channel(8);
    let mut manager = OutputManager::new(200, SIZE, fa_rx, fb_rx, ev_rx);

    let sink = TestSink::new("rgb-only", false);
    manager.register_sink("rgb-only", Box::new(sink.clone()), SinkKind::Normal).unwrap();

    let run = tokio::spawn(manager.run());
    fa_tx
        .send(Some(playout_engine::frame::OwnedFrame { buffer: vec![1, 2, 3, 255, 1, 2, 3, 255], width: 2, height: 1 }))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    run.abort();

    let frames = sink.frames();
    assert!(!frames.is_empty());
    assert!(frames.iter().all(|f| f.key.is_none()), "a sink that does not need a key must never receive one");
}
