//! Video export against the recording backend and an in-memory sink.

mod common;

use vehicle_replay::backend::DummyBackend;
use vehicle_replay::export::{export, CancellationToken, ExportError, ExportSettings};
use vehicle_replay::scene::Scene;

const SETTINGS: ExportSettings = ExportSettings {
    width: 16,
    height: 8,
    fps: 10,
};

fn ready_scene(backend: &mut DummyBackend) -> Scene {
    // Samples at t = 0, 1 and 2.
    let mut scene = common::scene(common::straight_run(3));
    scene.initialize(backend).unwrap();
    scene
}

#[test]
fn test_export_writes_every_frame() {
    let mut backend = DummyBackend::new(64, 48);
    let mut scene = ready_scene(&mut backend);
    let mut sink = common::MemorySink::default();

    let summary = export(&mut backend, &mut scene, &mut sink, &SETTINGS, &CancellationToken::new()).unwrap();

    assert_eq!(summary.frames, 21);
    assert!(!summary.cancelled);
    assert_eq!(sink.frames.len(), 21);
    assert!(sink.frames.iter().all(|f| f.len() == SETTINGS.frame_bytes()));
    assert!(sink.finished);
}

#[test]
fn test_export_target_is_released() {
    let mut backend = DummyBackend::new(64, 48);
    let mut scene = ready_scene(&mut backend);

    export(&mut backend, &mut scene, &mut common::MemorySink::default(), &SETTINGS, &CancellationToken::new()).unwrap();
    let live = backend.live_texture_count();
    export(&mut backend, &mut scene, &mut common::MemorySink::default(), &SETTINGS, &CancellationToken::new()).unwrap();
    assert_eq!(backend.live_texture_count(), live);
}

#[test]
fn test_cancelled_export_writes_nothing() {
    let mut backend = DummyBackend::new(64, 48);
    let mut scene = ready_scene(&mut backend);
    let mut sink = common::MemorySink::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = export(&mut backend, &mut scene, &mut sink, &SETTINGS, &cancel).unwrap();

    assert_eq!(summary.frames, 0);
    assert!(summary.cancelled);
    assert!(sink.frames.is_empty());
    assert!(sink.finished);
}

#[test]
fn test_playback_restored_after_export() {
    let mut backend = DummyBackend::new(64, 48);
    let mut scene = ready_scene(&mut backend);
    scene.playback_mut().seek(1.5);
    scene.playback_mut().pause();
    let before = scene.playback().clone();
    let aspect = scene.camera().aspect();

    let mut sink = common::MemorySink::default();
    export(&mut backend, &mut scene, &mut sink, &SETTINGS, &CancellationToken::new()).unwrap();

    assert_eq!(scene.playback(), &before);
    assert_eq!(scene.camera().aspect(), aspect);
}

#[test]
fn test_playback_restored_after_failed_export() {
    let mut backend = DummyBackend::new(64, 48);
    let mut scene = ready_scene(&mut backend);
    scene.playback_mut().seek(0.5);
    let before = scene.playback().clone();
    let aspect = scene.camera().aspect();

    let mut sink = common::MemorySink {
        fail_after: Some(3),
        ..Default::default()
    };
    let result = export(&mut backend, &mut scene, &mut sink, &SETTINGS, &CancellationToken::new());

    assert!(matches!(result, Err(ExportError::Write(_))));
    assert_eq!(sink.frames.len(), 3);
    assert!(!sink.finished);
    assert_eq!(scene.playback(), &before);
    assert_eq!(scene.camera().aspect(), aspect);
}

#[test]
fn test_export_requires_initialized_scene() {
    let mut backend = DummyBackend::new(64, 48);
    let mut scene = common::scene(common::straight_run(3));
    let mut sink = common::MemorySink::default();

    let result = export(&mut backend, &mut scene, &mut sink, &SETTINGS, &CancellationToken::new());
    assert!(matches!(result, Err(ExportError::SceneNotReady)));
    assert!(sink.frames.is_empty());
}
