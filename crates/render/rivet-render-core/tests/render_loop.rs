mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{manual, rig, wait_until, CountedSurface};
use rivet_playback_core::{ChannelListener, ControllerConfig, PlaybackEvent, PlayOptions};
use rivet_render_core::{
    BackendKind, Lifecycle, OffscreenSurface, RenderBackend, RenderConfig, RenderError,
    RenderLoop, SharedSurface,
};
use rivet_runtime_core::{
    Artboard, DrawParams, HandleKind, NativeObject, PlayableKind, RendererType, Runtime,
    RuntimeError, SurfaceInfo,
};

#[test]
fn lifecycle_moves_through_attach_start_stop_detach_delete() {
    let rig = rig(manual());
    let render_loop = rig.render_loop(BackendKind::Headless);
    assert_eq!(render_loop.lifecycle(), Lifecycle::Created);
    assert_eq!(rig.controller.ref_count(), 2);

    let surface = SharedSurface::new(OffscreenSurface::new(1, 64, 64));
    render_loop.set_surface(&surface).unwrap();
    assert_eq!(render_loop.lifecycle(), Lifecycle::Attached);
    assert_eq!(surface.ref_count(), 2);

    rig.controller.set_file(&rig.file, None).unwrap();
    render_loop.start().unwrap();
    assert_eq!(render_loop.lifecycle(), Lifecycle::Started);
    assert!(rig.controller.is_active());
    assert!(wait_until(|| render_loop.stats().frames() >= 1));
    assert!(wait_until(|| !render_loop.is_ticking()));

    render_loop.stop();
    assert_eq!(render_loop.lifecycle(), Lifecycle::Stopped);
    render_loop.clear_surface().unwrap();
    assert_eq!(render_loop.lifecycle(), Lifecycle::Detached);
    assert_eq!(surface.ref_count(), 1);

    render_loop.delete().unwrap();
    assert_eq!(render_loop.lifecycle(), Lifecycle::Deleted);
    assert_eq!(render_loop.start(), Err(RenderError::WorkerTerminated));
    assert_eq!(
        render_loop.set_surface(&surface),
        Err(RenderError::WorkerTerminated)
    );
    render_loop.delete().unwrap();
    assert_eq!(rig.controller.ref_count(), 1);
    assert_eq!(surface.ref_count(), 1);

    rig.controller.release().unwrap();
    rig.file.release().unwrap();
    assert_eq!(rig.engine.total_live(), 0);
}

#[test]
fn native_backend_makes_and_deletes_its_renderer() {
    let rig = rig(manual());
    let render_loop = rig.render_loop(BackendKind::Native {
        renderer: Some(RendererType::Skia),
    });
    assert_eq!(rig.engine.live_count(HandleKind::Renderer), 1);

    let (surface, _released) = CountedSurface::shared(3);
    render_loop.set_surface(&surface).unwrap();
    rig.controller.set_file(&rig.file, Some("second")).unwrap();
    render_loop.start().unwrap();
    assert!(wait_until(|| rig.engine.stats().draws >= 1));

    drop(render_loop);
    assert_eq!(rig.engine.live_count(HandleKind::Renderer), 0);
    assert_eq!(surface.ref_count(), 1);
    assert_eq!(rig.controller.ref_count(), 1);
    assert_eq!(rig.controller.selected_artboard().as_deref(), Some("second"));
}

#[test]
fn platform_surface_is_released_exactly_once() {
    let rig = rig(manual());
    let render_loop = rig.render_loop(BackendKind::Headless);
    let (first, first_released) = CountedSurface::shared(1);
    let (second, second_released) = CountedSurface::shared(2);

    render_loop.set_surface(&first).unwrap();
    // Attaching the same surface again keeps a single loop reference.
    render_loop.set_surface(&first).unwrap();
    assert_eq!(first.ref_count(), 2);

    // The creator lets go while the loop still draws into it.
    first.release().unwrap();
    assert_eq!(first_released.load(Ordering::SeqCst), 0);
    assert!(first.has_object());

    render_loop.set_surface(&second).unwrap();
    assert_eq!(first_released.load(Ordering::SeqCst), 1);
    assert!(!first.has_object());

    second.release().unwrap();
    assert_eq!(second_released.load(Ordering::SeqCst), 0);
    render_loop.delete().unwrap();
    assert_eq!(second_released.load(Ordering::SeqCst), 1);
    assert_eq!(
        second.release(),
        Err(RuntimeError::DoubleRelease {
            kind: HandleKind::Surface
        })
    );
    assert_eq!(second_released.load(Ordering::SeqCst), 1);
}

#[test]
fn disposed_surface_cannot_be_attached() {
    let rig = rig(manual());
    let render_loop = rig.render_loop(BackendKind::Headless);
    let (surface, released) = CountedSurface::shared(5);
    surface.release().unwrap();
    assert_eq!(
        render_loop.set_surface(&surface),
        Err(RenderError::Runtime(RuntimeError::UseAfterDispose {
            kind: HandleKind::Surface
        }))
    );
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(render_loop.lifecycle(), Lifecycle::Created);
}

#[test]
fn ticking_stops_when_idle_and_resumes_on_play() {
    let rig = rig(manual());
    let render_loop = rig.render_loop(BackendKind::Headless);
    render_loop
        .set_surface(&SharedSurface::new(OffscreenSurface::new(1, 8, 8)))
        .unwrap();
    rig.controller.set_file(&rig.file, None).unwrap();
    render_loop.start().unwrap();
    assert!(wait_until(|| !render_loop.is_ticking()));
    let idle_frames = render_loop.stats().frames();
    assert!(idle_frames >= 1);

    rig.controller
        .play("loopy", PlayOptions::animation())
        .unwrap();
    assert!(render_loop.is_ticking());
    assert!(wait_until(|| render_loop.stats().frames() >= idle_frames + 5));
    assert!(render_loop.average_fps().is_some());

    rig.controller.pause_all();
    assert!(wait_until(|| !render_loop.is_ticking()));

    // A stopped loop ignores play requests until started again.
    render_loop.stop();
    rig.controller
        .play("loopy", PlayOptions::animation())
        .unwrap();
    assert!(!render_loop.is_ticking());
    render_loop.start().unwrap();
    assert!(render_loop.is_ticking());
}

#[test]
fn oneshot_finishes_on_the_worker() {
    let rig = rig(ControllerConfig {
        animation_name: Some("one".into()),
        ..ControllerConfig::default()
    });
    let (listener, events) = ChannelListener::new();
    rig.controller.register_listener(listener);

    let render_loop = rig.render_loop(BackendKind::Headless);
    render_loop.start().unwrap();
    rig.controller.set_file(&rig.file, None).unwrap();

    let stop = PlaybackEvent::Stop {
        kind: PlayableKind::Animation,
        name: "one".into(),
    };
    let mut seen = Vec::new();
    while let Ok(event) = events.recv_timeout(Duration::from_secs(5)) {
        let done = event == stop;
        seen.push(event);
        if done {
            break;
        }
    }
    assert_eq!(
        seen,
        vec![
            PlaybackEvent::Play {
                kind: PlayableKind::Animation,
                name: "one".into()
            },
            stop
        ]
    );
    assert!(rig.controller.playing_animations().is_empty());
    assert!(wait_until(|| !render_loop.is_ticking()));
}

#[derive(Default)]
struct FailingBackend {
    made: bool,
}

impl RenderBackend for FailingBackend {
    fn renderer_type(&self) -> Option<RendererType> {
        None
    }

    fn make(&mut self, _runtime: &Runtime) -> rivet_runtime_core::Result<()> {
        self.made = true;
        Ok(())
    }

    fn has_object(&self) -> bool {
        self.made
    }

    fn bind_surface(&mut self, _surface: Option<SurfaceInfo>) -> rivet_runtime_core::Result<()> {
        Ok(())
    }

    fn draw(&mut self, _artboard: &Artboard, _params: &DrawParams) -> rivet_runtime_core::Result<()> {
        Err(RuntimeError::RendererUnavailable {
            renderer: "failing".into(),
        })
    }

    fn delete(&mut self) -> rivet_runtime_core::Result<()> {
        self.made = false;
        Ok(())
    }
}

fn failing_loop(rig: &common::Rig, halt_on_error: bool) -> RenderLoop {
    let config = RenderConfig {
        halt_on_error,
        ..common::fast(BackendKind::Headless)
    };
    RenderLoop::with_backend(
        rig.controller.clone(),
        rig.runtime.clone(),
        config,
        Box::new(FailingBackend::default()),
    )
    .unwrap()
}

#[test]
fn frame_errors_are_stored_and_halt_the_loop() {
    let rig = rig(ControllerConfig {
        animation_name: Some("loopy".into()),
        ..ControllerConfig::default()
    });
    let render_loop = failing_loop(&rig, true);
    render_loop
        .set_surface(&SharedSurface::new(OffscreenSurface::new(1, 8, 8)))
        .unwrap();
    rig.controller.set_file(&rig.file, None).unwrap();
    render_loop.start().unwrap();

    assert!(wait_until(|| !render_loop.is_ticking()));
    assert_eq!(
        render_loop.take_error(),
        Some(RenderError::Runtime(RuntimeError::RendererUnavailable {
            renderer: "failing".into()
        }))
    );
    assert_eq!(render_loop.take_error(), None);
    // Still playing; only the loop stopped.
    assert!(rig.controller.is_advancing());
    assert_eq!(render_loop.stats().frames(), 0);
}

#[test]
fn frame_errors_without_halting_keep_ticking() {
    let rig = rig(ControllerConfig {
        animation_name: Some("loopy".into()),
        ..ControllerConfig::default()
    });
    let render_loop = failing_loop(&rig, false);
    render_loop
        .set_surface(&SharedSurface::new(OffscreenSurface::new(1, 8, 8)))
        .unwrap();
    rig.controller.set_file(&rig.file, None).unwrap();
    render_loop.start().unwrap();

    assert!(wait_until(|| render_loop.take_error().is_some()));
    assert!(render_loop.is_ticking());
    assert!(wait_until(|| render_loop.take_error().is_some()));
}

#[test]
fn render_config_selects_the_backend_from_json() {
    let rig = rig(manual());
    let config = RenderConfig::from_json(
        r#"{ "backend": { "kind": "native", "renderer": "canvas" }, "frame_interval_ms": 4, "worker_name": "json-worker" }"#,
    )
    .unwrap();
    let render_loop = RenderLoop::new(rig.controller.clone(), rig.runtime.clone(), config).unwrap();
    assert_eq!(render_loop.config().worker_name, "json-worker");
    assert_eq!(rig.engine.live_count(HandleKind::Renderer), 1);
    render_loop.delete().unwrap();
    assert_eq!(rig.engine.disposed_count(HandleKind::Renderer), 1);
}
