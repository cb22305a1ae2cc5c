#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rivet_engine_sim::SimEngine;
use rivet_playback_core::{Controller, ControllerConfig};
use rivet_render_core::{BackendKind, PlatformSurface, RenderConfig, RenderLoop, SharedSurface};
use rivet_runtime_core::{File, Runtime, SurfaceInfo};
use rivet_test_fixtures::documents;

pub struct Rig {
    pub engine: Arc<SimEngine>,
    pub runtime: Runtime,
    pub file: File,
    pub controller: Arc<Controller>,
}

pub fn manual() -> ControllerConfig {
    ControllerConfig {
        autoplay: false,
        ..ControllerConfig::default()
    }
}

pub fn rig(config: ControllerConfig) -> Rig {
    let engine = SimEngine::shared();
    let runtime = Runtime::new(engine.clone());
    let file = File::import(&runtime, &documents::bytes("playback").unwrap()).unwrap();
    Rig {
        engine,
        runtime,
        file,
        controller: Controller::shared(config),
    }
}

pub fn fast(backend: BackendKind) -> RenderConfig {
    RenderConfig {
        backend,
        frame_interval_ms: 2,
        worker_name: "rivet-render-test".to_string(),
        ..RenderConfig::default()
    }
}

impl Rig {
    pub fn render_loop(&self, backend: BackendKind) -> RenderLoop {
        RenderLoop::new(self.controller.clone(), self.runtime.clone(), fast(backend)).unwrap()
    }
}

/// Polls `done` until it holds or five seconds pass.
pub fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(5) {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    done()
}

/// A platform surface that counts how often it was released.
pub struct CountedSurface {
    pub id: u64,
    pub released: Arc<AtomicUsize>,
}

impl CountedSurface {
    pub fn shared(id: u64) -> (SharedSurface, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let surface = SharedSurface::new(CountedSurface {
            id,
            released: released.clone(),
        });
        (surface, released)
    }
}

impl PlatformSurface for CountedSurface {
    fn info(&self) -> SurfaceInfo {
        SurfaceInfo {
            id: self.id,
            width: 320,
            height: 240,
        }
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
