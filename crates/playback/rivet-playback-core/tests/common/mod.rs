#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use rivet_engine_sim::SimEngine;
use rivet_playback_core::{Controller, ControllerConfig, EventListener, Playable, PlaybackListener};
use rivet_runtime_core::{File, ReportedEvent, Runtime};
use rivet_test_fixtures::documents;

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-4
}

pub struct Scene {
    pub engine: Arc<SimEngine>,
    pub runtime: Runtime,
    pub file: File,
    pub controller: Arc<Controller>,
    pub recorder: Arc<Recorder>,
}

impl Scene {
    pub fn import(&self) -> File {
        File::import(&self.runtime, &documents::bytes("playback").unwrap()).unwrap()
    }
}

pub fn manual() -> ControllerConfig {
    ControllerConfig {
        autoplay: false,
        ..ControllerConfig::default()
    }
}

/// Active controller with a recorder registered; no file set yet.
pub fn scene(config: ControllerConfig) -> Scene {
    let engine = SimEngine::shared();
    let runtime = Runtime::new(engine.clone());
    let file = File::import(&runtime, &documents::bytes("playback").unwrap()).unwrap();
    let controller = Controller::shared(config);
    controller.set_active(true);
    let recorder = Arc::new(Recorder::default());
    controller.register_listener(recorder.clone());
    controller.add_event_listener(recorder.clone());
    Scene {
        engine,
        runtime,
        file,
        controller,
        recorder,
    }
}

#[derive(Default)]
pub struct Recorder {
    entries: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, entry: String) {
        self.entries.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl PlaybackListener for Recorder {
    fn notify_play(&self, playable: &Playable) {
        self.push(format!("play:{}", playable.name()));
    }

    fn notify_pause(&self, playable: &Playable) {
        self.push(format!("pause:{}", playable.name()));
    }

    fn notify_stop(&self, playable: &Playable) {
        self.push(format!("stop:{}", playable.name()));
    }

    fn notify_loop(&self, playable: &Playable) {
        self.push(format!("loop:{}", playable.name()));
    }

    fn notify_state_changed(&self, state_machine: &str, state: &str) {
        self.push(format!("state:{state_machine}:{state}"));
    }
}

impl EventListener for Recorder {
    fn notify_event(&self, event: &ReportedEvent) {
        self.push(format!("event:{}", event.name));
    }
}
