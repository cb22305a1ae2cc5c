mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{approx, manual, scene};
use rivet_playback_core::{
    ChannelListener, Controller, ControllerConfig, PlayOptions, PlaybackEvent, PlaybackListener,
};
use rivet_runtime_core::{
    AdvanceResult, Direction, File, Fit, HandleKind, LinearAnimationInstance, LookupKind, Loop,
    NativeObject, PlayableKind, RuntimeError, StateMachineInstance,
};
use rivet_test_fixtures::documents;

fn names<T: Named>(items: &[T]) -> Vec<String> {
    items.iter().map(|item| item.label().to_string()).collect()
}

trait Named {
    fn label(&self) -> &str;
}

impl Named for LinearAnimationInstance {
    fn label(&self) -> &str {
        self.name()
    }
}

impl Named for StateMachineInstance {
    fn label(&self) -> &str {
        self.name()
    }
}

#[test]
fn play_notifies_even_when_already_playing() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    assert!(s.recorder.entries().is_empty());

    s.controller.play("one", PlayOptions::default()).unwrap();
    s.controller.play("one", PlayOptions::default()).unwrap();
    assert_eq!(s.recorder.count("play:one"), 2);
    assert_eq!(names(&s.controller.playing_animations()), ["one"]);
    assert_eq!(s.controller.animations().len(), 1);
}

#[test]
fn pausing_what_is_not_playing_is_silent() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller.pause("one", PlayableKind::Animation);
    assert_eq!(s.recorder.count("pause:one"), 0);

    s.controller.play("one", PlayOptions::default()).unwrap();
    s.controller.pause("one", PlayableKind::Animation);
    s.controller.pause("one", PlayableKind::Animation);
    assert_eq!(s.recorder.count("pause:one"), 1);
    assert_eq!(names(&s.controller.paused_animations()), ["one"]);
    assert!(s.controller.playing_animations().is_empty());

    // pausing by name only touches the matching kind
    s.controller.play("one", PlayOptions::default()).unwrap();
    s.controller.pause("one", PlayableKind::StateMachine);
    assert_eq!(s.recorder.count("pause:one"), 1);
}

#[test]
fn oneshot_finishes_then_stops() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller.play("one", PlayOptions::default()).unwrap();
    let one = s.controller.animation("one").unwrap();
    // keep the instance readable after the controller lets go of it
    one.acquire().unwrap();

    s.controller.advance(0.5).unwrap();
    assert!(approx(one.time().unwrap(), 0.5));
    assert_eq!(names(&s.controller.playing_animations()), ["one"]);

    s.controller.advance(0.6).unwrap();
    assert!(approx(one.time().unwrap(), 1.0));
    assert!(s.controller.playing_animations().is_empty());
    assert!(s.controller.animation("one").is_none());
    assert_eq!(s.recorder.count("stop:one"), 1);
    assert_eq!(one.advance(0.0).unwrap(), AdvanceResult::None);

    assert_eq!(one.release().unwrap(), 0);
    assert!(!one.has_object());
}

#[test]
fn stopped_instances_are_destroyed() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller
        .play_many(&["one", "loopy"], PlayOptions::default())
        .unwrap();
    assert_eq!(s.engine.live_count(HandleKind::LinearAnimationInstance), 2);

    s.controller.stop("one", PlayableKind::Animation).unwrap();
    assert_eq!(s.recorder.count("stop:one"), 1);
    assert_eq!(s.engine.live_count(HandleKind::LinearAnimationInstance), 1);

    s.controller.stop("one", PlayableKind::Animation).unwrap();
    assert_eq!(s.recorder.count("stop:one"), 1);

    s.controller.stop_all().unwrap();
    assert_eq!(s.recorder.count("stop:loopy"), 1);
    assert_eq!(s.engine.live_count(HandleKind::LinearAnimationInstance), 0);
}

#[test]
fn loop_override_precedence() {
    let config = ControllerConfig {
        loop_mode: Loop::Loop,
        ..manual()
    };
    let s = scene(config);
    s.controller.set_file(&s.file, None).unwrap();

    s.controller.play("one", PlayOptions::default()).unwrap();
    let one = s.controller.animation("one").unwrap();
    assert_eq!(one.loop_mode().unwrap(), Loop::Loop);
    s.controller.advance(1.2).unwrap();
    assert_eq!(s.recorder.count("loop:one"), 1);
    assert_eq!(names(&s.controller.playing_animations()), ["one"]);

    s.controller
        .play("loopy", PlayOptions::default().with_loop(Loop::OneShot))
        .unwrap();
    let loopy = s.controller.animation("loopy").unwrap();
    assert_eq!(loopy.loop_mode().unwrap(), Loop::OneShot);
}

#[test]
fn backwards_playback_starts_at_the_end() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller
        .play(
            "one",
            PlayOptions::default().with_direction(Direction::Backwards),
        )
        .unwrap();
    let one = s.controller.animation("one").unwrap();
    assert!(approx(one.time().unwrap(), 1.0));
    assert_eq!(one.direction().unwrap(), Direction::Backwards);

    s.controller.advance(0.25).unwrap();
    assert!(approx(one.time().unwrap(), 0.75));
}

#[test]
fn autoplay_picks_first_animation() {
    let s = scene(ControllerConfig::default());
    s.controller.set_file(&s.file, None).unwrap();
    assert_eq!(names(&s.controller.playing_animations()), ["one"]);
    assert!(s.controller.playing_state_machines().is_empty());
    assert_eq!(s.controller.selected_artboard().as_deref(), Some("main"));
}

#[test]
fn autoplay_named_state_machine_settles() {
    let config = ControllerConfig {
        state_machine_name: Some("machine".into()),
        ..ControllerConfig::default()
    };
    let s = scene(config);
    s.controller.set_file(&s.file, None).unwrap();
    assert_eq!(names(&s.controller.playing_state_machines()), ["machine"]);
    assert_eq!(
        s.recorder.entries(),
        ["state:machine:idle", "play:machine"]
    );
}

#[test]
fn autoplay_falls_back_to_first_state_machine() {
    let s = scene(ControllerConfig::default());
    s.controller.set_file(&s.file, Some("machines_only")).unwrap();
    assert!(s.controller.playing_animations().is_empty());
    assert_eq!(names(&s.controller.playing_state_machines()), ["toggle"]);
    assert_eq!(s.recorder.count("state:toggle:off"), 1);
}

#[test]
fn unknown_artboard_is_not_found() {
    let s = scene(manual());
    assert_eq!(
        s.controller.set_file(&s.file, Some("nope")).unwrap_err(),
        RuntimeError::not_found(LookupKind::Artboard, "nope")
    );
    assert!(s.controller.active_artboard().is_none());
}

#[test]
fn controls_without_a_file_are_silent_no_ops() {
    let s = scene(ControllerConfig::default());
    s.controller.play("one", PlayOptions::default()).unwrap();
    s.controller
        .play_many(&["one", "machine"], PlayOptions::state_machine())
        .unwrap();
    s.controller.resume(PlayOptions::default()).unwrap();
    s.controller.fire_state("machine", "go").unwrap();
    s.controller.set_number_state("machine", "level", 1.0).unwrap();
    s.controller.fire_state_at_path("go", "child").unwrap();
    s.controller.pause("one", PlayableKind::Animation);
    s.controller.pause_all();
    s.controller.stop("one", PlayableKind::Animation).unwrap();
    s.controller.stop_all().unwrap();
    s.controller.advance(0.016).unwrap();
    s.controller.reset().unwrap();

    assert!(s.recorder.entries().is_empty());
    assert!(s.controller.animations().is_empty());
    assert!(s.controller.state_machines().is_empty());
    assert!(s.controller.active_artboard().is_none());
}

#[test]
fn file_without_artboards_leaves_nothing_active() {
    let s = scene(ControllerConfig::default());
    let empty = File::import(&s.runtime, &documents::bytes("empty").unwrap()).unwrap();
    s.controller.set_file(&empty, None).unwrap();
    assert!(s.controller.active_artboard().is_none());
    assert_eq!(s.controller.selected_artboard(), None);
    assert_eq!(empty.ref_count(), 2);

    s.controller.play("one", PlayOptions::default()).unwrap();
    s.controller.fire_state("machine", "go").unwrap();
    s.controller.advance(0.016).unwrap();
    assert!(s.recorder.entries().is_empty());
    assert!(!s.controller.is_advancing());

    s.controller.clear_file().unwrap();
    assert_eq!(empty.release().unwrap(), 0);
    assert_eq!(s.engine.live_count(HandleKind::File), 1);
}

#[test]
fn setting_the_same_file_again_keeps_playback() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller.play("one", PlayOptions::default()).unwrap();
    let artboard = s.controller.active_artboard().unwrap();

    s.controller.set_file(&s.file, None).unwrap();
    s.controller.set_file(&s.file, Some("main")).unwrap();
    assert_eq!(s.recorder.entries(), ["play:one"]);
    assert_eq!(s.controller.active_artboard(), Some(artboard));
    assert_eq!(names(&s.controller.playing_animations()), ["one"]);
    assert_eq!(s.file.ref_count(), 2);

    // Naming another artboard still switches.
    s.controller.set_file(&s.file, Some("second")).unwrap();
    assert_eq!(s.recorder.count("stop:one"), 1);
    assert_eq!(s.controller.selected_artboard().as_deref(), Some("second"));
    assert_eq!(s.file.ref_count(), 2);
}

#[test]
fn over_released_artboard_still_leaves_the_file() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    let artboard = s.controller.active_artboard().unwrap();
    artboard.release().unwrap();
    assert_eq!(artboard.release().unwrap(), 0);
    assert!(s.file.handle().is_dependency(artboard.handle()));

    assert_eq!(
        s.controller.clear_file().unwrap_err(),
        RuntimeError::DoubleRelease {
            kind: HandleKind::Artboard
        }
    );
    assert!(!s.file.handle().is_dependency(artboard.handle()));

    s.controller.clear_file().unwrap();
    assert_eq!(s.file.release().unwrap(), 0);
    assert_eq!(s.engine.total_live(), 0);
}

#[test]
fn clearing_the_file_disposes_everything_it_owned() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller.play("one", PlayOptions::default()).unwrap();
    s.controller
        .play("machine", PlayOptions::state_machine())
        .unwrap();
    assert_eq!(s.file.release().unwrap(), 1);

    s.controller.clear_file().unwrap();
    assert_eq!(s.recorder.count("stop:one"), 1);
    assert_eq!(s.recorder.count("stop:machine"), 1);
    assert!(!s.file.has_object());
    assert_eq!(s.engine.total_live(), 0);
}

#[test]
fn replacing_the_file_releases_the_previous_one() {
    let s = scene(manual());
    let other = s.import();
    s.controller.set_file(&s.file, None).unwrap();
    s.controller.set_file(&other, Some("second")).unwrap();
    assert_eq!(s.file.ref_count(), 1);
    assert_eq!(s.file.handle().dependency_count(), 0);
    assert_eq!(s.controller.active_artboard().unwrap().name().unwrap(), "second");
}

#[test]
fn reset_keeps_an_independently_acquired_artboard() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    let artboard = s.controller.active_artboard().unwrap();
    artboard.acquire().unwrap();

    s.controller.reset().unwrap();
    assert_eq!(artboard.name().unwrap(), "main");
    assert_eq!(artboard.ref_count(), 1);
    let fresh = s.controller.active_artboard().unwrap();
    assert_ne!(fresh, artboard);
    assert_eq!(fresh.name().unwrap(), "main");

    assert_eq!(artboard.release().unwrap(), 0);
}

#[test]
fn selecting_an_artboard_stops_with_notifications_but_reset_is_silent() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller.play("one", PlayOptions::default()).unwrap();
    s.controller.select_artboard("second").unwrap();
    assert_eq!(s.recorder.count("stop:one"), 1);
    assert_eq!(s.controller.selected_artboard().as_deref(), Some("second"));

    s.controller.play("wave", PlayOptions::default()).unwrap();
    s.controller.reset().unwrap();
    assert_eq!(s.recorder.count("stop:wave"), 0);
    assert!(s.controller.animations().is_empty());
    assert_eq!(
        s.controller.active_artboard().unwrap().name().unwrap(),
        "second"
    );
}

#[test]
fn caller_supplied_artboard_is_only_borrowed() {
    let s = scene(manual());
    let artboard = s.file.artboard("second").unwrap();
    s.controller.set_active_artboard(Some(&artboard)).unwrap();
    assert_eq!(artboard.ref_count(), 2);
    s.controller.set_active_artboard(Some(&artboard)).unwrap();
    assert_eq!(artboard.ref_count(), 2);

    s.controller.set_active_artboard(None).unwrap();
    assert_eq!(artboard.ref_count(), 1);
    assert!(artboard.has_object());
    assert!(s.file.handle().is_dependency(artboard.handle()));
}

#[test]
fn state_machine_trigger_is_seen_on_next_advance() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller
        .play("machine", PlayOptions::state_machine())
        .unwrap();
    assert_eq!(s.recorder.count("state:machine:idle"), 1);

    s.controller.fire_state("machine", "go").unwrap();
    assert_eq!(s.recorder.count("play:machine"), 2);
    s.controller.advance(0.016).unwrap();
    assert_eq!(s.recorder.count("state:machine:run"), 1);
    assert_eq!(s.recorder.count("event:started"), 1);

    // the run state lasts half a second, then the machine settles and pauses
    s.controller.advance(0.6).unwrap();
    assert_eq!(s.recorder.count("pause:machine"), 1);
    assert_eq!(names(&s.controller.paused_state_machines()), ["machine"]);
}

#[test]
fn input_write_creates_and_settles_the_machine() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller
        .set_boolean_state("machine", "on", true)
        .unwrap();
    assert_eq!(names(&s.controller.playing_state_machines()), ["machine"]);
    assert_eq!(
        s.recorder.entries(),
        ["state:machine:idle", "play:machine"]
    );
    s.controller.advance(0.016).unwrap();
    assert_eq!(s.recorder.count("state:machine:lit"), 1);

    s.controller.set_number_state("machine", "level", 3.0).unwrap();
    s.controller.advance(0.016).unwrap();
    assert_eq!(s.recorder.count("state:machine:high"), 1);
}

#[test]
fn bad_inputs_fail_without_leaking_machines() {
    let s = scene(manual());
    s.controller.fire_state("machine", "go").unwrap();

    s.controller.set_file(&s.file, None).unwrap();
    assert_eq!(
        s.controller.fire_state("machine", "missing").unwrap_err(),
        RuntimeError::not_found(LookupKind::Input, "missing")
    );
    assert_eq!(
        s.controller.fire_state("nope", "go").unwrap_err(),
        RuntimeError::not_found(LookupKind::StateMachine, "nope")
    );
    assert!(s.controller.state_machines().is_empty());
    assert_eq!(s.engine.live_count(HandleKind::StateMachineInstance), 0);
    assert!(matches!(
        s.controller.set_number_state("machine", "on", 1.0),
        Err(RuntimeError::InputTypeMismatch { .. })
    ));
}

#[test]
fn nested_inputs_request_a_frame() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller.advance(0.0).unwrap();
    assert!(!s.controller.is_advancing());

    s.controller.fire_state_at_path("press", "button").unwrap();
    assert!(s.controller.is_advancing());
    s.controller.advance(0.016).unwrap();
    assert!(!s.controller.is_advancing());

    s.controller
        .set_number_state_at_path("scale", 2.0, "button")
        .unwrap();
    assert!(matches!(
        s.controller.set_boolean_state_at_path("scale", true, "button"),
        Err(RuntimeError::InputTypeMismatch { .. })
    ));
}

#[test]
fn text_runs_through_the_controller() {
    let s = scene(manual());
    assert_eq!(s.controller.text_run_value("title"), None);
    s.controller.set_text_run_value("title", "Hi").unwrap();

    s.controller.set_file(&s.file, None).unwrap();
    assert_eq!(s.controller.text_run_value("title").as_deref(), Some("Hello"));
    s.controller.set_text_run_value("title", "Hi").unwrap();
    assert_eq!(s.controller.text_run_value("title").as_deref(), Some("Hi"));
    assert_eq!(s.controller.text_run_value("missing"), None);
    assert_eq!(
        s.controller.set_text_run_value("missing", "x").unwrap_err(),
        RuntimeError::not_found(LookupKind::TextRun, "missing")
    );
}

#[test]
fn inactive_controller_does_not_advance() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller.play("one", PlayOptions::default()).unwrap();
    s.controller.set_active(false);
    s.controller.advance(0.5).unwrap();
    let one = s.controller.animation("one").unwrap();
    assert!(approx(one.time().unwrap(), 0.0));
    assert!(s.controller.with_active_artboard(|_| ()).is_none());
}

#[test]
fn on_start_and_if_idle() {
    let s = scene(manual());
    let starts = Arc::new(AtomicUsize::new(0));
    let counter = starts.clone();
    s.controller.set_on_start(Some(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })));

    s.controller.set_file(&s.file, None).unwrap();
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert!(!s.controller.if_idle(|| panic!("a frame is pending")));
    s.controller.advance(0.0).unwrap();
    let mut ran = false;
    assert!(s.controller.if_idle(|| ran = true));
    assert!(ran);

    s.controller.play("loopy", PlayOptions::default()).unwrap();
    assert_eq!(starts.load(Ordering::SeqCst), 2);
    assert!(!s.controller.if_idle(|| {}));

    s.controller.set_fit(Fit::Cover);
    assert_eq!(starts.load(Ordering::SeqCst), 3);
    s.controller.set_fit(Fit::Cover);
    assert_eq!(starts.load(Ordering::SeqCst), 3);
}

#[test]
fn channel_listener_receives_serializable_events() {
    let s = scene(manual());
    let (listener, rx) = ChannelListener::new();
    s.controller.register_listener(listener.clone());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller.play("one", PlayOptions::default()).unwrap();
    assert_eq!(
        rx.try_recv().unwrap(),
        PlaybackEvent::Play {
            kind: PlayableKind::Animation,
            name: "one".into()
        }
    );

    let as_dyn: Arc<dyn PlaybackListener> = listener;
    assert!(s.controller.unregister_listener(&as_dyn));
    s.controller.pause_all();
    assert!(rx.try_recv().is_err());
}

#[test]
fn controller_reference_counting() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    assert_eq!(s.controller.acquire().unwrap(), 2);
    assert_eq!(s.controller.release().unwrap(), 1);
    assert!(s.controller.file().is_some());

    assert_eq!(s.controller.release().unwrap(), 0);
    assert!(!s.controller.is_active());
    assert!(s.controller.file().is_none());
    assert_eq!(s.file.ref_count(), 1);
    assert_eq!(
        s.controller.release(),
        Err(RuntimeError::DoubleRelease {
            kind: HandleKind::Controller
        })
    );
    assert_eq!(
        s.controller.acquire(),
        Err(RuntimeError::UseAfterDispose {
            kind: HandleKind::Controller
        })
    );
}

#[test]
fn save_and_restore_into_a_new_controller() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller.play("one", PlayOptions::default()).unwrap();
    s.controller
        .play("machine", PlayOptions::state_machine())
        .unwrap();
    s.controller.pause("machine", PlayableKind::StateMachine);
    s.controller.advance(0.25).unwrap();

    let state = s.controller.save_state().unwrap().unwrap();
    assert_eq!(state.playing(), ["one"]);
    assert_eq!(state.selected_artboard(), Some("main"));
    s.controller.release().unwrap();
    assert!(state.artboard().unwrap().has_object());

    let restored = Controller::shared(manual());
    restored.restore_state(state).unwrap();
    assert!(restored.is_active());
    assert_eq!(names(&restored.playing_animations()), ["one"]);
    assert_eq!(names(&restored.paused_state_machines()), ["machine"]);
    let one = restored.animation("one").unwrap();
    assert!(approx(one.time().unwrap(), 0.25));
    assert_eq!(one.ref_count(), 1);
    assert_eq!(restored.active_artboard().unwrap().ref_count(), 2);

    restored.advance(0.25).unwrap();
    assert!(approx(one.time().unwrap(), 0.5));

    restored.clear_file().unwrap();
    s.file.release().unwrap();
    assert_eq!(s.engine.total_live(), 0);
}

#[test]
fn disposing_saved_state_returns_references() {
    let s = scene(manual());
    s.controller.set_file(&s.file, None).unwrap();
    s.controller.play("one", PlayOptions::default()).unwrap();
    let state = s.controller.save_state().unwrap().unwrap();
    assert_eq!(s.file.ref_count(), 3);
    state.dispose().unwrap();
    assert_eq!(s.file.ref_count(), 2);
    assert_eq!(s.controller.animation("one").unwrap().ref_count(), 1);

    let empty = Controller::shared(manual());
    assert!(empty.save_state().unwrap().is_none());
}

#[test]
fn worker_and_control_thread_race_without_faults() {
    let s = scene(ControllerConfig::default());
    s.controller.set_file(&s.file, None).unwrap();

    let worker = {
        let controller = s.controller.clone();
        std::thread::spawn(move || {
            for _ in 0..400 {
                controller.advance(0.016).unwrap();
                if let Some(name) = controller.with_active_artboard(|ab| ab.name().unwrap()) {
                    assert!(!name.is_empty());
                }
            }
        })
    };

    for round in 0..100 {
        match round % 5 {
            0 => s.controller.play("loopy", PlayOptions::default()).unwrap(),
            1 => s.controller.stop_all().unwrap(),
            2 => s.controller.select_artboard("second").unwrap(),
            3 => s.controller.reset().unwrap(),
            _ => s.controller.set_file(&s.file, Some("main")).unwrap(),
        }
    }
    worker.join().unwrap();

    s.controller.clear_file().unwrap();
    s.file.release().unwrap();
    assert_eq!(s.engine.total_live(), 0);
}
