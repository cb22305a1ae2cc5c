//! The playback controller.
//!
//! Lock order, outermost first: the start/stop lock, the active artboard's
//! graph lock, then the playback sets. The worker's advance pass takes the
//! graph lock and then the sets, and never the start/stop lock while it
//! holds either. Notifications are collected under the locks and delivered
//! once they are released.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;

use rivet_runtime_core::{
    AdvanceResult, Alignment, Artboard, Direction, DrawParams, File, Fit, HandleKind, InputValue,
    LinearAnimationInstance, Loop, NativeHandle, NativeObject, PlayableKind, RefCount, Result,
    StateMachineInstance,
};

use crate::config::{ControllerConfig, PlayOptions};
use crate::listener::{deliver, EventListener, Listeners, Notice, Playable, PlaybackListener};
use crate::state::{ControllerState, SavedArtboard};

/// Invoked whenever work is added, under the start/stop lock.
pub type StartCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug)]
struct ActiveArtboard {
    artboard: Artboard,
    /// Instantiated by the controller from its file, as opposed to supplied
    /// by the caller.
    owned: bool,
}

#[derive(Default)]
struct PlaybackSets {
    file: Option<File>,
    artboard: Option<ActiveArtboard>,
    selected_artboard: Option<String>,
    animations: IndexSet<LinearAnimationInstance>,
    playing_animations: IndexSet<LinearAnimationInstance>,
    state_machines: IndexSet<StateMachineInstance>,
    playing_state_machines: IndexSet<StateMachineInstance>,
    frame_requested: bool,
}

impl PlaybackSets {
    /// Handle whose graph lock guards the current native objects.
    fn anchor(&self) -> Option<NativeHandle> {
        self.artboard
            .as_ref()
            .map(|active| active.artboard.handle().clone())
            .or_else(|| self.file.as_ref().map(|file| file.handle().clone()))
    }

    fn artboard(&self) -> Option<Artboard> {
        self.artboard.as_ref().map(|active| active.artboard.clone())
    }

    fn is_current(&self, artboard: &Artboard) -> bool {
        self.artboard
            .as_ref()
            .is_some_and(|active| active.artboard == *artboard)
    }

    fn is_advancing(&self) -> bool {
        self.frame_requested
            || !self.playing_animations.is_empty()
            || !self.playing_state_machines.is_empty()
    }

    fn retained_animation(&self, name: &str) -> Option<LinearAnimationInstance> {
        self.animations.iter().find(|a| a.name() == name).cloned()
    }

    fn retained_state_machine(&self, name: &str) -> Option<StateMachineInstance> {
        self.state_machines.iter().find(|m| m.name() == name).cloned()
    }
}

#[derive(Clone, Copy, Debug)]
enum Selection<'a> {
    All,
    Named {
        names: &'a [&'a str],
        kind: PlayableKind,
    },
}

impl Selection<'_> {
    fn matches(&self, kind: PlayableKind, name: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Named { names, kind: wanted } => *wanted == kind && names.contains(&name),
        }
    }
}

/// Owns the active artboard and the sets of retained and playing instances
/// for one view. Control-thread operations and the worker's
/// [`advance`](Self::advance) may run in parallel.
pub struct Controller {
    config: Mutex<ControllerConfig>,
    refs: Mutex<RefCount>,
    active: AtomicBool,
    sets: Mutex<PlaybackSets>,
    start_stop: Mutex<()>,
    on_start: Mutex<Option<StartCallback>>,
    listeners: Listeners<dyn PlaybackListener>,
    event_listeners: Listeners<dyn EventListener>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl Controller {
    /// A new controller holds one reference, owned by its creator.
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config: Mutex::new(config),
            refs: Mutex::new(RefCount::new(HandleKind::Controller)),
            active: AtomicBool::new(false),
            sets: Mutex::new(PlaybackSets::default()),
            start_stop: Mutex::new(()),
            on_start: Mutex::new(None),
            listeners: Listeners::default(),
            event_listeners: Listeners::default(),
        }
    }

    pub fn shared(config: ControllerConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> ControllerConfig {
        self.config.lock().clone()
    }

    pub fn draw_params(&self) -> DrawParams {
        self.config.lock().draw_params()
    }

    // ----- reference counting -----

    pub fn acquire(&self) -> Result<usize> {
        self.refs.lock().acquire()
    }

    /// At zero the controller deactivates and lets go of its file.
    pub fn release(&self) -> Result<usize> {
        let count = self.refs.lock().release()?;
        if count == 0 {
            if self.is_active() {
                log::warn!("controller released while still active; deactivating");
            }
            self.set_active(false);
            self.clear_file()?;
        }
        Ok(count)
    }

    pub fn ref_count(&self) -> usize {
        self.refs.lock().count()
    }

    // ----- file and artboard -----

    /// Takes a reference to `file`, drops the previous file (stopping
    /// everything), and activates `artboard_name` or the configured or first
    /// artboard. Setting the current file again without naming a different
    /// artboard does nothing.
    pub fn set_file(&self, file: &File, artboard_name: Option<&str>) -> Result<()> {
        self.control(|notices| {
            {
                let sets = self.sets.lock();
                let same_file = sets.file.as_ref() == Some(file);
                let same_artboard = artboard_name
                    .map_or(true, |name| sets.selected_artboard.as_deref() == Some(name));
                if same_file && same_artboard {
                    log::debug!("set_file: file already set");
                    return Ok(());
                }
            }
            file.acquire()?;
            if let Some(previous) = self.detach(true, notices)? {
                previous.release()?;
            }
            let name = artboard_name
                .map(str::to_string)
                .or_else(|| self.config.lock().artboard_name.clone());
            self.sets.lock().file = Some(file.clone());
            self.select(name.as_deref(), notices)
        })
    }

    /// Stops everything and releases the artboard and the file.
    pub fn clear_file(&self) -> Result<()> {
        self.control(|notices| match self.detach(true, notices)? {
            Some(file) => file.release().map(|_| ()),
            None => Ok(()),
        })
    }

    pub fn file(&self) -> Option<File> {
        self.sets.lock().file.clone()
    }

    /// Activates a fresh instance of the named artboard from the current
    /// file. Without a file this does nothing.
    pub fn select_artboard(&self, name: &str) -> Result<()> {
        self.control(|notices| self.select(Some(name), notices))
    }

    pub fn selected_artboard(&self) -> Option<String> {
        self.sets.lock().selected_artboard.clone()
    }

    /// Makes a caller-supplied artboard active. The controller takes one
    /// reference and gives it back when the artboard is replaced; the
    /// caller's own reference is untouched.
    pub fn set_active_artboard(&self, artboard: Option<&Artboard>) -> Result<()> {
        self.control(|notices| {
            if let Some(artboard) = artboard {
                if self.sets.lock().is_current(artboard) {
                    return Ok(());
                }
            }
            self.release_artboard(true, notices)?;
            match artboard {
                Some(artboard) => self.install(artboard.clone(), false, notices),
                None => Ok(()),
            }
        })
    }

    /// The active artboard, if it is still alive.
    pub fn active_artboard(&self) -> Option<Artboard> {
        self.sets
            .lock()
            .artboard()
            .filter(|artboard| artboard.has_object())
    }

    /// Runs `f` with the active artboard while its graph lock is held, so
    /// the artboard cannot be disposed until `f` returns. Returns `None`
    /// when the controller is inactive or has no live artboard.
    pub fn with_active_artboard<R>(&self, f: impl FnOnce(&Artboard) -> R) -> Option<R> {
        if !self.is_active() {
            return None;
        }
        let artboard = self.sets.lock().artboard()?;
        let _graph = artboard.handle().lock();
        if !artboard.has_object() || !self.is_active() || !self.sets.lock().is_current(&artboard) {
            return None;
        }
        Some(f(&artboard))
    }

    /// Stops everything silently and activates a fresh instance of the
    /// previously selected artboard. An artboard someone else acquired
    /// stays alive.
    pub fn reset(&self) -> Result<()> {
        self.control(|notices| {
            self.release_artboard(false, notices)?;
            let (selected, has_file) = {
                let sets = self.sets.lock();
                (sets.selected_artboard.clone(), sets.file.is_some())
            };
            if has_file {
                self.select(selected.as_deref(), notices)?;
            }
            Ok(())
        })
    }

    // ----- playback -----

    pub fn play(&self, name: &str, options: PlayOptions) -> Result<()> {
        self.play_many(&[name], options)
    }

    /// Plays each named instance, creating it if needed. Listeners hear
    /// `notify_play` even for instances that were already playing.
    pub fn play_many(&self, names: &[&str], options: PlayOptions) -> Result<()> {
        self.control(|notices| self.play_names(names, options, notices))
    }

    /// Restarts every retained instance. With nothing retained, plays the
    /// first animation, or failing that the first state machine.
    pub fn resume(&self, options: PlayOptions) -> Result<()> {
        self.control(|notices| self.resume_retained(options, notices))
    }

    pub fn pause(&self, name: &str, kind: PlayableKind) {
        self.pause_many(&[name], kind)
    }

    pub fn pause_many(&self, names: &[&str], kind: PlayableKind) {
        self.pause_selection(Selection::Named { names, kind })
    }

    pub fn pause_all(&self) {
        self.pause_selection(Selection::All)
    }

    pub fn stop(&self, name: &str, kind: PlayableKind) -> Result<()> {
        self.stop_many(&[name], kind)
    }

    /// Removes the named instances entirely; each is destroyed unless
    /// someone else acquired it.
    pub fn stop_many(&self, names: &[&str], kind: PlayableKind) -> Result<()> {
        self.stop_selection(Selection::Named { names, kind })
    }

    pub fn stop_all(&self) -> Result<()> {
        self.stop_selection(Selection::All)
    }

    // ----- state machine inputs -----

    pub fn fire_state(&self, state_machine: &str, input: &str) -> Result<()> {
        self.write_state_input(state_machine, input, InputValue::Trigger)
    }

    pub fn set_boolean_state(&self, state_machine: &str, input: &str, value: bool) -> Result<()> {
        self.write_state_input(state_machine, input, InputValue::Boolean(value))
    }

    pub fn set_number_state(&self, state_machine: &str, input: &str, value: f32) -> Result<()> {
        self.write_state_input(state_machine, input, InputValue::Number(value))
    }

    pub fn fire_state_at_path(&self, input: &str, path: &str) -> Result<()> {
        self.write_path_input(input, path, InputValue::Trigger)
    }

    pub fn set_boolean_state_at_path(&self, input: &str, value: bool, path: &str) -> Result<()> {
        self.write_path_input(input, path, InputValue::Boolean(value))
    }

    pub fn set_number_state_at_path(&self, input: &str, value: f32, path: &str) -> Result<()> {
        self.write_path_input(input, path, InputValue::Number(value))
    }

    // ----- text runs -----

    pub fn text_run_value(&self, name: &str) -> Option<String> {
        self.locked(|sets| {
            sets.artboard
                .as_ref()
                .and_then(|active| active.artboard.text_run(name).ok())
        })
    }

    pub fn set_text_run_value(&self, name: &str, text: &str) -> Result<()> {
        self.control(|_| {
            let written = self.locked(|sets| -> Result<bool> {
                let Some(artboard) = sets.artboard() else {
                    log::debug!("set text run {name}: no active artboard");
                    return Ok(false);
                };
                artboard.set_text_run(name, text)?;
                sets.frame_requested = true;
                Ok(true)
            })?;
            if written {
                self.started();
            }
            Ok(())
        })
    }

    // ----- frame -----

    /// One worker pass: advance and apply every playing instance, then the
    /// artboard. Finished one-shots are stopped and settled state machines
    /// paused. Does nothing while inactive or without a live artboard.
    pub fn advance(&self, elapsed: f32) -> Result<()> {
        let mut notices = Vec::new();
        let result = self.advance_pass(elapsed, &mut notices);
        self.dispatch(notices);
        result
    }

    fn advance_pass(&self, elapsed: f32, notices: &mut Vec<Notice>) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        let Some(artboard) = self.sets.lock().artboard() else {
            return Ok(());
        };
        let _graph = artboard.handle().lock();
        let (animations, machines) = {
            let mut sets = self.sets.lock();
            if !sets.is_current(&artboard) || !artboard.has_object() {
                return Ok(());
            }
            sets.frame_requested = false;
            (
                sets.playing_animations.iter().cloned().collect::<Vec<_>>(),
                sets.playing_state_machines.iter().cloned().collect::<Vec<_>>(),
            )
        };

        let mut finished = Vec::new();
        for animation in animations {
            match animation.advance_and_apply(elapsed)? {
                AdvanceResult::OneShot => finished.push(animation),
                AdvanceResult::Loop | AdvanceResult::PingPong => {
                    notices.push(Notice::Loop(Playable::Animation(animation)))
                }
                AdvanceResult::Advanced | AdvanceResult::None => {}
            }
        }

        let mut settled = Vec::new();
        for machine in machines {
            let keep_going = machine.advance(elapsed)?;
            drain_machine(&machine, notices)?;
            if !keep_going {
                settled.push(machine);
            }
        }

        artboard.advance(elapsed)?;

        let mut sets = self.sets.lock();
        for animation in finished {
            if sets.animations.shift_remove(&animation) {
                sets.playing_animations.shift_remove(&animation);
                artboard.handle().release_dependency(animation.handle())?;
                notices.push(Notice::Stop(Playable::Animation(animation)));
            }
        }
        for machine in settled {
            if sets.playing_state_machines.shift_remove(&machine) {
                notices.push(Notice::Pause(Playable::StateMachine(machine)));
            }
        }
        log::trace!("advanced {elapsed}s");
        notices.push(Notice::Advance(elapsed));
        Ok(())
    }

    // ----- queries -----

    /// Something is playing, or a frame was requested and not yet advanced.
    pub fn is_advancing(&self) -> bool {
        self.sets.lock().is_advancing()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Gate checked by the worker before touching the artboard.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn animations(&self) -> Vec<LinearAnimationInstance> {
        self.sets.lock().animations.iter().cloned().collect()
    }

    pub fn playing_animations(&self) -> Vec<LinearAnimationInstance> {
        self.sets.lock().playing_animations.iter().cloned().collect()
    }

    pub fn paused_animations(&self) -> Vec<LinearAnimationInstance> {
        let sets = self.sets.lock();
        sets.animations
            .iter()
            .filter(|a| !sets.playing_animations.contains(*a))
            .cloned()
            .collect()
    }

    pub fn state_machines(&self) -> Vec<StateMachineInstance> {
        self.sets.lock().state_machines.iter().cloned().collect()
    }

    pub fn playing_state_machines(&self) -> Vec<StateMachineInstance> {
        self.sets
            .lock()
            .playing_state_machines
            .iter()
            .cloned()
            .collect()
    }

    pub fn paused_state_machines(&self) -> Vec<StateMachineInstance> {
        let sets = self.sets.lock();
        sets.state_machines
            .iter()
            .filter(|m| !sets.playing_state_machines.contains(*m))
            .cloned()
            .collect()
    }

    /// A retained animation instance by name.
    pub fn animation(&self, name: &str) -> Option<LinearAnimationInstance> {
        self.sets.lock().retained_animation(name)
    }

    pub fn state_machine(&self, name: &str) -> Option<StateMachineInstance> {
        self.sets.lock().retained_state_machine(name)
    }

    // ----- settings -----

    pub fn fit(&self) -> Fit {
        self.config.lock().fit
    }

    pub fn set_fit(&self, fit: Fit) {
        let changed = std::mem::replace(&mut self.config.lock().fit, fit) != fit;
        if changed {
            self.request_frame();
        }
    }

    pub fn alignment(&self) -> Alignment {
        self.config.lock().alignment
    }

    pub fn set_alignment(&self, alignment: Alignment) {
        let changed = std::mem::replace(&mut self.config.lock().alignment, alignment) != alignment;
        if changed {
            self.request_frame();
        }
    }

    pub fn set_layout_scale_factor(&self, factor: f32) {
        let changed =
            std::mem::replace(&mut self.config.lock().layout_scale_factor, factor) != factor;
        if changed {
            self.request_frame();
        }
    }

    pub fn loop_mode(&self) -> Loop {
        self.config.lock().loop_mode
    }

    /// Default loop override for animations played from now on.
    pub fn set_loop_mode(&self, loop_mode: Loop) {
        self.config.lock().loop_mode = loop_mode;
    }

    pub fn autoplay(&self) -> bool {
        self.config.lock().autoplay
    }

    pub fn set_autoplay(&self, autoplay: bool) {
        self.config.lock().autoplay = autoplay;
    }

    // ----- listeners and scheduling -----

    pub fn register_listener(&self, listener: Arc<dyn PlaybackListener>) -> bool {
        self.listeners.add(listener)
    }

    pub fn unregister_listener(&self, listener: &Arc<dyn PlaybackListener>) -> bool {
        self.listeners.remove(listener)
    }

    pub fn add_event_listener(&self, listener: Arc<dyn EventListener>) -> bool {
        self.event_listeners.add(listener)
    }

    pub fn remove_event_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        self.event_listeners.remove(listener)
    }

    pub fn set_on_start(&self, callback: Option<StartCallback>) {
        *self.on_start.lock() = callback;
    }

    /// Runs `f` if nothing is advancing, atomically with respect to play
    /// requests. Returns whether `f` ran.
    pub fn if_idle(&self, f: impl FnOnce()) -> bool {
        let _start_stop = self.start_stop.lock();
        if self.sets.lock().is_advancing() {
            return false;
        }
        f();
        true
    }

    // ----- save and restore -----

    /// Takes a reference to the file, the artboard and every retained
    /// instance. `None` without a file.
    pub fn save_state(&self) -> Result<Option<ControllerState>> {
        let _start_stop = self.start_stop.lock();
        self.locked(|sets| -> Result<Option<ControllerState>> {
            let Some(file) = sets.file.clone() else {
                return Ok(None);
            };
            // Anything acquired before a failure is released when `state` drops.
            let mut state = ControllerState::default();
            file.acquire()?;
            state.file = Some(file);
            if let Some(active) = &sets.artboard {
                active.artboard.acquire()?;
                state.artboard = Some(SavedArtboard {
                    artboard: active.artboard.clone(),
                    owned: active.owned,
                });
            }
            for animation in &sets.animations {
                animation.acquire()?;
                let playing = sets.playing_animations.contains(animation);
                state.animations.push((animation.clone(), playing));
            }
            for machine in &sets.state_machines {
                machine.acquire()?;
                let playing = sets.playing_state_machines.contains(machine);
                state.state_machines.push((machine.clone(), playing));
            }
            state.selected_artboard = sets.selected_artboard.clone();
            Ok(Some(state))
        })
    }

    /// Drops whatever this controller holds and adopts the references in
    /// `state`, replaying what was playing. The controller becomes active.
    pub fn restore_state(&self, mut state: ControllerState) -> Result<()> {
        self.control(|notices| {
            if let Some(previous) = self.detach(false, notices)? {
                previous.release()?;
            }
            let mut parts = state.take();
            let Some(file) = parts.file.take() else {
                return Ok(());
            };
            let _graph = file.handle().lock();
            let saved = parts.artboard.take();
            let animations = std::mem::take(&mut parts.animations);
            let machines = std::mem::take(&mut parts.state_machines);

            let mut restored = PlaybackSets {
                selected_artboard: parts.selected_artboard.take(),
                ..PlaybackSets::default()
            };
            if let Some(SavedArtboard { artboard, owned }) = saved {
                if owned && !file.handle().is_dependency(artboard.handle()) {
                    // The saved reference goes back to the file; the
                    // controller takes its own.
                    file.handle().retain_dependency(artboard.handle().clone())?;
                    artboard.acquire()?;
                }
                for (animation, playing) in animations {
                    adopt_instance(&artboard, animation.handle())?;
                    if playing {
                        restored.playing_animations.insert(animation.clone());
                        notices.push(Notice::Play(Playable::Animation(animation.clone())));
                    }
                    restored.animations.insert(animation);
                }
                for (machine, playing) in machines {
                    adopt_instance(&artboard, machine.handle())?;
                    if playing {
                        restored.playing_state_machines.insert(machine.clone());
                        notices.push(Notice::Play(Playable::StateMachine(machine.clone())));
                    }
                    restored.state_machines.insert(machine);
                }
                restored.artboard = Some(ActiveArtboard { artboard, owned });
            } else {
                for (animation, _) in animations {
                    animation.release()?;
                }
                for (machine, _) in machines {
                    machine.release()?;
                }
            }
            restored.file = Some(file.clone());
            restored.frame_requested = true;
            *self.sets.lock() = restored;
            self.set_active(true);
            self.started();
            Ok(())
        })
    }

    // ----- internals -----

    /// Runs a control-thread operation under the start/stop lock, then
    /// delivers the notifications it collected.
    fn control<R>(&self, f: impl FnOnce(&mut Vec<Notice>) -> R) -> R {
        let mut notices = Vec::new();
        let result = {
            let _start_stop = self.start_stop.lock();
            f(&mut notices)
        };
        self.dispatch(notices);
        result
    }

    /// Runs `f` with the current graph lock and then the sets held. Retries
    /// if the artboard or file changed while waiting for the graph lock.
    fn locked<R>(&self, f: impl FnOnce(&mut PlaybackSets) -> R) -> R {
        loop {
            let anchor = self.sets.lock().anchor();
            let _graph = anchor.as_ref().map(NativeHandle::lock);
            let mut sets = self.sets.lock();
            let unchanged = match (&anchor, sets.anchor()) {
                (Some(expected), Some(current)) => expected.ptr_eq(&current),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return f(&mut sets);
            }
        }
    }

    fn dispatch(&self, notices: Vec<Notice>) {
        if notices.is_empty() {
            return;
        }
        deliver(
            &notices,
            &self.listeners.snapshot(),
            &self.event_listeners.snapshot(),
        );
    }

    /// Caller holds the start/stop lock.
    fn started(&self) {
        let callback = self.on_start.lock().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    fn request_frame(&self) {
        let _start_stop = self.start_stop.lock();
        self.sets.lock().frame_requested = true;
        self.started();
    }

    /// Releases the artboard and hands back the file reference for the
    /// caller to release.
    fn detach(&self, notify: bool, notices: &mut Vec<Notice>) -> Result<Option<File>> {
        self.release_artboard(notify, notices)?;
        Ok(self.sets.lock().file.take())
    }

    /// Stops every instance and drops the controller's artboard reference.
    /// An owned artboard also leaves the file's dependency list, which
    /// destroys it unless someone else acquired it.
    fn release_artboard(&self, notify: bool, notices: &mut Vec<Notice>) -> Result<()> {
        let mut stopped = Vec::new();
        let (active, file) = self.locked(|sets| -> Result<_> {
            stop_locked(sets, Selection::All, &mut stopped)?;
            sets.frame_requested = false;
            Ok((sets.artboard.take(), sets.file.clone()))
        })?;
        if notify {
            notices.append(&mut stopped);
        }
        let Some(ActiveArtboard { artboard, owned }) = active else {
            return Ok(());
        };
        let _graph = artboard.handle().lock();
        let released = artboard.release();
        let unlisted = match (owned, file) {
            (true, Some(file)) => file.handle().release_dependency(artboard.handle()),
            _ => Ok(false),
        };
        released?;
        unlisted.map(|_| ())
    }

    /// Instantiates the named (or first) artboard of the current file and
    /// makes it active. A file without artboards leaves nothing active.
    fn select(&self, name: Option<&str>, notices: &mut Vec<Notice>) -> Result<()> {
        self.release_artboard(true, notices)?;
        let artboard = self.locked(|sets| -> Result<Option<Artboard>> {
            let Some(file) = sets.file.clone() else {
                log::debug!("select artboard: no file");
                return Ok(None);
            };
            let artboard = match name {
                Some(name) => file.artboard(name)?,
                None if file.artboard_count()? == 0 => {
                    log::debug!("select artboard: file has no artboards");
                    return Ok(None);
                }
                None => file.first_artboard()?,
            };
            sets.selected_artboard = Some(artboard.name()?);
            Ok(Some(artboard))
        })?;
        match artboard {
            Some(artboard) => self.install(artboard, true, notices),
            None => Ok(()),
        }
    }

    fn install(&self, artboard: Artboard, owned: bool, notices: &mut Vec<Notice>) -> Result<()> {
        artboard.acquire()?;
        let _graph = artboard.handle().lock();
        {
            let mut sets = self.sets.lock();
            sets.artboard = Some(ActiveArtboard {
                artboard: artboard.clone(),
                owned,
            });
            sets.frame_requested = true;
        }
        let config = self.config();
        if !config.autoplay {
            artboard.advance(0.0)?;
            self.started();
            return Ok(());
        }
        if let Some(name) = &config.animation_name {
            self.play_names(&[name.as_str()], PlayOptions::animation(), notices)
        } else if let Some(name) = &config.state_machine_name {
            self.play_names(&[name.as_str()], PlayOptions::state_machine(), notices)
        } else {
            self.resume_retained(PlayOptions::default(), notices)
        }
    }

    fn play_names(
        &self,
        names: &[&str],
        options: PlayOptions,
        notices: &mut Vec<Notice>,
    ) -> Result<()> {
        let config = self.config();
        let played = self.locked(|sets| -> Result<bool> {
            let Some(artboard) = sets.artboard() else {
                log::debug!("play {names:?}: no active artboard");
                return Ok(false);
            };
            for name in names {
                match options.kind {
                    PlayableKind::Animation => {
                        let (animation, created) = match sets.retained_animation(name) {
                            Some(animation) => (animation, false),
                            None => (artboard.animation(name)?, true),
                        };
                        start_animation(sets, animation, created, &options, &config, notices)?;
                    }
                    PlayableKind::StateMachine => {
                        let machine = match sets.retained_state_machine(name) {
                            Some(machine) => machine,
                            None => artboard.state_machine(name)?,
                        };
                        if options.settle {
                            settle(&machine, notices)?;
                        }
                        start_state_machine(sets, machine, notices);
                    }
                }
            }
            Ok(!names.is_empty())
        })?;
        if played {
            self.started();
        }
        Ok(())
    }

    fn resume_retained(&self, options: PlayOptions, notices: &mut Vec<Notice>) -> Result<()> {
        let config = self.config();
        let played = self.locked(|sets| -> Result<bool> {
            let Some(artboard) = sets.artboard() else {
                log::debug!("resume: no active artboard");
                return Ok(false);
            };
            if sets.animations.is_empty() && sets.state_machines.is_empty() {
                if artboard.animation_count()? > 0 {
                    let animation = artboard.animation_at(0)?;
                    start_animation(sets, animation, true, &options, &config, notices)?;
                    return Ok(true);
                }
                if artboard.state_machine_count()? > 0 {
                    let machine = artboard.state_machine_at(0)?;
                    if options.settle {
                        settle(&machine, notices)?;
                    }
                    start_state_machine(sets, machine, notices);
                    return Ok(true);
                }
                return Ok(false);
            }
            let animations: Vec<_> = sets.animations.iter().cloned().collect();
            for animation in animations {
                start_animation(sets, animation, false, &options, &config, notices)?;
            }
            let machines: Vec<_> = sets.state_machines.iter().cloned().collect();
            for machine in machines {
                start_state_machine(sets, machine, notices);
            }
            Ok(true)
        })?;
        if played {
            self.started();
        }
        Ok(())
    }

    fn pause_selection(&self, selection: Selection<'_>) {
        self.control(|notices| {
            self.locked(|sets| {
                let animations: Vec<_> = sets
                    .playing_animations
                    .iter()
                    .filter(|a| selection.matches(PlayableKind::Animation, a.name()))
                    .cloned()
                    .collect();
                for animation in animations {
                    sets.playing_animations.shift_remove(&animation);
                    notices.push(Notice::Pause(Playable::Animation(animation)));
                }
                let machines: Vec<_> = sets
                    .playing_state_machines
                    .iter()
                    .filter(|m| selection.matches(PlayableKind::StateMachine, m.name()))
                    .cloned()
                    .collect();
                for machine in machines {
                    sets.playing_state_machines.shift_remove(&machine);
                    notices.push(Notice::Pause(Playable::StateMachine(machine)));
                }
            })
        })
    }

    fn stop_selection(&self, selection: Selection<'_>) -> Result<()> {
        self.control(|notices| self.locked(|sets| stop_locked(sets, selection, notices)))
    }

    /// Writes a state machine input, creating (and settling) the machine on
    /// first use, then plays it without settling so the write is seen by the
    /// next advance.
    fn write_state_input(&self, state_machine: &str, input: &str, value: InputValue) -> Result<()> {
        self.control(|notices| {
            let written = self.locked(|sets| -> Result<bool> {
                let Some(artboard) = sets.artboard() else {
                    log::debug!("set {state_machine}.{input}: no active artboard");
                    return Ok(false);
                };
                let mut settled = Vec::new();
                let (machine, created) = match sets.retained_state_machine(state_machine) {
                    Some(machine) => (machine, false),
                    None => {
                        let machine = artboard.state_machine(state_machine)?;
                        settle(&machine, &mut settled)?;
                        (machine, true)
                    }
                };
                if let Err(err) = machine.write(input, value) {
                    if created {
                        artboard.handle().release_dependency(machine.handle())?;
                    }
                    return Err(err);
                }
                notices.append(&mut settled);
                start_state_machine(sets, machine, notices);
                Ok(true)
            })?;
            if written {
                self.started();
            }
            Ok(())
        })
    }

    fn write_path_input(&self, input: &str, path: &str, value: InputValue) -> Result<()> {
        self.control(|_| {
            let written = self.locked(|sets| -> Result<bool> {
                let Some(artboard) = sets.artboard() else {
                    log::debug!("set {path}/{input}: no active artboard");
                    return Ok(false);
                };
                match value {
                    InputValue::Trigger => artboard.fire_at_path(input, path)?,
                    InputValue::Boolean(v) => artboard.set_boolean_at_path(input, v, path)?,
                    InputValue::Number(v) => artboard.set_number_at_path(input, v, path)?,
                }
                sets.frame_requested = true;
                Ok(true)
            })?;
            if written {
                self.started();
            }
            Ok(())
        })
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if self.sets.get_mut().file.is_none() {
            return;
        }
        log::warn!("controller dropped while holding a file; releasing");
        let result = self
            .detach(false, &mut Vec::new())
            .and_then(|file| file.map_or(Ok(0), |file| file.release()));
        if let Err(err) = result {
            log::warn!("releasing dropped controller failed: {err}");
        }
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sets = self.sets.lock();
        f.debug_struct("Controller")
            .field("refs", &self.ref_count())
            .field("active", &self.is_active())
            .field("selected_artboard", &sets.selected_artboard)
            .field("animations", &sets.animations.len())
            .field("playing_animations", &sets.playing_animations.len())
            .field("state_machines", &sets.state_machines.len())
            .field("playing_state_machines", &sets.playing_state_machines.len())
            .finish()
    }
}

fn start_animation(
    sets: &mut PlaybackSets,
    animation: LinearAnimationInstance,
    created: bool,
    options: &PlayOptions,
    config: &ControllerConfig,
    notices: &mut Vec<Notice>,
) -> Result<()> {
    animation.set_loop_mode(config.resolve_loop(options.loop_mode))?;
    if created && options.direction == Direction::Backwards {
        animation.set_time(animation.end_time()?)?;
    }
    animation.set_direction(options.direction)?;
    sets.animations.insert(animation.clone());
    sets.playing_animations.insert(animation.clone());
    notices.push(Notice::Play(Playable::Animation(animation)));
    Ok(())
}

fn start_state_machine(
    sets: &mut PlaybackSets,
    machine: StateMachineInstance,
    notices: &mut Vec<Notice>,
) {
    sets.state_machines.insert(machine.clone());
    sets.playing_state_machines.insert(machine.clone());
    notices.push(Notice::Play(Playable::StateMachine(machine)));
}

fn stop_locked(
    sets: &mut PlaybackSets,
    selection: Selection<'_>,
    notices: &mut Vec<Notice>,
) -> Result<()> {
    let artboard = sets.artboard();
    let release = |handle: &NativeHandle| -> Result<()> {
        if let Some(artboard) = &artboard {
            artboard.handle().release_dependency(handle)?;
        }
        Ok(())
    };

    let animations: Vec<_> = sets
        .animations
        .iter()
        .filter(|a| selection.matches(PlayableKind::Animation, a.name()))
        .cloned()
        .collect();
    for animation in animations {
        sets.animations.shift_remove(&animation);
        sets.playing_animations.shift_remove(&animation);
        release(animation.handle())?;
        notices.push(Notice::Stop(Playable::Animation(animation)));
    }

    let machines: Vec<_> = sets
        .state_machines
        .iter()
        .filter(|m| selection.matches(PlayableKind::StateMachine, m.name()))
        .cloned()
        .collect();
    for machine in machines {
        sets.state_machines.shift_remove(&machine);
        sets.playing_state_machines.shift_remove(&machine);
        release(machine.handle())?;
        notices.push(Notice::Stop(Playable::StateMachine(machine)));
    }
    Ok(())
}

/// Advances by zero so the machine leaves its entry state.
fn settle(machine: &StateMachineInstance, notices: &mut Vec<Notice>) -> Result<()> {
    machine.advance(0.0)?;
    drain_machine(machine, notices)
}

fn drain_machine(machine: &StateMachineInstance, notices: &mut Vec<Notice>) -> Result<()> {
    for state in machine.states_changed()? {
        notices.push(Notice::StateChanged {
            state_machine: machine.name().to_string(),
            state,
        });
    }
    notices.extend(machine.events_reported()?.into_iter().map(Notice::Event));
    Ok(())
}

/// Turns a saved reference into the artboard's dependency reference.
fn adopt_instance(artboard: &Artboard, instance: &NativeHandle) -> Result<()> {
    if artboard.handle().is_dependency(instance) {
        instance.release()?;
    } else {
        artboard.handle().retain_dependency(instance.clone())?;
    }
    Ok(())
}
