//! Listener traits, the event channel, and the notifications a controller
//! collects while it holds its locks.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use rivet_runtime_core::{
    LinearAnimationInstance, PlayableKind, ReportedEvent, StateMachineInstance,
};

/// An animation or state machine instance as seen by listeners.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Playable {
    Animation(LinearAnimationInstance),
    StateMachine(StateMachineInstance),
}

impl Playable {
    pub fn name(&self) -> &str {
        match self {
            Playable::Animation(animation) => animation.name(),
            Playable::StateMachine(machine) => machine.name(),
        }
    }

    pub fn kind(&self) -> PlayableKind {
        match self {
            Playable::Animation(_) => PlayableKind::Animation,
            Playable::StateMachine(_) => PlayableKind::StateMachine,
        }
    }
}

/// Playback notifications. Called synchronously on whichever thread noticed
/// the change: the control thread for explicit play/pause/stop, the worker
/// for loops, finishes and state changes.
#[allow(unused_variables)]
pub trait PlaybackListener: Send + Sync {
    fn notify_play(&self, playable: &Playable) {}
    fn notify_pause(&self, playable: &Playable) {}
    fn notify_stop(&self, playable: &Playable) {}
    fn notify_loop(&self, playable: &Playable) {}
    fn notify_state_changed(&self, state_machine: &str, state: &str) {}
    /// Once per advance pass that reached the artboard.
    fn notify_advance(&self, elapsed: f32) {}
}

/// Receives events reported by playing state machines.
pub trait EventListener: Send + Sync {
    fn notify_event(&self, event: &ReportedEvent);
}

/// Serializable form of a notification, as sent by [`ChannelListener`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEvent {
    Play { kind: PlayableKind, name: String },
    Pause { kind: PlayableKind, name: String },
    Stop { kind: PlayableKind, name: String },
    Loop { kind: PlayableKind, name: String },
    StateChanged { state_machine: String, state: String },
    Event { event: ReportedEvent },
}

/// Forwards notifications over an mpsc channel, typically from the worker
/// to the control thread. Advance ticks are not forwarded.
pub struct ChannelListener {
    sender: Mutex<Sender<PlaybackEvent>>,
}

impl ChannelListener {
    pub fn new() -> (Arc<Self>, Receiver<PlaybackEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Arc::new(Self {
                sender: Mutex::new(sender),
            }),
            receiver,
        )
    }

    fn send(&self, event: PlaybackEvent) {
        if self.sender.lock().send(event).is_err() {
            log::debug!("playback event dropped: receiver gone");
        }
    }

    fn describe(playable: &Playable) -> (PlayableKind, String) {
        (playable.kind(), playable.name().to_string())
    }
}

impl PlaybackListener for ChannelListener {
    fn notify_play(&self, playable: &Playable) {
        let (kind, name) = Self::describe(playable);
        self.send(PlaybackEvent::Play { kind, name });
    }

    fn notify_pause(&self, playable: &Playable) {
        let (kind, name) = Self::describe(playable);
        self.send(PlaybackEvent::Pause { kind, name });
    }

    fn notify_stop(&self, playable: &Playable) {
        let (kind, name) = Self::describe(playable);
        self.send(PlaybackEvent::Stop { kind, name });
    }

    fn notify_loop(&self, playable: &Playable) {
        let (kind, name) = Self::describe(playable);
        self.send(PlaybackEvent::Loop { kind, name });
    }

    fn notify_state_changed(&self, state_machine: &str, state: &str) {
        self.send(PlaybackEvent::StateChanged {
            state_machine: state_machine.to_string(),
            state: state.to_string(),
        });
    }
}

impl EventListener for ChannelListener {
    fn notify_event(&self, event: &ReportedEvent) {
        self.send(PlaybackEvent::Event {
            event: event.clone(),
        });
    }
}

/// Registry that hands out snapshots, so a listener may (un)register
/// listeners from inside a callback.
pub(crate) struct Listeners<L: ?Sized> {
    entries: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> Listeners<L> {
    fn same(a: &Arc<L>, b: &Arc<L>) -> bool {
        std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
    }

    /// Returns false if `listener` was already registered.
    pub(crate) fn add(&self, listener: Arc<L>) -> bool {
        let mut entries = self.entries.lock();
        if entries.iter().any(|existing| Self::same(existing, &listener)) {
            return false;
        }
        entries.push(listener);
        true
    }

    pub(crate) fn remove(&self, listener: &Arc<L>) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|existing| !Self::same(existing, listener));
        entries.len() != before
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries.lock().clone()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// A notification collected under the controller's locks and delivered
/// after they are released.
#[derive(Clone, Debug)]
pub(crate) enum Notice {
    Play(Playable),
    Pause(Playable),
    Stop(Playable),
    Loop(Playable),
    StateChanged { state_machine: String, state: String },
    Event(ReportedEvent),
    Advance(f32),
}

pub(crate) fn deliver(
    notices: &[Notice],
    playback: &[Arc<dyn PlaybackListener>],
    events: &[Arc<dyn EventListener>],
) {
    for notice in notices {
        match notice {
            Notice::Play(p) => playback.iter().for_each(|l| l.notify_play(p)),
            Notice::Pause(p) => playback.iter().for_each(|l| l.notify_pause(p)),
            Notice::Stop(p) => playback.iter().for_each(|l| l.notify_stop(p)),
            Notice::Loop(p) => playback.iter().for_each(|l| l.notify_loop(p)),
            Notice::StateChanged {
                state_machine,
                state,
            } => playback
                .iter()
                .for_each(|l| l.notify_state_changed(state_machine, state)),
            Notice::Event(event) => events.iter().for_each(|l| l.notify_event(event)),
            Notice::Advance(elapsed) => playback.iter().for_each(|l| l.notify_advance(*elapsed)),
        }
    }
}
