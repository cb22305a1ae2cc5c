//! Rivet playback core.
//!
//! A [`Controller`] owns the active artboard instance and the retained and
//! playing animation and state machine instances for one view. The control
//! thread drives it with play/pause/stop and input writes while a worker
//! calls [`Controller::advance`] every frame.

pub mod config;
pub mod controller;
pub mod listener;
pub mod state;

pub use config::{ControllerConfig, PlayOptions};
pub use controller::{Controller, StartCallback};
pub use listener::{ChannelListener, EventListener, Playable, PlaybackEvent, PlaybackListener};
pub use state::ControllerState;
