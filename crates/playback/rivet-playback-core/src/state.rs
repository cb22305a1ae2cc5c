//! Saved controller state: the references a controller needs to resume
//! exactly where it left off, for example across a view being torn down
//! and recreated.

use rivet_runtime_core::{
    Artboard, File, LinearAnimationInstance, NativeObject, Result, StateMachineInstance,
};

#[derive(Debug)]
pub(crate) struct SavedArtboard {
    pub(crate) artboard: Artboard,
    /// The controller instantiated it from the file itself.
    pub(crate) owned: bool,
}

/// One acquired reference per held handle. Hand it to
/// [`Controller::restore_state`](crate::Controller::restore_state), or
/// give the references back with [`dispose`](Self::dispose).
#[derive(Debug, Default)]
pub struct ControllerState {
    pub(crate) file: Option<File>,
    pub(crate) artboard: Option<SavedArtboard>,
    pub(crate) selected_artboard: Option<String>,
    /// Retained animations, flagged when they were playing.
    pub(crate) animations: Vec<(LinearAnimationInstance, bool)>,
    pub(crate) state_machines: Vec<(StateMachineInstance, bool)>,
}

impl ControllerState {
    pub fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    pub fn artboard(&self) -> Option<&Artboard> {
        self.artboard.as_ref().map(|saved| &saved.artboard)
    }

    pub fn selected_artboard(&self) -> Option<&str> {
        self.selected_artboard.as_deref()
    }

    /// Names of the instances that were playing when the state was saved.
    pub fn playing(&self) -> Vec<&str> {
        let animations = self
            .animations
            .iter()
            .filter(|(_, playing)| *playing)
            .map(|(animation, _)| animation.name());
        let machines = self
            .state_machines
            .iter()
            .filter(|(_, playing)| *playing)
            .map(|(machine, _)| machine.name());
        animations.chain(machines).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_none()
            && self.artboard.is_none()
            && self.animations.is_empty()
            && self.state_machines.is_empty()
    }

    /// Releases every held reference without restoring.
    pub fn dispose(mut self) -> Result<()> {
        self.release_all()
    }

    /// Moves the references out, leaving `self` empty.
    pub(crate) fn take(&mut self) -> ControllerState {
        std::mem::take(self)
    }

    /// Instances first, then the artboard, then the file. Keeps going after
    /// a failure and reports the first one.
    fn release_all(&mut self) -> Result<()> {
        let animations = std::mem::take(&mut self.animations);
        let state_machines = std::mem::take(&mut self.state_machines);
        let artboard = self.artboard.take();
        let file = self.file.take();
        self.selected_artboard = None;

        let mut first_error = None;
        let mut note = |result: Result<usize>| {
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        };
        for (animation, _) in &animations {
            note(animation.release());
        }
        for (machine, _) in &state_machines {
            note(machine.release());
        }
        if let Some(saved) = &artboard {
            note(saved.artboard.release());
        }
        if let Some(file) = &file {
            note(file.release());
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for ControllerState {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        log::warn!("controller state dropped without restore; releasing its references");
        if let Err(err) = self.release_all() {
            log::warn!("releasing dropped controller state failed: {err}");
        }
    }
}
