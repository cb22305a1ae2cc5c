use serde::{Deserialize, Serialize};

use rivet_runtime_core::{Alignment, Direction, DrawParams, Fit, Loop, PlayableKind};

/// Controller settings. Every field has a default, so partial JSON works.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Loop override applied to every animation played without an explicit one.
    pub loop_mode: Loop,
    pub autoplay: bool,
    pub artboard_name: Option<String>,
    pub animation_name: Option<String>,
    pub state_machine_name: Option<String>,
    pub fit: Fit,
    pub alignment: Alignment,
    pub layout_scale_factor: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            loop_mode: Loop::Auto,
            autoplay: true,
            artboard_name: None,
            animation_name: None,
            state_machine_name: None,
            fit: Fit::default(),
            alignment: Alignment::default(),
            layout_scale_factor: 1.0,
        }
    }
}

impl ControllerConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn draw_params(&self) -> DrawParams {
        DrawParams {
            fit: self.fit,
            alignment: self.alignment,
            scale_factor: self.layout_scale_factor,
        }
    }

    /// Explicit request beats the configured default, which beats the
    /// animation's authored mode (`Auto`).
    pub(crate) fn resolve_loop(&self, requested: Loop) -> Loop {
        if requested != Loop::Auto {
            requested
        } else {
            self.loop_mode
        }
    }
}

/// How a playable should be started.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayOptions {
    pub loop_mode: Loop,
    pub direction: Direction,
    pub kind: PlayableKind,
    /// State machines only: advance by zero right away so the machine
    /// leaves its entry state before any input is applied.
    pub settle: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            loop_mode: Loop::Auto,
            direction: Direction::Auto,
            kind: PlayableKind::Animation,
            settle: true,
        }
    }
}

impl PlayOptions {
    pub fn animation() -> Self {
        Self::default()
    }

    pub fn state_machine() -> Self {
        Self {
            kind: PlayableKind::StateMachine,
            ..Self::default()
        }
    }

    pub fn with_loop(mut self, loop_mode: Loop) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn without_settle(mut self) -> Self {
        self.settle = false;
        self
    }
}
