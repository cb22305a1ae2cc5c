//! JSON document format understood by the simulator.
//!
//! A document is the simulator's stand-in for a binary file: artboards with
//! timelines, state machines, text runs and nested inputs, plus view models.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use rivet_runtime_core::{Aabb, InputKind, InputValue, Loop, PropertyValue};

/// Major format version this engine reads.
pub const SUPPORTED_MAJOR: u32 = 7;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub version: Version,
    #[serde(default)]
    pub artboards: Vec<ArtboardDoc>,
    #[serde(default)]
    pub view_models: Vec<ViewModelDoc>,
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    #[serde(default)]
    pub minor: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtboardDoc {
    pub name: String,
    #[serde(default)]
    pub bounds: Aabb,
    #[serde(default)]
    pub animations: Vec<AnimationDoc>,
    #[serde(default)]
    pub state_machines: Vec<StateMachineDoc>,
    #[serde(default)]
    pub text_runs: Vec<TextRunDoc>,
    #[serde(default)]
    pub nested: Vec<NestedDoc>,
}

fn default_fps() -> u32 {
    60
}

fn default_speed() -> f32 {
    1.0
}

fn default_loop() -> Loop {
    Loop::OneShot
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnimationDoc {
    pub name: String,
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Length in frames.
    pub duration: u32,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(rename = "loop", default = "default_loop")]
    pub loop_mode: Loop,
    #[serde(default)]
    pub work_start: Option<u32>,
    #[serde(default)]
    pub work_end: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateMachineDoc {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<InputDoc>,
    #[serde(default)]
    pub states: Vec<StateDoc>,
    #[serde(default)]
    pub transitions: Vec<TransitionDoc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InputDoc {
    Trigger {
        name: String,
    },
    Boolean {
        name: String,
        #[serde(default)]
        value: bool,
    },
    Number {
        name: String,
        #[serde(default)]
        value: f32,
    },
}

impl InputDoc {
    pub fn name(&self) -> &str {
        match self {
            InputDoc::Trigger { name }
            | InputDoc::Boolean { name, .. }
            | InputDoc::Number { name, .. } => name,
        }
    }

    pub fn kind(&self) -> InputKind {
        self.initial().kind()
    }

    pub fn initial(&self) -> InputValue {
        match self {
            InputDoc::Trigger { .. } => InputValue::Trigger,
            InputDoc::Boolean { value, .. } => InputValue::Boolean(*value),
            InputDoc::Number { value, .. } => InputValue::Number(*value),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateDoc {
    pub name: String,
    /// Seconds the state keeps the machine busy after being entered.
    #[serde(default)]
    pub duration: f32,
    /// Events reported when the state is entered.
    #[serde(default)]
    pub events: Vec<EventDoc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventDoc {
    pub name: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// `from` is a state name, `"entry"` or `"any"`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionDoc {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub condition: Condition,
}

pub const ENTRY: &str = "entry";
pub const ANY: &str = "any";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Condition {
    #[default]
    Always,
    Trigger {
        input: String,
    },
    Boolean {
        input: String,
        value: bool,
    },
    Number {
        input: String,
        op: Comparison,
        value: f32,
    },
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl Comparison {
    pub fn test(&self, lhs: f32, rhs: f32) -> bool {
        match self {
            Comparison::Equal => lhs == rhs,
            Comparison::NotEqual => lhs != rhs,
            Comparison::Less => lhs < rhs,
            Comparison::LessOrEqual => lhs <= rhs,
            Comparison::Greater => lhs > rhs,
            Comparison::GreaterOrEqual => lhs >= rhs,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextRunDoc {
    pub name: String,
    pub text: String,
}

/// Inputs exposed by a nested artboard, addressed by `path`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NestedDoc {
    pub path: String,
    #[serde(default)]
    pub inputs: Vec<InputDoc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewModelDoc {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDoc>,
    #[serde(default)]
    pub instances: Vec<ViewModelInstanceDoc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PropertyDoc {
    pub name: String,
    pub value: PropertyValue,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewModelInstanceDoc {
    pub name: String,
    #[serde(default)]
    pub values: HashMap<String, PropertyValue>,
}

impl Document {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn artboard(&self, name: &str) -> Option<&ArtboardDoc> {
        self.artboards.iter().find(|ab| ab.name == name)
    }

    pub fn view_model(&self, name: &str) -> Option<&ViewModelDoc> {
        self.view_models.iter().find(|vm| vm.name == name)
    }
}
