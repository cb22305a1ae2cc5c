//! Minimal state machine: typed inputs, guarded transitions, one transition
//! per advance, triggers cleared at the end of every advance.

use rivet_runtime_core::{InputInfo, InputValue, ReportedEvent};

use crate::document::{Condition, InputDoc, StateDoc, StateMachineDoc, TransitionDoc, ANY, ENTRY};

#[derive(Clone, Debug)]
pub(crate) struct InputSlot {
    pub(crate) name: String,
    pub(crate) value: InputValue,
    /// Triggers only: fired since the last advance.
    pub(crate) fired: bool,
}

impl InputSlot {
    pub(crate) fn from_doc(doc: &InputDoc) -> Self {
        Self {
            name: doc.name().to_string(),
            value: doc.initial(),
            fired: false,
        }
    }

    pub(crate) fn write(&mut self, value: InputValue) {
        match value {
            InputValue::Trigger => self.fired = true,
            other => self.value = other,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Machine {
    pub(crate) name: String,
    pub(crate) inputs: Vec<InputSlot>,
    states: Vec<StateDoc>,
    transitions: Vec<TransitionDoc>,
    current: Option<usize>,
    state_time: f32,
    changes: Vec<String>,
    events: Vec<ReportedEvent>,
    pub(crate) bound_view_model: Option<u64>,
}

impl Machine {
    pub(crate) fn new(doc: &StateMachineDoc) -> Self {
        Self {
            name: doc.name.clone(),
            inputs: doc.inputs.iter().map(InputSlot::from_doc).collect(),
            states: doc.states.clone(),
            transitions: doc.transitions.clone(),
            current: None,
            state_time: 0.0,
            changes: Vec::new(),
            events: Vec::new(),
            bound_view_model: None,
        }
    }

    pub(crate) fn input_infos(&self) -> Vec<InputInfo> {
        self.inputs
            .iter()
            .map(|slot| InputInfo {
                name: slot.name.clone(),
                kind: slot.value.kind(),
            })
            .collect()
    }

    pub(crate) fn input_mut(&mut self, name: &str) -> Option<&mut InputSlot> {
        self.inputs.iter_mut().find(|slot| slot.name == name)
    }

    pub(crate) fn input(&self, name: &str) -> Option<&InputSlot> {
        self.inputs.iter().find(|slot| slot.name == name)
    }

    pub(crate) fn current_state(&self) -> Option<&str> {
        self.current.map(|index| self.states[index].name.as_str())
    }

    pub(crate) fn advance(&mut self, elapsed: f32) -> bool {
        self.state_time += elapsed;
        let transitioned = match self.next_state() {
            Some(index) => {
                self.enter(index);
                true
            }
            None => false,
        };
        for slot in &mut self.inputs {
            slot.fired = false;
        }
        let busy = self
            .current
            .map(|index| self.states[index].duration > self.state_time)
            .unwrap_or(false);
        transitioned || busy
    }

    fn next_state(&self) -> Option<usize> {
        let current = self.current_state();
        self.transitions
            .iter()
            .filter(|t| match (t.from.as_str(), current) {
                (ENTRY, None) => true,
                (ANY, Some(state)) => t.to != state,
                (from, Some(state)) => from == state,
                _ => false,
            })
            .find(|t| self.satisfied(&t.condition))
            .and_then(|t| self.states.iter().position(|s| s.name == t.to))
    }

    fn satisfied(&self, condition: &Condition) -> bool {
        match condition {
            Condition::Always => true,
            Condition::Trigger { input } => self.input(input).is_some_and(|slot| slot.fired),
            Condition::Boolean { input, value } => self
                .input(input)
                .is_some_and(|slot| slot.value == InputValue::Boolean(*value)),
            Condition::Number { input, op, value } => {
                self.input(input).is_some_and(|slot| match slot.value {
                    InputValue::Number(current) => op.test(current, *value),
                    _ => false,
                })
            }
        }
    }

    fn enter(&mut self, index: usize) {
        self.current = Some(index);
        self.state_time = 0.0;
        let state = &self.states[index];
        self.changes.push(state.name.clone());
        self.events
            .extend(state.events.iter().map(|event| ReportedEvent {
                name: event.name.clone(),
                delay_seconds: 0.0,
                properties: event.properties.clone(),
            }));
    }

    pub(crate) fn take_changes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.changes)
    }

    pub(crate) fn take_events(&mut self) -> Vec<ReportedEvent> {
        std::mem::take(&mut self.events)
    }
}
