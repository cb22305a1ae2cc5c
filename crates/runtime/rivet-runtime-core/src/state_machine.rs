use crate::artboard::bind_view_model;
use crate::error::{LookupKind, RuntimeError};
use crate::handle::{native_object, NativeHandle, NativeObject};
use crate::types::{InputInfo, InputKind, InputValue, ReportedEvent};
use crate::view_model::{Transfer, ViewModelInstance};
use crate::Result;

/// A state machine instance bound to an artboard instance.
#[derive(Clone)]
pub struct StateMachineInstance {
    handle: NativeHandle,
    name: String,
}

native_object!(StateMachineInstance);

impl StateMachineInstance {
    pub(crate) fn new(handle: NativeHandle, name: String) -> Self {
        Self { handle, name }
    }

    /// Name captured at instantiation. Readable after dispose.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> Result<Vec<InputInfo>> {
        self.handle
            .with_object(|engine, ptr| engine.state_machine_inputs(ptr))
    }

    pub fn input_kind(&self, input: &str) -> Result<InputKind> {
        self.inputs()?
            .into_iter()
            .find(|info| info.name == input)
            .map(|info| info.kind)
            .ok_or_else(|| RuntimeError::not_found(LookupKind::Input, input))
    }

    pub fn fire(&self, input: &str) -> Result<()> {
        self.write(input, InputValue::Trigger)
    }

    pub fn set_boolean(&self, input: &str, value: bool) -> Result<()> {
        self.write(input, InputValue::Boolean(value))
    }

    pub fn set_number(&self, input: &str, value: f32) -> Result<()> {
        self.write(input, InputValue::Number(value))
    }

    /// Writes any kind of input value after checking the input's kind.
    pub fn write(&self, input: &str, value: InputValue) -> Result<()> {
        let _graph = self.handle.lock();
        self.expect_kind(input, value.kind())?;
        self.handle
            .with_object(|engine, ptr| engine.set_input(ptr, input, value))
    }

    pub fn boolean(&self, input: &str) -> Result<bool> {
        match self.read(input, InputKind::Boolean)? {
            InputValue::Boolean(value) => Ok(value),
            other => Err(self.mismatch(input, InputKind::Boolean, other.kind())),
        }
    }

    pub fn number(&self, input: &str) -> Result<f32> {
        match self.read(input, InputKind::Number)? {
            InputValue::Number(value) => Ok(value),
            other => Err(self.mismatch(input, InputKind::Number, other.kind())),
        }
    }

    fn read(&self, input: &str, expected: InputKind) -> Result<InputValue> {
        let _graph = self.handle.lock();
        self.expect_kind(input, expected)?;
        self.handle
            .with_object(|engine, ptr| engine.input_value(ptr, input))?
            .ok_or_else(|| RuntimeError::not_found(LookupKind::Input, input))
    }

    fn expect_kind(&self, input: &str, expected: InputKind) -> Result<()> {
        let actual = self.input_kind(input)?;
        if actual == expected {
            Ok(())
        } else {
            Err(self.mismatch(input, expected, actual))
        }
    }

    fn mismatch(&self, input: &str, expected: InputKind, actual: InputKind) -> RuntimeError {
        RuntimeError::InputTypeMismatch {
            name: input.to_string(),
            expected,
            actual,
        }
    }

    /// Returns whether the machine still has work to do.
    pub fn advance(&self, elapsed: f32) -> Result<bool> {
        self.handle
            .with_object(|engine, ptr| engine.advance_state_machine(ptr, elapsed))
    }

    /// Layer states entered since the last call, in order.
    pub fn states_changed(&self) -> Result<Vec<String>> {
        self.handle
            .with_object(|engine, ptr| engine.take_state_changes(ptr))
    }

    /// Events reported since the last call, in order.
    pub fn events_reported(&self) -> Result<Vec<ReportedEvent>> {
        self.handle
            .with_object(|engine, ptr| engine.take_reported_events(ptr))
    }

    pub fn bind_view_model_instance(&self, instance: &ViewModelInstance) -> Result<()> {
        bind_view_model(&self.handle, instance.handle(), false)
    }

    /// Binds the transferred instance, taking over the transfer's reference.
    pub fn receive_view_model_instance(&self, transfer: Transfer) -> Result<()> {
        bind_view_model(&self.handle, &transfer.into_handle(), true)
    }
}

impl std::fmt::Debug for StateMachineInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachineInstance")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}
