use crate::animation::LinearAnimationInstance;
use crate::engine::Selector;
use crate::error::{LookupKind, RuntimeError};
use crate::file::selector_label;
use crate::handle::{lock_pair, native_object, HandleKind, NativeHandle, NativeObject};
use crate::renderer::Renderer;
use crate::state_machine::StateMachineInstance;
use crate::types::{Aabb, DrawParams, InputKind, InputValue, PlayableKind};
use crate::view_model::{Transfer, ViewModelInstance};
use crate::Result;

/// An artboard instance. Animation and state machine instances created
/// from it are retained as its dependencies.
#[derive(Clone, Debug)]
pub struct Artboard {
    pub(crate) handle: NativeHandle,
}

native_object!(Artboard);

impl Artboard {
    pub(crate) fn from_handle(handle: NativeHandle) -> Self {
        Self { handle }
    }

    pub fn name(&self) -> Result<String> {
        self.handle
            .with_object(|engine, ptr| engine.artboard_name(ptr))
    }

    pub fn bounds(&self) -> Result<Aabb> {
        self.handle
            .with_object(|engine, ptr| engine.artboard_bounds(ptr))
    }

    pub fn animation_names(&self) -> Result<Vec<String>> {
        self.playable_names(PlayableKind::Animation)
    }

    pub fn state_machine_names(&self) -> Result<Vec<String>> {
        self.playable_names(PlayableKind::StateMachine)
    }

    pub fn animation_count(&self) -> Result<usize> {
        self.animation_names().map(|names| names.len())
    }

    pub fn state_machine_count(&self) -> Result<usize> {
        self.state_machine_names().map(|names| names.len())
    }

    fn playable_names(&self, kind: PlayableKind) -> Result<Vec<String>> {
        self.handle
            .with_object(|engine, ptr| engine.playable_names(ptr, kind))
    }

    pub fn animation(&self, name: &str) -> Result<LinearAnimationInstance> {
        self.instance_animation(Selector::Name(name))
    }

    pub fn animation_at(&self, index: usize) -> Result<LinearAnimationInstance> {
        self.instance_animation(Selector::Index(index))
    }

    pub fn state_machine(&self, name: &str) -> Result<StateMachineInstance> {
        self.instance_state_machine(Selector::Name(name))
    }

    pub fn state_machine_at(&self, index: usize) -> Result<StateMachineInstance> {
        self.instance_state_machine(Selector::Index(index))
    }

    fn instance_animation(&self, selector: Selector<'_>) -> Result<LinearAnimationInstance> {
        let _graph = self.handle.lock();
        let handle = self.instance_playable(
            PlayableKind::Animation,
            HandleKind::LinearAnimationInstance,
            LookupKind::Animation,
            selector,
        )?;
        let name = handle.with_object(|engine, ptr| engine.animation_snapshot(ptr).name)?;
        Ok(LinearAnimationInstance::new(handle, &self.handle, name))
    }

    fn instance_state_machine(&self, selector: Selector<'_>) -> Result<StateMachineInstance> {
        let _graph = self.handle.lock();
        let handle = self.instance_playable(
            PlayableKind::StateMachine,
            HandleKind::StateMachineInstance,
            LookupKind::StateMachine,
            selector,
        )?;
        let name = handle.with_object(|engine, ptr| engine.state_machine_name(ptr))?;
        Ok(StateMachineInstance::new(handle, name))
    }

    fn instance_playable(
        &self,
        playable: PlayableKind,
        kind: HandleKind,
        lookup: LookupKind,
        selector: Selector<'_>,
    ) -> Result<NativeHandle> {
        let ptr = self
            .handle
            .with_object(|engine, ptr| engine.instance_playable(ptr, playable, selector))?
            .ok_or_else(|| RuntimeError::not_found(lookup, selector_label(selector)))?;
        let handle = self.handle.derive(kind, ptr);
        self.handle.retain_dependency(handle.clone())?;
        Ok(handle)
    }

    /// Advances artboard-level timelines (nested artboards, bindings).
    pub fn advance(&self, elapsed: f32) -> Result<bool> {
        self.handle
            .with_object(|engine, ptr| engine.advance_artboard(ptr, elapsed))
    }

    /// Kind of the input `input` on the nested artboard at `path`.
    pub fn input_kind_at_path(&self, input: &str, path: &str) -> Result<InputKind> {
        self.handle
            .with_object(|engine, ptr| engine.nested_input_kind(ptr, path, input))?
            .ok_or_else(|| RuntimeError::not_found(LookupKind::Input, format!("{path}/{input}")))
    }

    pub fn fire_at_path(&self, input: &str, path: &str) -> Result<()> {
        self.set_input_at_path(input, path, InputValue::Trigger)
    }

    pub fn set_boolean_at_path(&self, input: &str, value: bool, path: &str) -> Result<()> {
        self.set_input_at_path(input, path, InputValue::Boolean(value))
    }

    pub fn set_number_at_path(&self, input: &str, value: f32, path: &str) -> Result<()> {
        self.set_input_at_path(input, path, InputValue::Number(value))
    }

    fn set_input_at_path(&self, input: &str, path: &str, value: InputValue) -> Result<()> {
        let _graph = self.handle.lock();
        let actual = self.input_kind_at_path(input, path)?;
        if actual != value.kind() {
            return Err(RuntimeError::InputTypeMismatch {
                name: format!("{path}/{input}"),
                expected: value.kind(),
                actual,
            });
        }
        self.handle
            .with_object(|engine, ptr| engine.set_nested_input(ptr, path, input, value))
    }

    pub fn text_run(&self, name: &str) -> Result<String> {
        self.handle
            .with_object(|engine, ptr| engine.text_run(ptr, name))?
            .ok_or_else(|| RuntimeError::not_found(LookupKind::TextRun, name))
    }

    pub fn set_text_run(&self, name: &str, text: &str) -> Result<()> {
        let updated = self
            .handle
            .with_object(|engine, ptr| engine.set_text_run(ptr, name, text))?;
        if updated {
            Ok(())
        } else {
            Err(RuntimeError::not_found(LookupKind::TextRun, name))
        }
    }

    /// Binds `instance` for data binding, replacing any previous binding.
    /// The artboard keeps its own reference to the bound instance.
    pub fn bind_view_model_instance(&self, instance: &ViewModelInstance) -> Result<()> {
        bind_view_model(&self.handle, instance.handle(), false)
    }

    /// Completes `transfer` by binding its instance here. The transfer's
    /// reference becomes the binding's, so nothing is left to release.
    pub fn receive_view_model_instance(&self, transfer: Transfer) -> Result<()> {
        bind_view_model(&self.handle, &transfer.into_handle(), true)
    }

    /// Draws this artboard with `renderer`. Both handles are checked while
    /// the artboard's graph lock is held, so a concurrent dispose cannot land
    /// between the check and the native call.
    pub fn draw(&self, renderer: &Renderer, params: &DrawParams) -> Result<()> {
        self.handle.with_object(|_, artboard| {
            renderer
                .handle()
                .with_object(|engine, renderer| engine.draw(renderer, artboard, params))
        })?
    }
}

/// Shared by artboards and state machines: bind the new instance natively,
/// adopt a reference to it, then let go of the previous one. With `adopted`
/// the caller hands over a reference it already holds; either way that
/// reference ends up owned by the binding or released.
pub(crate) fn bind_view_model(
    target: &NativeHandle,
    instance: &NativeHandle,
    adopted: bool,
) -> Result<()> {
    if !adopted {
        instance.acquire()?;
    }
    let replaced = {
        let _graphs = lock_pair(target, instance);
        let previous = target.dependencies_of(HandleKind::ViewModelInstance);
        if previous.iter().any(|dep| dep.ptr_eq(instance)) {
            None
        } else {
            let bound = instance
                .with_object(|_, vmi| {
                    target.with_object(|engine, ptr| engine.bind_view_model_instance(ptr, Some(vmi)))
                })
                .and_then(|inner| inner)
                .and_then(|()| target.retain_dependency(instance.clone()));
            Some(bound.map(|()| previous))
        }
    };
    match replaced {
        // Already bound; the binding keeps the reference it has.
        None => instance.release().map(|_| ()),
        Some(Err(err)) => {
            instance.release()?;
            Err(err)
        }
        Some(Ok(previous)) => {
            for old in previous {
                target.release_dependency(&old)?;
            }
            Ok(())
        }
    }
}
