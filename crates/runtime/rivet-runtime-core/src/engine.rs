//! Boundary to the native animation/rendering engine.
//!
//! The engine hands out opaque pointers and trusts its caller completely: it
//! must never see a pointer after `dispose`, and must see `dispose` exactly
//! once per pointer. Everything in this crate exists to uphold that.

use std::fmt;
use std::num::NonZeroU64;

use crate::error::ImportError;
use crate::handle::HandleKind;
use crate::types::{
    AdvanceResult, Aabb, AnimationSnapshot, Direction, DrawParams, InputInfo, InputKind,
    InputValue, Loop, PlayableKind, PropertyValue, RendererType, ReportedEvent, SurfaceInfo,
};

/// Opaque pointer into the engine. Never zero.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NativeRef(NonZeroU64);

impl NativeRef {
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for NativeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// How to pick an artboard or playable out of its container.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Selector<'a> {
    Name(&'a str),
    Index(usize),
}

pub trait NativeEngine: Send + Sync + fmt::Debug {
    // --- lifecycle ---
    fn import_file(&self, bytes: &[u8]) -> Result<NativeRef, ImportError>;
    fn dispose(&self, kind: HandleKind, ptr: NativeRef);

    // --- file ---
    fn artboard_names(&self, file: NativeRef) -> Vec<String>;
    fn instance_artboard(&self, file: NativeRef, selector: Selector<'_>) -> Option<NativeRef>;
    fn view_model_names(&self, file: NativeRef) -> Vec<String>;
    fn instance_view_model(
        &self,
        file: NativeRef,
        view_model: &str,
        instance: Option<&str>,
    ) -> Option<NativeRef>;

    // --- artboard ---
    fn artboard_name(&self, artboard: NativeRef) -> String;
    fn artboard_bounds(&self, artboard: NativeRef) -> Aabb;
    fn playable_names(&self, artboard: NativeRef, kind: PlayableKind) -> Vec<String>;
    fn instance_playable(
        &self,
        artboard: NativeRef,
        kind: PlayableKind,
        selector: Selector<'_>,
    ) -> Option<NativeRef>;
    /// Advances artboard-level timelines. Returns whether anything changed.
    fn advance_artboard(&self, artboard: NativeRef, elapsed: f32) -> bool;
    fn nested_input_kind(&self, artboard: NativeRef, path: &str, input: &str) -> Option<InputKind>;
    fn set_nested_input(&self, artboard: NativeRef, path: &str, input: &str, value: InputValue);
    fn text_run(&self, artboard: NativeRef, name: &str) -> Option<String>;
    /// Returns false when no text run has that name.
    fn set_text_run(&self, artboard: NativeRef, name: &str, text: &str) -> bool;
    fn bind_view_model_instance(&self, target: NativeRef, instance: Option<NativeRef>);
    fn draw(&self, renderer: NativeRef, artboard: NativeRef, params: &DrawParams);

    // --- linear animation instance ---
    fn animation_snapshot(&self, animation: NativeRef) -> AnimationSnapshot;
    fn set_animation_time(&self, animation: NativeRef, time: f32);
    fn set_animation_direction(&self, animation: NativeRef, direction: Direction);
    fn set_animation_loop(&self, animation: NativeRef, mode: Loop);
    fn advance_animation(&self, animation: NativeRef, elapsed: f32) -> AdvanceResult;
    fn apply_animation(&self, animation: NativeRef, artboard: NativeRef, mix: f32);

    // --- state machine instance ---
    fn state_machine_name(&self, state_machine: NativeRef) -> String;
    fn state_machine_inputs(&self, state_machine: NativeRef) -> Vec<InputInfo>;
    fn input_value(&self, state_machine: NativeRef, input: &str) -> Option<InputValue>;
    fn set_input(&self, state_machine: NativeRef, input: &str, value: InputValue);
    /// Returns whether the machine still has work to do.
    fn advance_state_machine(&self, state_machine: NativeRef, elapsed: f32) -> bool;
    fn take_state_changes(&self, state_machine: NativeRef) -> Vec<String>;
    fn take_reported_events(&self, state_machine: NativeRef) -> Vec<ReportedEvent>;

    // --- view model instance ---
    fn view_model_instance_name(&self, instance: NativeRef) -> String;
    fn property(&self, instance: NativeRef, path: &str) -> Option<PropertyValue>;
    /// Returns false when the property is missing or has a different type.
    fn set_property(&self, instance: NativeRef, path: &str, value: PropertyValue) -> bool;

    // --- renderer ---
    fn make_renderer(&self, renderer: RendererType) -> Option<NativeRef>;
    fn bind_surface(&self, renderer: NativeRef, surface: Option<SurfaceInfo>);
}
