use crate::error::RuntimeError;
use crate::handle::{native_object, HandleKind, NativeHandle, WeakHandle};
use crate::types::{AdvanceResult, AnimationSnapshot, Direction, Loop};
use crate::Result;

/// One independently advancing timeline bound to an artboard instance.
#[derive(Clone)]
pub struct LinearAnimationInstance {
    handle: NativeHandle,
    artboard: WeakHandle,
    name: String,
}

native_object!(LinearAnimationInstance);

impl LinearAnimationInstance {
    pub(crate) fn new(handle: NativeHandle, artboard: &NativeHandle, name: String) -> Self {
        Self {
            handle,
            artboard: artboard.downgrade(),
            name,
        }
    }

    /// Name captured at instantiation. Readable after dispose.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> Result<AnimationSnapshot> {
        self.handle
            .with_object(|engine, ptr| engine.animation_snapshot(ptr))
    }

    pub fn time(&self) -> Result<f32> {
        self.snapshot().map(|s| s.time)
    }

    pub fn set_time(&self, time: f32) -> Result<()> {
        self.handle
            .with_object(|engine, ptr| engine.set_animation_time(ptr, time))
    }

    pub fn direction(&self) -> Result<Direction> {
        self.snapshot().map(|s| s.direction)
    }

    /// `Direction::Auto` leaves the direction unchanged.
    pub fn set_direction(&self, direction: Direction) -> Result<()> {
        if direction == Direction::Auto {
            return Ok(());
        }
        self.handle
            .with_object(|engine, ptr| engine.set_animation_direction(ptr, direction))
    }

    pub fn loop_mode(&self) -> Result<Loop> {
        self.snapshot().map(|s| s.loop_mode)
    }

    /// `Loop::Auto` leaves the authored loop mode in place.
    pub fn set_loop_mode(&self, mode: Loop) -> Result<()> {
        if mode == Loop::Auto {
            return Ok(());
        }
        self.handle
            .with_object(|engine, ptr| engine.set_animation_loop(ptr, mode))
    }

    pub fn fps(&self) -> Result<u32> {
        self.snapshot().map(|s| s.fps)
    }

    /// Duration in frames.
    pub fn duration(&self) -> Result<u32> {
        self.snapshot().map(|s| s.duration)
    }

    /// Seconds where playback starts (work area start if one is set).
    pub fn start_time(&self) -> Result<f32> {
        self.snapshot().map(|s| s.start_time)
    }

    /// Seconds where playback ends (work area end if one is set).
    pub fn end_time(&self) -> Result<f32> {
        self.snapshot().map(|s| s.end_time)
    }

    pub fn advance(&self, elapsed: f32) -> Result<AdvanceResult> {
        self.handle
            .with_object(|engine, ptr| engine.advance_animation(ptr, elapsed))
    }

    /// Applies the current time onto the owning artboard.
    pub fn apply(&self, mix: f32) -> Result<()> {
        let artboard = self
            .artboard
            .upgrade()
            .ok_or(RuntimeError::UseAfterDispose {
                kind: HandleKind::Artboard,
            })?;
        self.handle.with_object(|engine, animation| {
            artboard.with_object(|_, artboard| engine.apply_animation(animation, artboard, mix))
        })?
    }

    /// Advance followed by a full-strength apply, under one lock.
    pub fn advance_and_apply(&self, elapsed: f32) -> Result<AdvanceResult> {
        let _graph = self.handle.lock();
        let result = self.advance(elapsed)?;
        self.apply(1.0)?;
        Ok(result)
    }
}

impl std::fmt::Debug for LinearAnimationInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearAnimationInstance")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}
