//! Rivet runtime core.
//!
//! Reference-counted handles over a native animation engine. A [`File`] is
//! imported through a [`Runtime`]; artboards, timeline and state machine
//! instances and view model instances are derived from it and form a
//! dependency graph rooted at the file. Releasing a handle's last reference
//! releases its dependencies and then disposes the native object, exactly
//! once. Accessing a disposed handle is an error, never a read of freed
//! memory.

pub mod animation;
pub mod artboard;
pub mod context;
pub mod engine;
pub mod error;
pub mod file;
pub mod handle;
pub mod refcount;
pub mod renderer;
pub mod state_machine;
pub mod types;
pub mod view_model;

pub use animation::LinearAnimationInstance;
pub use artboard::Artboard;
pub use context::{Runtime, RuntimeConfig};
pub use engine::{NativeEngine, NativeRef, Selector};
pub use error::{ImportError, LookupKind, RuntimeError};
pub use file::File;
pub use handle::{GraphGuard, HandleKind, NativeHandle, NativeObject};
pub use refcount::RefCount;
pub use renderer::Renderer;
pub use state_machine::StateMachineInstance;
pub use types::{
    AdvanceResult, Aabb, Alignment, AnimationSnapshot, Direction, DrawParams, Fit, InputInfo,
    InputKind, InputValue, Loop, PlayableKind, PropertyValue, RendererType, ReportedEvent,
    SurfaceInfo,
};
pub use view_model::{Transfer, ViewModelInstance};

pub type Result<T> = core::result::Result<T, RuntimeError>;
