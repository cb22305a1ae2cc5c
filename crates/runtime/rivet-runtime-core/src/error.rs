//! Error taxonomy for handle access and file loading.
//!
//! Lifetime violations (`UseAfterDispose`, `DoubleRelease`) are programmer
//! errors and are always returned to the caller. "Nothing to do" situations
//! never produce an error; callers treat them as no-ops.

use serde::{Deserialize, Serialize};

use crate::handle::HandleKind;
use crate::types::InputKind;

/// What a failed name lookup was looking for.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum LookupKind {
    Artboard,
    Animation,
    StateMachine,
    Input,
    TextRun,
    ViewModel,
    ViewModelInstance,
    Property,
}

impl LookupKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Artboard => "artboard",
            Self::Animation => "animation",
            Self::StateMachine => "state machine",
            Self::Input => "input",
            Self::TextRun => "text run",
            Self::ViewModel => "view model",
            Self::ViewModelInstance => "view model instance",
            Self::Property => "property",
        }
    }
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RuntimeError {
    /// Access through a handle whose native object was already disposed.
    #[error("accessing a disposed {kind}")]
    UseAfterDispose { kind: HandleKind },

    /// `release()` on a handle whose reference count is already zero.
    #[error("{kind} released more times than it was acquired")]
    DoubleRelease { kind: HandleKind },

    /// Named artboard, playable, input or property does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: LookupKind, name: String },

    /// Input exists but holds a different kind of value.
    #[error("input {name} is a {actual:?}, not a {expected:?}")]
    InputTypeMismatch {
        name: String,
        expected: InputKind,
        actual: InputKind,
    },

    /// Engine could not parse the file bytes.
    #[error("malformed file: {reason}")]
    MalformedFile { reason: String },

    /// File was authored for an incompatible runtime.
    #[error("unsupported file version {major}.{minor} (runtime supports {expected_major}.x)")]
    UnsupportedVersion {
        major: u32,
        minor: u32,
        expected_major: u32,
    },

    /// Engine refused to create a renderer of the requested type.
    #[error("renderer unavailable: {renderer}")]
    RendererUnavailable { renderer: String },
}

impl RuntimeError {
    pub fn not_found(kind: LookupKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// True for errors that indicate a broken ownership contract.
    #[inline]
    pub fn is_lifetime_violation(&self) -> bool {
        matches!(
            self,
            Self::UseAfterDispose { .. } | Self::DoubleRelease { .. }
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::UseAfterDispose { .. } | Self::DoubleRelease { .. } => "lifetime",
            Self::NotFound { .. } | Self::InputTypeMismatch { .. } => "lookup",
            Self::MalformedFile { .. } | Self::UnsupportedVersion { .. } => "import",
            Self::RendererUnavailable { .. } => "renderer",
        }
    }
}

/// Failure reported by the engine while importing file bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    Malformed(String),
    UnsupportedVersion { major: u32, minor: u32, expected_major: u32 },
}

impl From<ImportError> for RuntimeError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Malformed(reason) => RuntimeError::MalformedFile { reason },
            ImportError::UnsupportedVersion {
                major,
                minor,
                expected_major,
            } => RuntimeError::UnsupportedVersion {
                major,
                minor,
                expected_major,
            },
        }
    }
}
