use rivet_runtime_core::RuntimeError;
use thiserror::Error;

/// Errors surfaced by the render loop and its worker.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum RenderError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The worker has been terminated, or the loop deleted.
    #[error("render worker terminated")]
    WorkerTerminated,

    #[error("render worker panicked: {message}")]
    WorkerPanicked { message: String },

    #[error("failed to spawn render worker: {message}")]
    WorkerSpawn { message: String },
}

impl RenderError {
    /// Lifetime violations from the handle layer.
    pub fn is_lifetime_violation(&self) -> bool {
        matches!(self, RenderError::Runtime(err) if err.is_lifetime_violation())
    }
}

pub type Result<T> = core::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_runtime_core::HandleKind;

    #[test]
    fn runtime_errors_convert_and_classify() {
        let err: RenderError = RuntimeError::UseAfterDispose {
            kind: HandleKind::Renderer,
        }
        .into();
        assert!(err.is_lifetime_violation());
        assert_eq!(err.to_string(), "accessing a disposed Renderer");
        assert!(!RenderError::WorkerTerminated.is_lifetime_violation());
    }
}
