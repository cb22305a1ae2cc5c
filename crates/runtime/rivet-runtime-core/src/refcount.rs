//! Bare reference counter shared by native handles, surfaces and controllers.
//!
//! The counter is not synchronized; owners keep it behind their own lock so
//! that the count transition and the dispose it triggers happen together.

use crate::error::RuntimeError;
use crate::handle::HandleKind;

#[derive(Debug)]
pub struct RefCount {
    kind: HandleKind,
    count: usize,
    disposed: bool,
}

impl RefCount {
    /// A fresh count holding the creator's reference.
    pub fn new(kind: HandleKind) -> Self {
        Self {
            kind,
            count: 1,
            disposed: false,
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Adds a reference and returns the new count.
    pub fn acquire(&mut self) -> Result<usize, RuntimeError> {
        if self.disposed {
            return Err(RuntimeError::UseAfterDispose { kind: self.kind });
        }
        self.count += 1;
        Ok(self.count)
    }

    /// Drops a reference and returns the new count. Reaching zero marks the
    /// count disposed; the caller performs the actual release exactly then.
    pub fn release(&mut self) -> Result<usize, RuntimeError> {
        if self.count == 0 {
            return Err(RuntimeError::DoubleRelease { kind: self.kind });
        }
        self.count -= 1;
        if self.count == 0 {
            self.disposed = true;
        }
        Ok(self.count)
    }
}
