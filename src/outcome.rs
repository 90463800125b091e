//! Two-variant outcome of a remote operation.
//!
//! Every gateway call resolves to an [`Outcome`]: either the decoded value or
//! the [`EngineError`] describing why the engine (or the transport) refused.
//! Expected protocol errors never panic; the only escalation path is
//! [`Outcome::get`].

use crate::error::EngineError;

/// Raised when [`Outcome::get`] is called on a failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("called `Outcome::get()` on a failure: {0}")]
pub struct UnwrapFailure(pub EngineError);

/// Either a value or a structured engine error.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Outcome<T> {
    Success(T),
    Failure(EngineError),
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Self::Success(value)
    }

    pub fn failure(error: EngineError) -> Self {
        Self::Failure(error)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Peek at the value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(v) => Some(v),
            Self::Failure(_) => None,
        }
    }

    /// Peek at the error, if any.
    pub fn error(&self) -> Option<&EngineError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(e) => Some(e),
        }
    }

    /// Split into `(value, error)`; exactly one side is `Some`.
    pub fn into_parts(self) -> (Option<T>, Option<EngineError>) {
        match self {
            Self::Success(v) => (Some(v), None),
            Self::Failure(e) => (None, Some(e)),
        }
    }

    pub fn into_result(self) -> Result<T, EngineError> {
        self.into()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(v) => Outcome::Success(f(v)),
            Self::Failure(e) => Outcome::Failure(e),
        }
    }

    /// Return the value, or the fatal [`UnwrapFailure`] as a value.
    pub fn try_get(self) -> Result<T, UnwrapFailure> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure(e) => Err(UnwrapFailure(e)),
        }
    }

    /// Return the value unconditionally.
    ///
    /// # Panics
    ///
    /// Panics with an [`UnwrapFailure`] message if this is a `Failure`. This is
    /// the only operation on `Outcome` that can panic.
    pub fn get(self) -> T {
        match self.try_get() {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<T> From<Outcome<T>> for Result<T, EngineError> {
    fn from(outcome: Outcome<T>) -> Self {
        match outcome {
            Outcome::Success(v) => Ok(v),
            Outcome::Failure(e) => Err(e),
        }
    }
}

impl<T> From<Result<T, EngineError>> for Outcome<T> {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failure(e),
        }
    }
}
