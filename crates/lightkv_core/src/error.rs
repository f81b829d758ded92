//! Error types for LightKV core.

use lightkv_engine::Status;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in LightKV core operations.
///
/// An absent key is never an error: reads return `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The engine returned a nonzero status.
    #[error("engine error in {operation}: {status}")]
    Engine {
        /// The primitive that failed.
        operation: &'static str,
        /// The engine status.
        status: Status,
    },

    /// Operation not permitted in the current state. Detected before any
    /// engine call is made.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Why the operation is not permitted.
        message: String,
    },

    /// Invalid input to a public operation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the input.
        message: String,
    },

    /// A stored value could not be decoded into the requested type.
    #[error("cannot decode value: {message}")]
    Decode {
        /// Description of the mismatch.
        message: String,
    },

    /// The environment has been closed.
    #[error("environment is closed")]
    EnvironmentClosed,

    /// I/O error outside the engine.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates an engine error.
    pub fn engine(operation: &'static str, status: Status) -> Self {
        Self::Engine { operation, status }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Returns the engine status, if this is an engine error.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Engine { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for errors raised because of the current state.
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::EnvironmentClosed)
    }
}

/// Maps an engine status into a [`CoreError`] tagged with the primitive name.
pub(crate) trait StatusExt<T> {
    fn during(self, operation: &'static str) -> CoreResult<T>;
}

impl<T> StatusExt<T> for Result<T, Status> {
    fn during(self, operation: &'static str) -> CoreResult<T> {
        self.map_err(|status| CoreError::engine(operation, status))
    }
}

/// Maps the not-found sentinel to `None` on read paths.
pub(crate) fn found<T>(result: Result<T, Status>, operation: &'static str) -> CoreResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(status) if status.is_not_found() => Ok(None),
        Err(status) => Err(CoreError::engine(operation, status)),
    }
}
