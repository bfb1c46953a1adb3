//! Error types for apply operations.
//!
//! Every failure carries where it happened (phase and class) while keeping
//! the appliance's own message intact.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::store::{ErrorKind, StoreError, StoreResult};

/// The part of a run an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Creating and modifying declared objects
    Apply,
    /// Removing objects present only in current state
    Delete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Apply => "apply",
            Phase::Delete => "delete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for apply operations.
pub type ApplyResult<T> = Result<T, ApplyError>;

/// Errors that can occur while reconciling the appliance.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A store call failed.
    #[error("{phase} phase failed for {class}: {source}")]
    Store {
        /// Phase in progress.
        phase: Phase,
        /// Object class being processed.
        class: String,
        /// The appliance error, verbatim.
        #[source]
        source: StoreError,
    },

    /// A declared or current object could not be interpreted.
    #[error("Invalid {class} '{name}': {message}")]
    InvalidObject {
        /// Object class.
        class: String,
        /// Object name.
        name: String,
        /// What was wrong.
        message: String,
    },

    /// State the engine needs was absent from the current config.
    #[error("Missing current state for {class} '{name}': {message}")]
    MissingCurrentState {
        /// Object class.
        class: String,
        /// Object name.
        name: String,
        /// What was missing.
        message: String,
    },

    /// A handler in the pipeline failed.
    #[error("{handler}: {source}")]
    Handler {
        /// Handler name.
        handler: String,
        /// The handler's error.
        #[source]
        source: Box<ApplyError>,
    },

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApplyError {
    /// Creates a store error annotated with phase and class.
    pub fn store(phase: Phase, class: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            phase,
            class: class.into(),
            source,
        }
    }

    /// Creates an invalid object error.
    pub fn invalid_object(
        class: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidObject {
            class: class.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a missing current state error.
    pub fn missing_current_state(
        class: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MissingCurrentState {
            class: class.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Wraps this error with the failing handler's name.
    pub fn in_handler(self, handler: impl Into<String>) -> Self {
        Self::Handler {
            handler: handler.into(),
            source: Box::new(self),
        }
    }

    /// Returns the underlying store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ApplyError::Store { source, .. } => Some(source),
            ApplyError::Handler { source, .. } => source.store_error(),
            _ => None,
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on a later run.
    pub fn is_retryable(&self) -> bool {
        self.store_error()
            .is_some_and(|e| e.kind() == ErrorKind::Transient)
    }
}

/// Annotates store results with phase and class.
pub trait StoreResultExt<T> {
    fn in_phase(self, phase: Phase, class: &str) -> ApplyResult<T>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn in_phase(self, phase: Phase, class: &str) -> ApplyResult<T> {
        self.map_err(|e| ApplyError::store(phase, class, e))
    }
}
