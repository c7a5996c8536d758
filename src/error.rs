use std::io;

use thiserror::Error;

/// The error taxonomy for a map-reduce job.
///
/// Every fallible operation in this crate ultimately resolves to one of
/// these four kinds; the orchestrator surfaces only the first error a job
/// encounters (see [`crate::orchestrator`]).
#[derive(Debug, Error)]
pub enum MrError {
    /// Invalid job configuration, caught before any worker thread starts.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A read, write, open, or close failure against a shard or framed file.
    #[error("io error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// `map_fn` or `reduce_fn` panicked.
    #[error("user code failed: {message}")]
    UserCode { message: String },

    /// A decoded record violated the framing contract (e.g. a short payload).
    #[error("invariant violation: {message}")]
    InvariantViolation { message: String },
}

impl MrError {
    pub fn configuration(message: impl Into<String>) -> Self {
        MrError::Configuration { message: message.into() }
    }

    pub fn user_code(message: impl Into<String>) -> Self {
        MrError::UserCode { message: message.into() }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        MrError::InvariantViolation { message: message.into() }
    }

    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        MrError::Io { message: message.into(), source: Some(source) }
    }

    /// Short, stable discriminant for callers that want to match on kind
    /// without destructuring the full enum.
    pub fn kind(&self) -> &'static str {
        match self {
            MrError::Configuration { .. } => "configuration",
            MrError::Io { .. } => "io",
            MrError::UserCode { .. } => "user-code",
            MrError::InvariantViolation { .. } => "invariant-violation",
        }
    }
}

impl From<io::Error> for MrError {
    fn from(e: io::Error) -> Self {
        MrError::Io { message: e.to_string(), source: Some(e) }
    }
}

pub type Result<T> = std::result::Result<T, MrError>;

/// Extracts a human-readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker task panicked with a non-string payload".to_string()
    }
}
