//! Error Module
//!
//! Defines the caller-visible error taxonomy and the result alias used
//! throughout the invocation core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-visible failure classification for a dispatched call.
///
/// The variant is the classification: the pipeline checks it explicitly
/// instead of dispatching on downcast types.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvokeError {
    /// A pre-declared, method-specific failure. Always surfaced to the
    /// caller verbatim, never suppressed.
    #[error("{0}")]
    Business(String),

    /// Synthesized locally when a waiter's bound elapses before the
    /// executor delivers a result. Does not cancel the in-flight execution.
    #[error("async call remote service ({service}, {method}) timeout ({timeout_ms}) ms")]
    Timeout {
        service: String,
        method: String,
        timeout_ms: u64,
    },

    /// Any other failure raised by the executor or the machinery itself.
    #[error("execution error: {0}")]
    Execution(String),
}

impl InvokeError {
    /// Whether this error passes through error translation untouched.
    pub fn is_business(&self) -> bool {
        matches!(self, InvokeError::Business(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, InvokeError::Timeout { .. })
    }
}

impl From<serde_json::Error> for InvokeError {
    fn from(err: serde_json::Error) -> Self {
        InvokeError::Execution(format!("serialization error: {}", err))
    }
}

/// Result type alias for the invocation core
pub type Result<T> = std::result::Result<T, InvokeError>;
