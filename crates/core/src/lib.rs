//! Shared primitives for all Rust crates in Triggergate.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type used across Triggergate crates.
pub type AppResult<T> = Result<T, AppError>;

/// Per-call correlation value embedded in dispatch inputs and matched
/// against run names during discovery. Generated fresh for every call
/// and never reused; also keys the call's temporary artifact directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Creates a random correlation identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a correlation identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CorrelationId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Failure categories surfaced by the call pipeline.
///
/// An authorization denial is not an error: it is an `authorized = false`
/// decision and travels through the response contract, never through
/// this enum.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant at the request boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// Permission policy unreadable after the bounded retry.
    #[error("auth config unavailable: {0}")]
    ConfigUnavailable(String),

    /// No app installation resolvable for the target owner.
    #[error("credential error: {0}")]
    Credential(String),

    /// Workflow dispatch was rejected or unreachable.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Run discovery exhausted its polling budget without a match.
    #[error("run not found: {0}")]
    RunNotFound(String),

    /// Run finished with a non-success conclusion, or never finished
    /// before the caller's waiting deadline.
    #[error("run failed with conclusion '{conclusion}'")]
    RunFailed {
        /// Last observed conclusion, `"unresolved"` when the run never
        /// reached a completed status.
        conclusion: String,
    },

    /// The run produced no artifact named `result`.
    #[error("artifact missing: {0}")]
    ArtifactMissing(String),

    /// Artifact download, extraction, or result parsing failed.
    #[error("artifact unpack error: {0}")]
    ArtifactUnpack(String),

    /// External service call failed (network, key set, GitHub API).
    #[error("external service error: {0}")]
    External(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{AppError, CorrelationId};

    #[test]
    fn correlation_id_formats_as_uuid() {
        let correlation_id = CorrelationId::new();
        assert_eq!(correlation_id.to_string().len(), 36);
    }

    #[test]
    fn correlation_ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
    }

    #[test]
    fn run_failed_message_carries_conclusion() {
        let error = AppError::RunFailed {
            conclusion: "cancelled".to_owned(),
        };
        assert_eq!(error.to_string(), "run failed with conclusion 'cancelled'");
    }
}
