use serde::{Deserialize, Serialize};

/// Terminal status value reported by the workflow service.
const STATUS_COMPLETED: &str = "completed";

/// Conclusion value of a run that finished successfully.
const CONCLUSION_SUCCESS: &str = "success";

/// One execution instance of a dispatched workflow.
///
/// Transient: exists only while one orchestration call observes it
/// through polling, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Service-assigned run identifier.
    pub id: i64,
    /// Display name; contains the correlation id for gateway-dispatched runs.
    pub name: String,
    /// Lifecycle status (`queued`, `in_progress`, `completed`, ...).
    pub status: String,
    /// Conclusion once completed (`success`, `failure`, `cancelled`, ...).
    pub conclusion: Option<String>,
}

impl WorkflowRun {
    /// Returns whether the run reached its terminal status.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }

    /// Returns whether the run completed with a success conclusion.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.conclusion.as_deref() == Some(CONCLUSION_SUCCESS)
    }
}

/// One artifact uploaded by a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunArtifact {
    /// Service-assigned artifact identifier.
    pub id: i64,
    /// Artifact name; the gateway retrieves the one named `result`.
    pub name: String,
}
