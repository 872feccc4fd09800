use serde::{Deserialize, Serialize};
use serde_json::Value;
use triggergate_core::{AppError, AppResult};

/// Smallest waiting budget a caller may request for a waited call.
pub const MIN_WAITING_TIME_SECONDS: u64 = 30;

/// Four-part identifier of one target workflow and branch.
///
/// Matching against permission policy entries is exact and
/// case-sensitive on all four fields; there are no wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAddress {
    /// Repository owner (user or organization login).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Workflow file name inside `.github/workflows`.
    #[serde(rename = "workflowFile")]
    pub workflow_file: String,
    /// Git ref the workflow is dispatched at.
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// How far the gateway follows a dispatched run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallType {
    /// Dispatch and return immediately.
    Trigger,
    /// Dispatch, then wait for the run to finish successfully.
    TriggerAndWait,
    /// Dispatch, wait, and return the run's `result` artifact content.
    TriggerAndWaitResult,
}

/// One authorized call, immutable once constructed from a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInput {
    /// Caller-supplied workflow inputs; coerced to string values at
    /// dispatch time.
    pub input: Value,
    /// Requested pipeline depth.
    #[serde(rename = "callType")]
    pub call_type: CallType,
    /// Target workflow address.
    #[serde(rename = "callAddress")]
    pub call_address: CallAddress,
    /// Deadline budget for the status wait, in seconds.
    #[serde(rename = "maxWaitingTimeInSeconds")]
    pub max_waiting_time_in_seconds: u64,
}

impl CallInput {
    /// Checks the boundary invariants of an incoming call.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_waiting_time_in_seconds < MIN_WAITING_TIME_SECONDS {
            return Err(AppError::Validation(format!(
                "maxWaitingTimeInSeconds must be at least {MIN_WAITING_TIME_SECONDS}, got {}",
                self.max_waiting_time_in_seconds
            )));
        }

        if !self.input.is_object() {
            return Err(AppError::Validation(
                "input must be a JSON object".to_owned(),
            ));
        }

        Ok(())
    }
}
