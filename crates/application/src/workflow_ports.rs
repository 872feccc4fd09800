use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use triggergate_core::{AppResult, CorrelationId};
use triggergate_domain::{CallAddress, RunArtifact, WorkflowRun};

/// App installation identifier assigned by the workflow service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstallationId(i64);

impl InstallationId {
    /// Wraps a service-assigned installation id.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying id value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for InstallationId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Port for resolving per-call scoped credentials.
///
/// The orchestrator tries repository, organization, then user
/// installation in that order; the first hit is exchanged for a
/// scoped [`WorkflowRunGateway`]. Credentials are resolved fresh for
/// every call, never pooled.
#[async_trait]
pub trait InstallationDirectory: Send + Sync {
    /// Looks up the installation covering one repository.
    async fn find_repo_installation(
        &self,
        owner: &str,
        repo: &str,
    ) -> AppResult<Option<InstallationId>>;

    /// Looks up the installation covering an organization.
    async fn find_org_installation(&self, owner: &str) -> AppResult<Option<InstallationId>>;

    /// Looks up the installation covering a user account.
    async fn find_user_installation(&self, owner: &str) -> AppResult<Option<InstallationId>>;

    /// Exchanges an installation id for a gateway holding a token
    /// scoped to that installation.
    async fn gateway_for_installation(
        &self,
        installation: InstallationId,
    ) -> AppResult<Arc<dyn WorkflowRunGateway>>;
}

/// Port for the remote workflow control and query service.
///
/// The dispatch transport accepts only string-valued inputs; callers
/// coerce payload values before handing them over.
#[async_trait]
pub trait WorkflowRunGateway: Send + Sync {
    /// Dispatches the workflow at the address's ref with the given inputs.
    async fn dispatch_workflow(
        &self,
        address: &CallAddress,
        inputs: BTreeMap<String, String>,
    ) -> AppResult<()>;

    /// Lists runs of the workflow created at or after the given instant.
    async fn list_runs_created_after(
        &self,
        address: &CallAddress,
        created_after: DateTime<Utc>,
    ) -> AppResult<Vec<WorkflowRun>>;

    /// Fetches the current state of one run.
    async fn get_run(&self, owner: &str, repo: &str, run_id: i64) -> AppResult<WorkflowRun>;

    /// Lists the artifacts uploaded by one run.
    async fn list_run_artifacts(
        &self,
        owner: &str,
        repo: &str,
        run_id: i64,
    ) -> AppResult<Vec<RunArtifact>>;

    /// Downloads one artifact as a zip archive.
    async fn download_artifact(
        &self,
        owner: &str,
        repo: &str,
        artifact_id: i64,
    ) -> AppResult<Vec<u8>>;
}

/// Port for unpacking a downloaded result artifact.
///
/// Implementations stage the archive in a directory keyed by the
/// correlation id and must remove it on every exit path.
#[async_trait]
pub trait ResultUnpacker: Send + Sync {
    /// Extracts the archive and parses the result file inside it.
    async fn unpack(&self, correlation_id: CorrelationId, archive: Vec<u8>) -> AppResult<Value>;
}
