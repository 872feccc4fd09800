
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::Instant;
use triggergate_core::{AppError, AppResult, CorrelationId};
use triggergate_domain::{CallAddress, CallInput, CallType, RunArtifact, WorkflowRun};

use crate::{InstallationDirectory, ResultUnpacker, WorkflowRunGateway};

/// Reserved dispatch input key carrying the correlation id.
const CORRELATION_INPUT_KEY: &str = "run_unique_id";

/// Artifact name the result pipeline retrieves.
const RESULT_ARTIFACT_NAME: &str = "result";

/// Bounds for the two polling loops of one call.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Run discovery attempts before giving up.
    pub discovery_attempts: u32,
    /// Delay between discovery attempts.
    pub discovery_interval: Duration,
    /// Delay between status polls while waiting for completion.
    pub status_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            discovery_attempts: 15,
            discovery_interval: Duration::from_secs(2),
            status_interval: Duration::from_secs(4),
        }
    }
}

/// Orchestrates one authorized workflow call from credential
/// acquisition through artifact retrieval.
///
/// Holds no per-call state; safe for concurrent invocation. Only the
/// two polling loops retry; every other external failure propagates
/// unchanged on first error.
#[derive(Clone)]
pub struct WorkflowCallService {
    installation_directory: Arc<dyn InstallationDirectory>,
    result_unpacker: Arc<dyn ResultUnpacker>,
    poll: PollSettings,
}

impl WorkflowCallService {
    /// Creates a service with the default polling bounds.
    #[must_use]
    pub fn new(
        installation_directory: Arc<dyn InstallationDirectory>,
        result_unpacker: Arc<dyn ResultUnpacker>,
    ) -> Self {
        Self::with_poll_settings(installation_directory, result_unpacker, PollSettings::default())
    }

    /// Creates a service with explicit polling bounds.
    #[must_use]
    pub fn with_poll_settings(
        installation_directory: Arc<dyn InstallationDirectory>,
        result_unpacker: Arc<dyn ResultUnpacker>,
        poll: PollSettings,
    ) -> Self {
        Self {
            installation_directory,
            result_unpacker,
            poll,
        }
    }

    /// Runs the orchestration pipeline for one already-authorized call.
    ///
    /// Returns `Ok(None)` for call types that carry no result and
    /// `Ok(Some(value))` with the parsed `result` artifact for
    /// [`CallType::TriggerAndWaitResult`].
    pub async fn call(&self, call_input: &CallInput) -> AppResult<Option<Value>> {
        let address = &call_input.call_address;
        let gateway = self.resolve_gateway(address).await?;

        let correlation_id = CorrelationId::new();
        let dispatched_at = Utc::now();
        let deadline =
            Instant::now() + Duration::from_secs(call_input.max_waiting_time_in_seconds);

        let inputs = dispatch_inputs(&call_input.input, correlation_id);
        gateway
            .dispatch_workflow(address, inputs)
            .await
            .map_err(|error| {
                tracing::error!(%error, %correlation_id, "workflow dispatch failed");
                error
            })?;
        tracing::info!(
            %correlation_id,
            owner = %address.owner,
            repo = %address.repo,
            workflow_file = %address.workflow_file,
            "workflow dispatched"
        );

        if call_input.call_type == CallType::Trigger {
            return Ok(None);
        }

        let run = self
            .discover_run(gateway.as_ref(), address, correlation_id, dispatched_at)
            .await?;
        let run = self
            .wait_for_completion(gateway.as_ref(), address, run, deadline)
            .await?;

        if !run.is_success() {
            let conclusion = run
                .conclusion
                .unwrap_or_else(|| "unresolved".to_owned());
            tracing::error!(run_id = run.id, %conclusion, "run did not succeed");
            return Err(AppError::RunFailed { conclusion });
        }

        if call_input.call_type != CallType::TriggerAndWaitResult {
            return Ok(None);
        }

        let artifact = self
            .find_result_artifact(gateway.as_ref(), address, run.id)
            .await?;
        let archive = gateway
            .download_artifact(&address.owner, &address.repo, artifact.id)
            .await
            .map_err(|error| {
                tracing::error!(%error, artifact_id = artifact.id, "artifact download failed");
                error
            })?;

        let result = self.result_unpacker.unpack(correlation_id, archive).await?;
        Ok(Some(result))
    }

    /// Resolves a scoped gateway, trying repository, organization,
    /// then user installation; first success wins.
    async fn resolve_gateway(
        &self,
        address: &CallAddress,
    ) -> AppResult<Arc<dyn WorkflowRunGateway>> {
        let directory = self.installation_directory.as_ref();

        let installation = match directory
            .find_repo_installation(&address.owner, &address.repo)
            .await?
        {
            Some(installation) => Some(installation),
            None => match directory.find_org_installation(&address.owner).await? {
                Some(installation) => Some(installation),
                None => directory.find_user_installation(&address.owner).await?,
            },
        };

        let Some(installation) = installation else {
            return Err(AppError::Credential(format!(
                "no installation found for owner '{}' and repo '{}'",
                address.owner, address.repo
            )));
        };

        self.installation_directory
            .gateway_for_installation(installation)
            .await
            .map_err(|error| {
                tracing::error!(%error, %installation, "installation token exchange failed");
                error
            })
    }

    async fn discover_run(
        &self,
        gateway: &dyn WorkflowRunGateway,
        address: &CallAddress,
        correlation_id: CorrelationId,
        dispatched_at: DateTime<Utc>,
    ) -> AppResult<WorkflowRun> {
        let needle = correlation_id.to_string();

        for attempt in 1..=self.poll.discovery_attempts {
            let runs = gateway
                .list_runs_created_after(address, dispatched_at)
                .await
                .map_err(|error| {
                    tracing::error!(%error, attempt, "run listing failed");
                    error
                })?;

            if let Some(run) = runs.into_iter().find(|run| run.name.contains(&needle)) {
                return Ok(run);
            }

            if attempt < self.poll.discovery_attempts {
                tokio::time::sleep(self.poll.discovery_interval).await;
            }
        }

        Err(AppError::RunNotFound(format!(
            "no run matching correlation id {correlation_id} after {} attempts",
            self.poll.discovery_attempts
        )))
    }

    /// Polls the run until it completes or the deadline passes.
    ///
    /// On deadline expiry the last-observed state is returned as-is;
    /// the caller treats a never-completed run like a failed one.
    async fn wait_for_completion(
        &self,
        gateway: &dyn WorkflowRunGateway,
        address: &CallAddress,
        mut run: WorkflowRun,
        deadline: Instant,
    ) -> AppResult<WorkflowRun> {
        while Instant::now() < deadline {
            run = gateway
                .get_run(&address.owner, &address.repo, run.id)
                .await
                .map_err(|error| {
                    tracing::error!(%error, run_id = run.id, "run status poll failed");
                    error
                })?;

            if run.is_completed() {
                break;
            }

            tokio::time::sleep(self.poll.status_interval).await;
        }

        Ok(run)
    }

    async fn find_result_artifact(
        &self,
        gateway: &dyn WorkflowRunGateway,
        address: &CallAddress,
        run_id: i64,
    ) -> AppResult<RunArtifact> {
        let artifacts = gateway
            .list_run_artifacts(&address.owner, &address.repo, run_id)
            .await
            .map_err(|error| {
                tracing::error!(%error, run_id, "artifact listing failed");
                error
            })?;

        artifacts
            .into_iter()
            .find(|artifact| artifact.name == RESULT_ARTIFACT_NAME)
            .ok_or_else(|| {
                AppError::ArtifactMissing(format!(
                    "run {run_id} produced no artifact named '{RESULT_ARTIFACT_NAME}'"
                ))
            })
    }
}

/// Flattens the caller payload into string-valued dispatch inputs and
/// merges the correlation id under the reserved key.
///
/// Strings are passed verbatim; every other JSON value is serialized
/// compactly, since the dispatch transport accepts only strings.
fn dispatch_inputs(input: &Value, correlation_id: CorrelationId) -> BTreeMap<String, String> {
    let mut inputs: BTreeMap<String, String> = input
        .as_object()
        .map(|object| {
            object
                .iter()
                .map(|(key, value)| {
                    let coerced = match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), coerced)
                })
                .collect()
        })
        .unwrap_or_default();

    inputs.insert(CORRELATION_INPUT_KEY.to_owned(), correlation_id.to_string());
    inputs
}
