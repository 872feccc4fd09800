use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use triggergate_application::WorkflowRunGateway;
use triggergate_core::{AppError, AppResult};
use triggergate_domain::{CallAddress, RunArtifact, WorkflowRun};

#[derive(Debug, Deserialize)]
struct RunPayload {
    id: i64,
    name: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
}

impl From<RunPayload> for WorkflowRun {
    fn from(payload: RunPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name.unwrap_or_default(),
            status: payload.status.unwrap_or_default(),
            conclusion: payload.conclusion,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunListPayload {
    workflow_runs: Vec<RunPayload>,
}

#[derive(Debug, Deserialize)]
struct ArtifactPayload {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ArtifactListPayload {
    artifacts: Vec<ArtifactPayload>,
}

/// Workflow service client scoped to one installation token.
///
/// Built per call by the installation directory; the token lives only
/// as long as the gateway instance.
pub struct GithubWorkflowGateway {
    http_client: reqwest::Client,
    api_base_url: String,
    token: String,
}

impl GithubWorkflowGateway {
    /// Creates a gateway holding an installation-scoped token.
    #[must_use]
    pub fn new(http_client: reqwest::Client, api_base_url: String, token: String) -> Self {
        Self {
            http_client,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
            token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, format!("{}{path}", self.api_base_url))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, "triggergate-gateway")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .bearer_auth(&self.token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self
            .request(reqwest::Method::GET, path)
            .send()
            .await
            .map_err(|error| AppError::External(format!("request '{path}' failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::External(format!(
                "request '{path}' returned status {status}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|error| AppError::External(format!("response '{path}' parse failed: {error}")))
    }
}

#[async_trait]
impl WorkflowRunGateway for GithubWorkflowGateway {
    async fn dispatch_workflow(
        &self,
        address: &CallAddress,
        inputs: BTreeMap<String, String>,
    ) -> AppResult<()> {
        let path = format!(
            "/repos/{}/{}/actions/workflows/{}/dispatches",
            address.owner, address.repo, address.workflow_file
        );

        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&json!({ "ref": address.ref_name, "inputs": inputs }))
            .send()
            .await
            .map_err(|error| AppError::Dispatch(format!("dispatch request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Dispatch(format!(
                "dispatch returned status {status}: {body}"
            )));
        }

        Ok(())
    }

    async fn list_runs_created_after(
        &self,
        address: &CallAddress,
        created_after: DateTime<Utc>,
    ) -> AppResult<Vec<WorkflowRun>> {
        let created = created_after.to_rfc3339_opts(SecondsFormat::Secs, true);
        let path = format!(
            "/repos/{}/{}/actions/workflows/{}/runs?created=%3E%3D{created}",
            address.owner, address.repo, address.workflow_file
        );

        let payload: RunListPayload = self.get_json(&path).await?;
        Ok(payload
            .workflow_runs
            .into_iter()
            .map(WorkflowRun::from)
            .collect())
    }

    async fn get_run(&self, owner: &str, repo: &str, run_id: i64) -> AppResult<WorkflowRun> {
        let payload: RunPayload = self
            .get_json(&format!("/repos/{owner}/{repo}/actions/runs/{run_id}"))
            .await?;
        Ok(payload.into())
    }

    async fn list_run_artifacts(
        &self,
        owner: &str,
        repo: &str,
        run_id: i64,
    ) -> AppResult<Vec<RunArtifact>> {
        let payload: ArtifactListPayload = self
            .get_json(&format!(
                "/repos/{owner}/{repo}/actions/runs/{run_id}/artifacts"
            ))
            .await?;

        Ok(payload
            .artifacts
            .into_iter()
            .map(|artifact| RunArtifact {
                id: artifact.id,
                name: artifact.name,
            })
            .collect())
    }

    async fn download_artifact(
        &self,
        owner: &str,
        repo: &str,
        artifact_id: i64,
    ) -> AppResult<Vec<u8>> {
        let path = format!("/repos/{owner}/{repo}/actions/artifacts/{artifact_id}/zip");

        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .map_err(|error| {
                AppError::ArtifactUnpack(format!("artifact download failed: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ArtifactUnpack(format!(
                "artifact download returned status {status}"
            )));
        }

        let bytes = response.bytes().await.map_err(|error| {
            AppError::ArtifactUnpack(format!("artifact body read failed: {error}"))
        })?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::{ArtifactListPayload, RunListPayload, RunPayload};
    use triggergate_domain::WorkflowRun;

    #[test]
    fn run_list_payload_parses_and_fills_missing_fields() {
        let payload: RunListPayload = serde_json::from_str(
            r#"{
                "total_count": 2,
                "workflow_runs": [
                    {"id": 17, "name": "deploy 3f0e", "status": "completed",
                     "conclusion": "success", "event": "workflow_dispatch"},
                    {"id": 18, "name": null, "status": null, "conclusion": null}
                ]
            }"#,
        )
        .unwrap_or_else(|_| unreachable!());

        let runs: Vec<WorkflowRun> = payload
            .workflow_runs
            .into_iter()
            .map(WorkflowRun::from)
            .collect();

        assert_eq!(runs[0].id, 17);
        assert!(runs[0].is_success());
        assert_eq!(runs[1].name, "");
        assert_eq!(runs[1].status, "");
        assert!(runs[1].conclusion.is_none());
    }

    #[test]
    fn run_payload_parses_in_progress_run() {
        let payload: RunPayload = serde_json::from_str(
            r#"{"id": 42, "name": "deploy", "status": "in_progress", "conclusion": null}"#,
        )
        .unwrap_or_else(|_| unreachable!());

        let run = WorkflowRun::from(payload);
        assert!(!run.is_completed());
        assert!(!run.is_success());
    }

    #[test]
    fn artifact_list_payload_parses() {
        let payload: ArtifactListPayload = serde_json::from_str(
            r#"{
                "total_count": 1,
                "artifacts": [{"id": 9, "name": "result", "size_in_bytes": 128}]
            }"#,
        )
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(payload.artifacts.len(), 1);
        assert_eq!(payload.artifacts[0].name, "result");
    }
}
