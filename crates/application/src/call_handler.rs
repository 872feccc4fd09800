use serde::Deserialize;
use serde_json::Value;
use triggergate_core::AppResult;
use triggergate_domain::CallInput;

use crate::{AuthorizationService, WorkflowCallService};

/// One incoming gateway call.
#[derive(Debug, Clone, Deserialize)]
pub struct CallRequest {
    /// Caller's identity token.
    pub token: String,
    /// The requested call.
    #[serde(rename = "callInput")]
    pub call_input: CallInput,
}

/// Capability set through which a transport reports the call outcome.
///
/// Implemented once per transport adapter; the handler invokes exactly
/// one capability per call.
pub trait CallResponder: Send {
    /// The request failed boundary validation.
    fn bad_request(&mut self, info: String);

    /// The caller's groups hold no matching permission.
    fn no_group_permission(&mut self);

    /// The pipeline failed after authorization, or the authorization
    /// check itself could not be carried out.
    fn error(&mut self, info: String);

    /// The call completed; `result` is set for result-bearing calls.
    fn success(&mut self, result: Option<Value>);
}

/// Top-level coordinator: authorization, then orchestration, reported
/// through the transport-agnostic response contract.
#[derive(Clone)]
pub struct CallHandler {
    authorization: AuthorizationService,
    workflow_calls: WorkflowCallService,
}

enum CallOutcome {
    Denied,
    Completed(Option<Value>),
}

impl CallHandler {
    /// Creates a handler from the two pipeline services.
    #[must_use]
    pub fn new(authorization: AuthorizationService, workflow_calls: WorkflowCallService) -> Self {
        Self {
            authorization,
            workflow_calls,
        }
    }

    /// Processes one call and reports through the responder.
    ///
    /// Every failure raised anywhere in the pipeline — including
    /// inside the authorization check — is caught here and reported
    /// via `error`; nothing is left unhandled.
    pub async fn call(&self, request: &CallRequest, responder: &mut dyn CallResponder) {
        if let Err(error) = request.call_input.validate() {
            responder.bad_request(error.to_string());
            return;
        }

        match self.process(request).await {
            Ok(CallOutcome::Denied) => responder.no_group_permission(),
            Ok(CallOutcome::Completed(result)) => responder.success(result),
            Err(error) => {
                tracing::error!(%error, "call pipeline failed");
                responder.error(error.to_string());
            }
        }
    }

    async fn process(&self, request: &CallRequest) -> AppResult<CallOutcome> {
        let decision = self
            .authorization
            .check_auth(&request.token, &request.call_input.call_address)
            .await?;

        let Some(group) = decision.group else {
            return Ok(CallOutcome::Denied);
        };

        tracing::info!(
            group = %group.unique_group_name,
            owner = %request.call_input.call_address.owner,
            repo = %request.call_input.call_address.repo,
            workflow_file = %request.call_input.call_address.workflow_file,
            ref_name = %request.call_input.call_address.ref_name,
            "group authorized for call"
        );

        let result = self.workflow_calls.call(&request.call_input).await?;
        Ok(CallOutcome::Completed(result))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tokio::sync::Mutex;

    use triggergate_core::{AppError, AppResult, CorrelationId};
    use triggergate_domain::{
        AuthConfig, CallAddress, CallInput, CallPermission, CallType, GroupInfo, GroupPermissions,
    };

    use crate::workflow_ports::{
        InstallationDirectory, InstallationId, ResultUnpacker, WorkflowRunGateway,
    };
    use crate::{AuthConfigStore, AuthorizationService, TokenVerifier, WorkflowCallService};

    use super::{CallHandler, CallRequest, CallResponder};

    struct FakeTokenVerifier {
        valid: bool,
    }

    #[async_trait]
    impl TokenVerifier for FakeTokenVerifier {
        async fn validate(&self, _token: &str) -> AppResult<bool> {
            Ok(self.valid)
        }

        async fn group_infos(&self, _token: &str) -> AppResult<Vec<GroupInfo>> {
            Ok(vec![GroupInfo {
                unique_group_name: "acme/infra".to_owned(),
            }])
        }
    }

    struct FakeAuthConfigStore {
        config: AuthConfig,
    }

    #[async_trait]
    impl AuthConfigStore for FakeAuthConfigStore {
        async fn load(&self) -> AppResult<AuthConfig> {
            Ok(self.config.clone())
        }
    }

    struct FakeDirectory {
        gateway: Arc<FakeGateway>,
        fail_lookup: bool,
    }

    #[async_trait]
    impl InstallationDirectory for FakeDirectory {
        async fn find_repo_installation(
            &self,
            _owner: &str,
            _repo: &str,
        ) -> AppResult<Option<InstallationId>> {
            if self.fail_lookup {
                return Err(AppError::External("installation lookup failed".to_owned()));
            }
            Ok(Some(InstallationId::new(1)))
        }

        async fn find_org_installation(&self, _owner: &str) -> AppResult<Option<InstallationId>> {
            Ok(None)
        }

        async fn find_user_installation(&self, _owner: &str) -> AppResult<Option<InstallationId>> {
            Ok(None)
        }

        async fn gateway_for_installation(
            &self,
            _installation: InstallationId,
        ) -> AppResult<Arc<dyn WorkflowRunGateway>> {
            Ok(self.gateway.clone())
        }
    }

    #[derive(Default)]
    struct FakeGateway {
        dispatch_count: Mutex<u32>,
    }

    #[async_trait]
    impl WorkflowRunGateway for FakeGateway {
        async fn dispatch_workflow(
            &self,
            _address: &CallAddress,
            _inputs: std::collections::BTreeMap<String, String>,
        ) -> AppResult<()> {
            *self.dispatch_count.lock().await += 1;
            Ok(())
        }

        async fn list_runs_created_after(
            &self,
            _address: &CallAddress,
            _created_after: chrono::DateTime<chrono::Utc>,
        ) -> AppResult<Vec<triggergate_domain::WorkflowRun>> {
            Ok(Vec::new())
        }

        async fn get_run(
            &self,
            _owner: &str,
            _repo: &str,
            run_id: i64,
        ) -> AppResult<triggergate_domain::WorkflowRun> {
            Ok(triggergate_domain::WorkflowRun {
                id: run_id,
                name: "deploy".to_owned(),
                status: "completed".to_owned(),
                conclusion: Some("success".to_owned()),
            })
        }

        async fn list_run_artifacts(
            &self,
            _owner: &str,
            _repo: &str,
            _run_id: i64,
        ) -> AppResult<Vec<triggergate_domain::RunArtifact>> {
            Ok(Vec::new())
        }

        async fn download_artifact(
            &self,
            _owner: &str,
            _repo: &str,
            _artifact_id: i64,
        ) -> AppResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    struct NoopUnpacker;

    #[async_trait]
    impl ResultUnpacker for NoopUnpacker {
        async fn unpack(
            &self,
            _correlation_id: CorrelationId,
            _archive: Vec<u8>,
        ) -> AppResult<Value> {
            Ok(Value::Null)
        }
    }

    /// Records which single capability the handler invoked.
    #[derive(Default)]
    struct RecordingResponder {
        bad_request: Option<String>,
        no_group_permission: bool,
        error: Option<String>,
        success: Option<Option<Value>>,
    }

    impl CallResponder for RecordingResponder {
        fn bad_request(&mut self, info: String) {
            self.bad_request = Some(info);
        }

        fn no_group_permission(&mut self) {
            self.no_group_permission = true;
        }

        fn error(&mut self, info: String) {
            self.error = Some(info);
        }

        fn success(&mut self, result: Option<Value>) {
            self.success = Some(result);
        }
    }

    fn address(ref_name: &str) -> CallAddress {
        CallAddress {
            owner: "acme".to_owned(),
            repo: "infra".to_owned(),
            workflow_file: "deploy.yml".to_owned(),
            ref_name: ref_name.to_owned(),
        }
    }

    fn config_granting(granted: CallAddress) -> AuthConfig {
        AuthConfig {
            permissions_records: HashMap::from([(
                "acme/infra".to_owned(),
                GroupPermissions {
                    permissions: vec![CallPermission {
                        call_address: granted,
                    }],
                },
            )]),
        }
    }

    fn handler(
        valid_token: bool,
        config: AuthConfig,
        gateway: Arc<FakeGateway>,
        fail_lookup: bool,
    ) -> CallHandler {
        let authorization = AuthorizationService::new(
            Arc::new(FakeTokenVerifier { valid: valid_token }),
            Arc::new(FakeAuthConfigStore { config }),
        );
        let workflow_calls = WorkflowCallService::new(
            Arc::new(FakeDirectory {
                gateway,
                fail_lookup,
            }),
            Arc::new(NoopUnpacker),
        );
        CallHandler::new(authorization, workflow_calls)
    }

    fn request(max_waiting_time_in_seconds: u64) -> CallRequest {
        CallRequest {
            token: "token".to_owned(),
            call_input: CallInput {
                input: json!({}),
                call_type: CallType::Trigger,
                call_address: address("main"),
                max_waiting_time_in_seconds,
            },
        }
    }

    #[tokio::test]
    async fn authorized_trigger_reports_success_without_result() {
        let gateway = Arc::new(FakeGateway::default());
        let handler = handler(
            true,
            config_granting(address("main")),
            gateway.clone(),
            false,
        );
        let mut responder = RecordingResponder::default();

        handler.call(&request(60), &mut responder).await;

        assert_eq!(responder.success, Some(None));
        assert_eq!(*gateway.dispatch_count.lock().await, 1);
        assert!(!responder.no_group_permission);
        assert!(responder.error.is_none());
    }

    #[tokio::test]
    async fn mismatched_permission_denies_without_dispatch() {
        let gateway = Arc::new(FakeGateway::default());
        let handler = handler(
            true,
            config_granting(address("staging")),
            gateway.clone(),
            false,
        );
        let mut responder = RecordingResponder::default();

        handler.call(&request(60), &mut responder).await;

        assert!(responder.no_group_permission);
        assert_eq!(*gateway.dispatch_count.lock().await, 0);
        assert!(responder.success.is_none());
    }

    #[tokio::test]
    async fn invalid_token_denies() {
        let handler = handler(
            false,
            config_granting(address("main")),
            Arc::new(FakeGateway::default()),
            false,
        );
        let mut responder = RecordingResponder::default();

        handler.call(&request(60), &mut responder).await;

        assert!(responder.no_group_permission);
    }

    #[tokio::test]
    async fn short_waiting_time_is_a_bad_request() {
        let gateway = Arc::new(FakeGateway::default());
        let handler = handler(
            true,
            config_granting(address("main")),
            gateway.clone(),
            false,
        );
        let mut responder = RecordingResponder::default();

        handler.call(&request(5), &mut responder).await;

        assert!(responder.bad_request.is_some());
        assert_eq!(*gateway.dispatch_count.lock().await, 0);
    }

    #[tokio::test]
    async fn pipeline_failure_is_reported_via_error() {
        let handler = handler(
            true,
            config_granting(address("main")),
            Arc::new(FakeGateway::default()),
            true,
        );
        let mut responder = RecordingResponder::default();

        handler.call(&request(60), &mut responder).await;

        assert!(responder.error.is_some());
        assert!(responder.success.is_none());
        assert!(!responder.no_group_permission);
    }
}
