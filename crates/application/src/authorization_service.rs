use std::sync::Arc;

use triggergate_core::AppResult;
use triggergate_domain::{CallAddress, GroupInfo};

use crate::{AuthConfigStore, TokenVerifier};

/// Outcome of one authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDecision {
    /// Whether the caller may make the requested call.
    pub authorized: bool,
    /// The group whose permission matched; set only when authorized.
    pub group: Option<GroupInfo>,
}

impl AuthDecision {
    /// A deny decision.
    #[must_use]
    pub fn denied() -> Self {
        Self {
            authorized: false,
            group: None,
        }
    }

    /// An allow decision carrying the matched group for audit logging.
    #[must_use]
    pub fn granted(group: GroupInfo) -> Self {
        Self {
            authorized: true,
            group: Some(group),
        }
    }
}

/// Application service deciding allow/deny for a (token, address) pair.
///
/// Every check re-validates the token and re-reads the policy; there
/// is no cross-call cache, trading per-call latency for always-current
/// authorization state.
#[derive(Clone)]
pub struct AuthorizationService {
    token_verifier: Arc<dyn TokenVerifier>,
    auth_config_store: Arc<dyn AuthConfigStore>,
}

impl AuthorizationService {
    /// Creates a new authorization service from port implementations.
    #[must_use]
    pub fn new(
        token_verifier: Arc<dyn TokenVerifier>,
        auth_config_store: Arc<dyn AuthConfigStore>,
    ) -> Self {
        Self {
            token_verifier,
            auth_config_store,
        }
    }

    /// Decides whether the token's groups may call the address.
    ///
    /// A deny is a decision, not an error: `Err` means the check could
    /// not be carried out (key set unreachable, policy unreadable).
    pub async fn check_auth(
        &self,
        token: &str,
        call_address: &CallAddress,
    ) -> AppResult<AuthDecision> {
        if !self.token_verifier.validate(token).await? {
            tracing::warn!("token failed signature or claim validation");
            return Ok(AuthDecision::denied());
        }

        let groups = self.token_verifier.group_infos(token).await?;
        let auth_config = self.auth_config_store.load().await?;

        for group in groups {
            let Some(group_permissions) =
                auth_config.permissions_records.get(&group.unique_group_name)
            else {
                continue;
            };

            if group_permissions.allows(call_address) {
                return Ok(AuthDecision::granted(group));
            }
        }

        tracing::warn!(
            owner = %call_address.owner,
            repo = %call_address.repo,
            workflow_file = %call_address.workflow_file,
            ref_name = %call_address.ref_name,
            "call without matching group permission"
        );

        Ok(AuthDecision::denied())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use triggergate_core::{AppError, AppResult};
    use triggergate_domain::{
        AuthConfig, CallAddress, CallPermission, GroupInfo, GroupPermissions,
    };

    use crate::{AuthConfigStore, TokenVerifier};

    use super::AuthorizationService;

    struct FakeTokenVerifier {
        valid: bool,
        group: &'static str,
    }

    #[async_trait]
    impl TokenVerifier for FakeTokenVerifier {
        async fn validate(&self, _token: &str) -> AppResult<bool> {
            Ok(self.valid)
        }

        async fn group_infos(&self, _token: &str) -> AppResult<Vec<GroupInfo>> {
            Ok(vec![GroupInfo {
                unique_group_name: self.group.to_owned(),
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

    struct FailingAuthConfigStore;

    #[async_trait]
    impl AuthConfigStore for FailingAuthConfigStore {
        async fn load(&self) -> AppResult<AuthConfig> {
            Err(AppError::ConfigUnavailable("file unreadable".to_owned()))
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

    fn config_granting(group: &str, granted: CallAddress) -> AuthConfig {
        AuthConfig {
            permissions_records: HashMap::from([(
                group.to_owned(),
                GroupPermissions {
                    permissions: vec![CallPermission {
                        call_address: granted,
                    }],
                },
            )]),
        }
    }

    fn service(verifier: FakeTokenVerifier, config: AuthConfig) -> AuthorizationService {
        AuthorizationService::new(
            Arc::new(verifier),
            Arc::new(FakeAuthConfigStore { config }),
        )
    }

    #[tokio::test]
    async fn invalid_token_denies_without_error() {
        let service = service(
            FakeTokenVerifier {
                valid: false,
                group: "acme/infra",
            },
            config_granting("acme/infra", address("main")),
        );

        let decision = service
            .check_auth("token", &address("main"))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(!decision.authorized);
        assert!(decision.group.is_none());
    }

    #[tokio::test]
    async fn matching_permission_authorizes_and_returns_group() {
        let service = service(
            FakeTokenVerifier {
                valid: true,
                group: "acme/infra",
            },
            config_granting("acme/infra", address("main")),
        );

        let decision = service
            .check_auth("token", &address("main"))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(decision.authorized);
        assert_eq!(
            decision.group.map(|group| group.unique_group_name),
            Some("acme/infra".to_owned())
        );
    }

    #[tokio::test]
    async fn mismatched_ref_denies() {
        let service = service(
            FakeTokenVerifier {
                valid: true,
                group: "acme/infra",
            },
            config_granting("acme/infra", address("staging")),
        );

        let decision = service
            .check_auth("token", &address("main"))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(!decision.authorized);
    }

    #[tokio::test]
    async fn matching_is_case_sensitive() {
        let mut granted = address("main");
        granted.owner = "Acme".to_owned();
        let service = service(
            FakeTokenVerifier {
                valid: true,
                group: "acme/infra",
            },
            config_granting("acme/infra", granted),
        );

        let decision = service
            .check_auth("token", &address("main"))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(!decision.authorized);
    }

    #[tokio::test]
    async fn group_without_policy_entry_denies() {
        let service = service(
            FakeTokenVerifier {
                valid: true,
                group: "acme/other",
            },
            config_granting("acme/infra", address("main")),
        );

        let decision = service
            .check_auth("token", &address("main"))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(!decision.authorized);
    }

    #[tokio::test]
    async fn unreadable_policy_propagates_as_error() {
        let service = AuthorizationService::new(
            Arc::new(FakeTokenVerifier {
                valid: true,
                group: "acme/infra",
            }),
            Arc::new(FailingAuthConfigStore),
        );

        let result = service.check_auth("token", &address("main")).await;
        assert!(matches!(result, Err(AppError::ConfigUnavailable(_))));
    }
}
