use async_trait::async_trait;
use triggergate_core::AppResult;
use triggergate_domain::{AuthConfig, GroupInfo};

/// Port for identity token verification.
///
/// Implementations verify a token against a remote key set and map its
/// claims to authorization groups.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verifies signature, issuer, and audience.
    ///
    /// Returns `Ok(false)` when the token is well-formed but fails a
    /// signature or claim check (a deny decision). Any failure to
    /// reach a verdict — unreachable key set, malformed token — is an
    /// error, never a deny.
    async fn validate(&self, token: &str) -> AppResult<bool>;

    /// Maps the token's identity claims to authorization groups.
    ///
    /// One token currently yields exactly one group.
    async fn group_infos(&self, token: &str) -> AppResult<Vec<GroupInfo>>;
}

/// Port for the persisted permission policy.
#[async_trait]
pub trait AuthConfigStore: Send + Sync {
    /// Reads the policy, fresh on every call; no cross-call cache.
    async fn load(&self) -> AppResult<AuthConfig>;
}
