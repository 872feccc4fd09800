use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use triggergate_application::{InstallationDirectory, InstallationId, WorkflowRunGateway};
use triggergate_core::{AppError, AppResult};

use crate::GithubWorkflowGateway;

/// Default GitHub REST endpoint.
pub(crate) const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Lifetime of a minted app JWT, capped by GitHub at ten minutes.
const APP_JWT_LIFETIME_SECONDS: u64 = 600;

/// Clock-skew allowance on the app JWT issue time.
const APP_JWT_SKEW_SECONDS: u64 = 60;

#[derive(Debug, Serialize)]
struct AppJwtClaims {
    iat: u64,
    exp: u64,
    iss: String,
}

#[derive(Debug, Deserialize)]
struct InstallationPayload {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct InstallationTokenPayload {
    token: String,
}

/// Resolves GitHub App installations and exchanges them for scoped
/// workflow gateways.
///
/// Installation lookups authenticate with a short-lived app JWT minted
/// per request; the resulting installation token is scoped to one call
/// and never pooled.
pub struct GithubAppInstallationDirectory {
    http_client: reqwest::Client,
    api_base_url: String,
    app_id: String,
    private_key_pem: String,
}

impl GithubAppInstallationDirectory {
    /// Creates a directory against the public GitHub API.
    #[must_use]
    pub fn new(http_client: reqwest::Client, app_id: String, private_key_pem: String) -> Self {
        Self::with_api_base_url(
            http_client,
            app_id,
            private_key_pem,
            DEFAULT_API_BASE_URL.to_owned(),
        )
    }

    /// Creates a directory against an explicit API endpoint.
    #[must_use]
    pub fn with_api_base_url(
        http_client: reqwest::Client,
        app_id: String,
        private_key_pem: String,
        api_base_url: String,
    ) -> Self {
        Self {
            http_client,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
            app_id,
            private_key_pem,
        }
    }

    fn app_jwt(&self) -> AppResult<String> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let claims = AppJwtClaims {
            iat: now.saturating_sub(APP_JWT_SKEW_SECONDS),
            exp: now + APP_JWT_LIFETIME_SECONDS,
            iss: self.app_id.clone(),
        };

        let key = EncodingKey::from_rsa_pem(self.private_key_pem.as_bytes())
            .map_err(|error| AppError::Credential(format!("unusable app private key: {error}")))?;

        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|error| AppError::Credential(format!("app token mint failed: {error}")))
    }

    /// Fetches one installation endpoint; 404 means "not installed
    /// here" and moves the caller on to the next scope.
    async fn find_installation(&self, path: &str) -> AppResult<Option<InstallationId>> {
        let response = self
            .http_client
            .get(format!("{}{path}", self.api_base_url))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, "triggergate-gateway")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .bearer_auth(self.app_jwt()?)
            .send()
            .await
            .map_err(|error| {
                AppError::External(format!("installation lookup '{path}' failed: {error}"))
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::External(format!(
                "installation lookup '{path}' returned status {status}"
            )));
        }

        let payload: InstallationPayload = response.json().await.map_err(|error| {
            AppError::External(format!("installation payload parse failed: {error}"))
        })?;

        Ok(Some(InstallationId::new(payload.id)))
    }
}

#[async_trait]
impl InstallationDirectory for GithubAppInstallationDirectory {
    async fn find_repo_installation(
        &self,
        owner: &str,
        repo: &str,
    ) -> AppResult<Option<InstallationId>> {
        self.find_installation(&format!("/repos/{owner}/{repo}/installation"))
            .await
    }

    async fn find_org_installation(&self, owner: &str) -> AppResult<Option<InstallationId>> {
        self.find_installation(&format!("/orgs/{owner}/installation"))
            .await
    }

    async fn find_user_installation(&self, owner: &str) -> AppResult<Option<InstallationId>> {
        self.find_installation(&format!("/users/{owner}/installation"))
            .await
    }

    async fn gateway_for_installation(
        &self,
        installation: InstallationId,
    ) -> AppResult<Arc<dyn WorkflowRunGateway>> {
        let response = self
            .http_client
            .post(format!(
                "{}/app/installations/{}/access_tokens",
                self.api_base_url, installation
            ))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, "triggergate-gateway")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .bearer_auth(self.app_jwt()?)
            .send()
            .await
            .map_err(|error| {
                AppError::Credential(format!("installation token exchange failed: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Credential(format!(
                "installation token exchange returned status {status}"
            )));
        }

        let payload: InstallationTokenPayload = response.json().await.map_err(|error| {
            AppError::Credential(format!("installation token parse failed: {error}"))
        })?;

        Ok(Arc::new(GithubWorkflowGateway::new(
            self.http_client.clone(),
            self.api_base_url.clone(),
            payload.token,
        )))
    }
}
