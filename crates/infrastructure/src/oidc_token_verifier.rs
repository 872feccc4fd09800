use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use triggergate_application::TokenVerifier;
use triggergate_core::{AppError, AppResult};
use triggergate_domain::GroupInfo;

/// Issuer of GitHub Actions OIDC tokens.
const GITHUB_OIDC_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Key set endpoint for GitHub Actions OIDC tokens.
const GITHUB_OIDC_JWKS_URL: &str =
    "https://token.actions.githubusercontent.com/.well-known/jwks";

/// Identity claims the gateway consumes from a validated token.
#[derive(Debug, Clone, Deserialize)]
struct OidcClaims {
    /// The workflow's `owner/repo` identity; maps to the caller's group.
    repository: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

enum Verified {
    Claims(OidcClaims),
    Rejected,
}

/// Verifies GitHub Actions OIDC tokens against the live key set.
///
/// The key set is fetched on every validation, matching the gateway's
/// no-cache stance on authorization state.
pub struct OidcTokenVerifier {
    http_client: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
}

impl OidcTokenVerifier {
    /// Creates a verifier for the GitHub Actions issuer with the given
    /// expected audience.
    #[must_use]
    pub fn new(http_client: reqwest::Client, audience: String) -> Self {
        Self::with_endpoints(
            http_client,
            audience,
            GITHUB_OIDC_ISSUER.to_owned(),
            GITHUB_OIDC_JWKS_URL.to_owned(),
        )
    }

    /// Creates a verifier against explicit issuer and key set endpoints.
    #[must_use]
    pub fn with_endpoints(
        http_client: reqwest::Client,
        audience: String,
        issuer: String,
        jwks_url: String,
    ) -> Self {
        Self {
            http_client,
            jwks_url,
            issuer,
            audience,
        }
    }

    async fn fetch_key_set(&self) -> AppResult<JwksResponse> {
        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|error| AppError::External(format!("key set fetch failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::External(format!(
                "key set fetch returned status {status}"
            )));
        }

        response
            .json::<JwksResponse>()
            .await
            .map_err(|error| AppError::External(format!("key set parse failed: {error}")))
    }

    /// Verifies the token end to end.
    ///
    /// A signature or claim mismatch is a rejection, not an error; a
    /// malformed token or an unreachable/unusable key set is an error,
    /// because no verdict could be reached.
    async fn verify(&self, token: &str) -> AppResult<Verified> {
        let header = decode_header(token)
            .map_err(|error| AppError::External(format!("malformed token header: {error}")))?;

        let Some(kid) = header.kid else {
            return Err(AppError::External(
                "token header carries no key id".to_owned(),
            ));
        };

        let key_set = self.fetch_key_set().await?;
        let Some(jwk) = key_set.keys.iter().find(|key| key.kid == kid) else {
            return Err(AppError::External(format!(
                "key set has no key for kid '{kid}'"
            )));
        };

        let (Some(modulus), Some(exponent)) = (&jwk.n, &jwk.e) else {
            return Err(AppError::External(format!(
                "key '{kid}' is missing RSA components"
            )));
        };

        let decoding_key = DecodingKey::from_rsa_components(modulus, exponent)
            .map_err(|error| AppError::External(format!("unusable key '{kid}': {error}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        match decode::<OidcClaims>(token, &decoding_key, &validation) {
            Ok(data) => Ok(Verified::Claims(data.claims)),
            Err(error) => match error.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAudience
                | ErrorKind::InvalidIssuer
                | ErrorKind::ExpiredSignature
                | ErrorKind::ImmatureSignature
                | ErrorKind::MissingRequiredClaim(_) => {
                    tracing::warn!(%error, "token rejected by signature or claim check");
                    Ok(Verified::Rejected)
                }
                _ => Err(AppError::External(format!(
                    "token verification failed: {error}"
                ))),
            },
        }
    }
}

#[async_trait]
impl TokenVerifier for OidcTokenVerifier {
    async fn validate(&self, token: &str) -> AppResult<bool> {
        match self.verify(token).await? {
            Verified::Claims(_) => Ok(true),
            Verified::Rejected => Ok(false),
        }
    }

    async fn group_infos(&self, token: &str) -> AppResult<Vec<GroupInfo>> {
        match self.verify(token).await? {
            Verified::Claims(claims) => group_infos_from_claims(&claims),
            Verified::Rejected => Err(AppError::External(
                "token failed validation during group derivation".to_owned(),
            )),
        }
    }
}

/// Maps identity claims to exactly one group: the caller's repository.
fn group_infos_from_claims(claims: &OidcClaims) -> AppResult<Vec<GroupInfo>> {
    let Some(repository) = claims.repository.as_deref() else {
        return Err(AppError::External(
            "token payload carries no repository claim".to_owned(),
        ));
    };

    Ok(vec![GroupInfo {
        unique_group_name: repository.to_owned(),
    }])
}
