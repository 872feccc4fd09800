//! Triggergate gateway composition root.

#![forbid(unsafe_code)]

mod gateway_config;
mod handlers;

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use triggergate_application::{AuthorizationService, CallHandler, WorkflowCallService};
use triggergate_core::AppError;
use triggergate_infrastructure::{
    FileAuthConfigStore, GithubAppInstallationDirectory, OidcTokenVerifier, ZipResultUnpacker,
};

use crate::gateway_config::GatewayConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = GatewayConfig::load()?;

    let private_key_pem = tokio::fs::read_to_string(&config.github_private_key_path)
        .await
        .map_err(|error| {
            AppError::Validation(format!(
                "failed to read '{}': {error}",
                config.github_private_key_path.display()
            ))
        })?;

    let http_client = reqwest::Client::new();

    let token_verifier = Arc::new(OidcTokenVerifier::new(
        http_client.clone(),
        config.oidc_audience.clone(),
    ));
    let auth_config_store = Arc::new(FileAuthConfigStore::new(config.auth_config_path.clone()));
    let authorization = AuthorizationService::new(token_verifier, auth_config_store);

    let installation_directory = match config.github_api_base_url.clone() {
        Some(api_base_url) => Arc::new(GithubAppInstallationDirectory::with_api_base_url(
            http_client,
            config.github_app_id.clone(),
            private_key_pem,
            api_base_url,
        )),
        None => Arc::new(GithubAppInstallationDirectory::new(
            http_client,
            config.github_app_id.clone(),
            private_key_pem,
        )),
    };
    let result_unpacker = Arc::new(ZipResultUnpacker::new());
    let workflow_calls = WorkflowCallService::new(installation_directory, result_unpacker);

    let call_handler = Arc::new(CallHandler::new(authorization, workflow_calls));

    let app = Router::new()
        .route("/call", post(handlers::call_handler))
        .route("/health", get(handlers::health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(call_handler);

    let host = IpAddr::from_str(&config.gateway_host).map_err(|error| {
        AppError::Internal(format!(
            "invalid GATEWAY_HOST '{}': {error}",
            config.gateway_host
        ))
    })?;
    let address = SocketAddr::from((host, config.gateway_port));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "triggergate-gateway listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("gateway server error: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
