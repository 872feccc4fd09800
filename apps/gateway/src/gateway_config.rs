use std::env;
use std::path::PathBuf;

use triggergate_core::AppError;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub gateway_host: String,
    pub gateway_port: u16,
    pub github_app_id: String,
    pub github_private_key_path: PathBuf,
    pub github_api_base_url: Option<String>,
    pub oidc_audience: String,
    pub auth_config_path: PathBuf,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        let gateway_host = env::var("GATEWAY_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let gateway_port = env::var("GATEWAY_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3002);

        let github_app_id = required_non_empty_env("GITHUB_APP_ID")?;
        let github_private_key_path =
            PathBuf::from(required_non_empty_env("GITHUB_PRIVATE_KEY_PATH")?);
        let github_api_base_url = env::var("GITHUB_API_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let oidc_audience = required_non_empty_env("OIDC_AUDIENCE")?;
        let auth_config_path = PathBuf::from(required_non_empty_env("AUTH_CONFIG_PATH")?);

        Ok(Self {
            gateway_host,
            gateway_port,
            github_app_id,
            github_private_key_path,
            github_api_base_url,
            oidc_audience,
            auth_config_path,
        })
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
