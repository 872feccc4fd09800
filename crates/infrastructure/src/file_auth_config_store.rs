use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use triggergate_application::AuthConfigStore;
use triggergate_core::{AppError, AppResult};
use triggergate_domain::{AuthConfig, CallPermission, GroupPermissions};

/// File-backed permission policy store.
///
/// Reads the policy fresh on every load with a bounded fixed-delay
/// retry; parsing is tolerant, skipping malformed group and permission
/// entries instead of failing the whole load.
pub struct FileAuthConfigStore {
    path: PathBuf,
    attempts: u32,
    retry_delay: Duration,
}

impl FileAuthConfigStore {
    /// Creates a store with the default retry bounds: 5 attempts,
    /// 1 second apart.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self::with_retry(path, 5, Duration::from_secs(1))
    }

    /// Creates a store with explicit retry bounds.
    #[must_use]
    pub fn with_retry(path: PathBuf, attempts: u32, retry_delay: Duration) -> Self {
        Self {
            path,
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    async fn read_with_retry(&self) -> AppResult<String> {
        let mut last_error: Option<std::io::Error> = None;

        for attempt in 1..=self.attempts {
            match tokio::fs::read_to_string(&self.path).await {
                Ok(content) => return Ok(content),
                Err(error) => {
                    tracing::warn!(
                        attempt,
                        path = %self.path.display(),
                        %error,
                        "auth config read failed"
                    );
                    last_error = Some(error);
                }
            }

            if attempt < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(AppError::ConfigUnavailable(format!(
            "failed to read '{}' after {} attempts: {}",
            self.path.display(),
            self.attempts,
            last_error.map_or_else(|| "unknown error".to_owned(), |error| error.to_string())
        )))
    }
}

#[async_trait]
impl AuthConfigStore for FileAuthConfigStore {
    async fn load(&self) -> AppResult<AuthConfig> {
        let content = self.read_with_retry().await?;
        parse_auth_config(&content)
    }
}

/// Walks the policy document group by group.
///
/// A group whose `permissions` value is not an array, or a permission
/// entry whose `callAddress` is incomplete, is skipped; skipped
/// entries are simply absent from the result.
fn parse_auth_config(content: &str) -> AppResult<AuthConfig> {
    let document: Value = serde_json::from_str(content).map_err(|error| {
        AppError::ConfigUnavailable(format!("auth config is not valid JSON: {error}"))
    })?;

    let mut auth_config = AuthConfig::default();

    let Some(records) = document
        .get("permissionsRecords")
        .and_then(Value::as_object)
    else {
        tracing::warn!("auth config carries no permissionsRecords object");
        return Ok(auth_config);
    };

    for (group_name, entry) in records {
        let Some(raw_permissions) = entry.get("permissions").and_then(Value::as_array) else {
            tracing::warn!(group = %group_name, "skipping group without a permissions list");
            continue;
        };

        let mut permissions = Vec::with_capacity(raw_permissions.len());
        for raw_permission in raw_permissions {
            match serde_json::from_value::<CallPermission>(raw_permission.clone()) {
                Ok(permission) => permissions.push(permission),
                Err(error) => {
                    tracing::warn!(group = %group_name, %error, "skipping malformed permission entry");
                }
            }
        }

        auth_config
            .permissions_records
            .insert(group_name.clone(), GroupPermissions { permissions });
    }

    Ok(auth_config)
}
