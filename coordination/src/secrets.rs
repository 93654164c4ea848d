//! Secret lookup, used once at startup.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{ConfigError, ConfigResult};

const ENV_SECRET_PREFIX: &str = "RESOLVE_SECRET_";

/// Key → secret lookup by name. A failure here is fatal at startup.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, name: &str) -> ConfigResult<String>;
}

/// Environment variable holding secret `name`: `completion-api-key` →
/// `RESOLVE_SECRET_COMPLETION_API_KEY`.
pub fn secret_env_var(name: &str) -> String {
    let suffix: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{ENV_SECRET_PREFIX}{suffix}")
}

/// Reads secrets from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, name: &str) -> ConfigResult<String> {
        let var = secret_env_var(name);
        match std::env::var(&var) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            Ok(_) => Err(ConfigError::Secret {
                name: name.to_string(),
                reason: format!("{var} is empty"),
            }),
            Err(_) => Err(ConfigError::Secret {
                name: name.to_string(),
                reason: format!("{var} is not set"),
            }),
        }
    }
}

/// Fixed in-memory secrets.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, name: &str) -> ConfigResult<String> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::Secret {
                name: name.to_string(),
                reason: "not present in store".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_env_var_name() {
        assert_eq!(
            secret_env_var("completion-api-key"),
            "RESOLVE_SECRET_COMPLETION_API_KEY"
        );
        assert_eq!(
            secret_env_var("search.admin-key"),
            "RESOLVE_SECRET_SEARCH_ADMIN_KEY"
        );
    }

    #[tokio::test]
    async fn test_static_store() {
        let store = StaticSecretStore::new().with_secret("search-admin-key", "s3cret");
        assert_eq!(store.get_secret("search-admin-key").await.unwrap(), "s3cret");

        let err = store.get_secret("completion-api-key").await.unwrap_err();
        assert!(matches!(err, ConfigError::Secret { ref name, .. } if name == "completion-api-key"));
    }

    #[tokio::test]
    async fn test_env_store_missing_is_secret_error() {
        let err = EnvSecretStore
            .get_secret("resolve-test-secret-that-is-never-set")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is not set"));
    }
}
