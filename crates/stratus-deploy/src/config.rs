//! Configuration for the deployment client.

use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::{DeployError, DeployResult};
use stratus_api::{ApiClient, Credentials};

/// Top-level client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Region the client targets. Must be resolved before any call.
    #[serde(default)]
    pub region: String,

    /// Namespace functions are grouped under. Must be resolved before any
    /// call.
    #[serde(default)]
    pub namespace: String,

    /// Root domain for per-service endpoints (`{service}.{endpoint_root}`).
    #[serde(default = "default_endpoint_root")]
    pub endpoint_root: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Deployment behaviour tuning.
    #[serde(default)]
    pub deploy: DeployConfig,
}

fn default_endpoint_root() -> String {
    "stratusapi.com".to_owned()
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: String::new(),
            namespace: String::new(),
            endpoint_root: default_endpoint_root(),
            timeout_secs: default_timeout_secs(),
            deploy: DeployConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources
    /// override earlier):
    /// 1. Default values
    /// 2. `stratus.toml` in the current directory (if present)
    /// 3. Environment variables with `STRATUS_` prefix
    pub fn load() -> DeployResult<Self> {
        Figment::new()
            .merge(Toml::file("stratus.toml"))
            .merge(Env::prefixed("STRATUS_").split("__"))
            .extract()
            .map_err(|e| DeployError::config(e.to_string()))
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> DeployResult<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("STRATUS_").split("__"))
            .extract()
            .map_err(|e| DeployError::config(e.to_string()))
    }

    /// Read credentials from the environment.
    ///
    /// `STRATUS_SECRET_ID` and `STRATUS_SECRET_KEY` are required;
    /// `STRATUS_TOKEN` and `STRATUS_PROXY` are optional.
    pub fn credentials_from_env() -> DeployResult<Credentials> {
        let secret_id = std::env::var("STRATUS_SECRET_ID")
            .map_err(|_| DeployError::config("STRATUS_SECRET_ID is not set"))?;
        let secret_key = std::env::var("STRATUS_SECRET_KEY")
            .map_err(|_| DeployError::config("STRATUS_SECRET_KEY is not set"))?;

        let mut credentials = Credentials::new(secret_id, secret_key);
        if let Ok(token) = std::env::var("STRATUS_TOKEN") {
            credentials = credentials.with_token(token);
        }
        if let Ok(proxy) = std::env::var("STRATUS_PROXY") {
            credentials = credentials.with_proxy(proxy);
        }
        Ok(credentials)
    }

    /// Build a signed API client from this configuration and environment
    /// credentials.
    pub fn api_client(&self) -> DeployResult<ApiClient> {
        let credentials = Self::credentials_from_env()?;
        ApiClient::new(
            credentials,
            self.endpoint_root.clone(),
            Duration::from_secs(self.timeout_secs),
        )
        .map_err(DeployError::Api)
    }
}

/// Deployment behaviour tuning.
///
/// The defaults are the platform contract; tests shrink the delays.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    /// Maximum retries for trigger creation and reconcile-path code update.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between retries in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Fixed interval between readiness polls in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    500
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_contract() {
        let config = DeployConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 500);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stratus.toml");
        std::fs::write(
            &path,
            r#"
                region = "ap-east-1"
                namespace = "staging"

                [deploy]
                retry_delay_ms = 50
            "#,
        )
        .unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.region, "ap-east-1");
        assert_eq!(config.namespace, "staging");
        assert_eq!(config.deploy.retry_delay_ms, 50);
        assert_eq!(config.deploy.max_retries, 3);
        assert_eq!(config.endpoint_root, "stratusapi.com");
    }

    #[test]
    fn environment_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "stratus.toml",
                r#"
                    region = "ap-east-1"
                    namespace = "staging"
                "#,
            )?;
            jail.set_env("STRATUS_REGION", "eu-central-1");
            jail.set_env("STRATUS_DEPLOY__MAX_RETRIES", "5");

            let config = ClientConfig::load().unwrap();
            assert_eq!(config.region, "eu-central-1");
            assert_eq!(config.namespace, "staging");
            assert_eq!(config.deploy.max_retries, 5);
            assert_eq!(config.deploy.retry_delay_ms, 500);
            Ok(())
        });
    }

    #[test]
    fn unconfigured_region_defaults_empty() {
        let config = ClientConfig::default();
        assert!(config.region.is_empty());
        assert!(config.namespace.is_empty());
    }
}
