//! Sync configuration.
//!
//! `SyncSettings` is the single source for the remote endpoint, remote
//! timeout, and retry tuning. Front ends load it from the environment or a
//! JSON file and project it into [`GatewayConfig`] and [`RetryPolicy`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::GatewayConfig;
use crate::sync::{RetryPolicy, DEFAULT_SYNC_INTERVAL};
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_API_URL: &str = "SCRIPTSTUDIO_API_URL";
pub const ENV_API_TOKEN: &str = "SCRIPTSTUDIO_API_TOKEN";
pub const ENV_REMOTE_TIMEOUT_MS: &str = "SCRIPTSTUDIO_REMOTE_TIMEOUT_MS";
pub const ENV_MAX_ATTEMPTS: &str = "SCRIPTSTUDIO_MAX_ATTEMPTS";
pub const ENV_SYNC_INTERVAL_MS: &str = "SCRIPTSTUDIO_SYNC_INTERVAL_MS";

const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_BACKOFF_MAX_MS: u64 = 300_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl ConfigError {
    fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Remote endpoint and sync tuning
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct SyncSettings {
    /// Base URL of the entity API; `None` keeps the app local-only
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub remote_timeout_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Period of background passes; 0 disables the timer
    pub sync_interval_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            sync_interval_ms: u64::try_from(DEFAULT_SYNC_INTERVAL.as_millis()).unwrap_or(60_000),
        }
    }
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("remote_timeout_ms", &self.remote_timeout_ms)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("backoff_max_ms", &self.backoff_max_ms)
            .field("sync_interval_ms", &self.sync_interval_ms)
            .finish()
    }
}

impl SyncSettings {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let payload = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&payload)
    }

    pub fn from_json_str(payload: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(payload)?;
        settings.normalized()
    }

    /// Load from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self {
            api_base_url: lookup(ENV_API_URL),
            api_token: lookup(ENV_API_TOKEN),
            ..Self::default()
        };
        if let Some(value) = lookup(ENV_REMOTE_TIMEOUT_MS) {
            settings.remote_timeout_ms = parse_number(ENV_REMOTE_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_ATTEMPTS) {
            settings.max_attempts = parse_number(ENV_MAX_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_SYNC_INTERVAL_MS) {
            settings.sync_interval_ms = parse_number(ENV_SYNC_INTERVAL_MS, &value)?;
        }
        settings.normalized()
    }

    fn normalized(mut self) -> Result<Self, ConfigError> {
        self.api_base_url =
            normalize_text_option(self.api_base_url).map(|url| url.trim_end_matches('/').to_string());
        self.api_token = normalize_text_option(self.api_token);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.api_base_url {
            if !is_http_url(url) {
                return Err(ConfigError::invalid(
                    "api_base_url",
                    "must include http:// or https://",
                ));
            }
        }
        if self.remote_timeout_ms == 0 {
            return Err(ConfigError::invalid("remote_timeout_ms", "must be positive"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be positive"));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(ConfigError::invalid(
                "backoff_base_ms",
                format!("must not exceed backoff_max_ms ({})", self.backoff_max_ms),
            ));
        }
        Ok(())
    }

    pub fn has_remote(&self) -> bool {
        self.api_base_url.is_some()
    }

    pub const fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub const fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            remote_timeout: self.remote_timeout(),
        }
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
        }
    }

    /// Background pass period, `None` when disabled
    pub const fn sync_interval(&self) -> Option<Duration> {
        if self.sync_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.sync_interval_ms))
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(name, format!("'{value}' is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_are_local_only() {
        let settings = SyncSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert!(!settings.has_remote());
        assert_eq!(settings.gateway_config(), GatewayConfig::default());
        assert_eq!(settings.retry_policy(), RetryPolicy::default());
        assert_eq!(settings.sync_interval(), Some(DEFAULT_SYNC_INTERVAL));
    }

    #[test]
    fn env_values_override_defaults() {
        let settings = SyncSettings::from_lookup(lookup(&[
            (ENV_API_URL, " https://api.example.com/ "),
            (ENV_API_TOKEN, "  "),
            (ENV_REMOTE_TIMEOUT_MS, "250"),
            (ENV_MAX_ATTEMPTS, "3"),
            (ENV_SYNC_INTERVAL_MS, "0"),
        ]))
        .unwrap();

        assert_eq!(settings.api_base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(settings.api_token, None);
        assert_eq!(settings.remote_timeout(), Duration::from_millis(250));
        assert_eq!(settings.retry_policy().max_attempts, 3);
        assert_eq!(settings.sync_interval(), None);
    }

    #[test]
    fn rejects_invalid_values() {
        let error = SyncSettings::from_lookup(lookup(&[(ENV_MAX_ATTEMPTS, "lots")])).unwrap_err();
        assert!(error.to_string().contains(ENV_MAX_ATTEMPTS));

        let error = SyncSettings::from_lookup(lookup(&[(ENV_API_URL, "api.example.com")])).unwrap_err();
        assert!(error.to_string().contains("api_base_url"));

        let error = SyncSettings::from_lookup(lookup(&[(ENV_REMOTE_TIMEOUT_MS, "0")])).unwrap_err();
        assert!(error.to_string().contains("remote_timeout_ms"));
    }

    #[test]
    fn json_rejects_unknown_fields_and_fills_defaults() {
        let error = SyncSettings::from_json_str(r#"{"api_url": "https://x"}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));

        let settings =
            SyncSettings::from_json_str(r#"{"backoff_base_ms": 10, "backoff_max_ms": 20}"#).unwrap();
        assert_eq!(settings.retry_policy().backoff_max, Duration::from_millis(20));
        assert_eq!(settings.max_attempts, DEFAULT_MAX_ATTEMPTS);

        let error =
            SyncSettings::from_json_str(r#"{"backoff_base_ms": 30, "backoff_max_ms": 20}"#).unwrap_err();
        assert!(error.to_string().contains("backoff_base_ms"));
    }

    #[test]
    fn json_file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sync.json");
        std::fs::write(&path, r#"{"api_base_url": "http://localhost:8080", "max_attempts": 2}"#)
            .unwrap();

        let settings = SyncSettings::from_json_file(&path).unwrap();
        assert_eq!(settings.api_base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(settings.max_attempts, 2);

        let missing = SyncSettings::from_json_file(&tmp.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }

    #[test]
    fn debug_redacts_token() {
        let settings = SyncSettings {
            api_token: Some("secret".into()),
            ..SyncSettings::default()
        };
        assert!(!format!("{settings:?}").contains("secret"));
    }
}
