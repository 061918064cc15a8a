//! Dispatcher configuration, loaded once at startup.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// Dispatcher-level configuration.
///
/// Set once at startup. The deadline applies to every request alike; there is
/// no per-request override.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Hard deadline for one dispatch in milliseconds.
    pub deadline_ms: u64,
    /// Maximum number of in-flight dispatches before load shedding.
    pub max_concurrent_dispatches: u32,
    /// Application version reported by the server.
    pub version: String,
    /// Active environment name (`dev`, `test`, `prod`, ...).
    pub active_env: String,
    /// Free-form environment properties exposed to handlers.
    pub env: HashMap<String, String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 5_000,
            max_concurrent_dispatches: 1000,
            version: "1.0.0".to_string(),
            active_env: "dev".to_string(),
            env: HashMap::new(),
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("deadline_ms must be greater than zero")]
    ZeroDeadline,
    #[error("max_concurrent_dispatches must be greater than zero")]
    ZeroConcurrency,
}

impl DispatchConfig {
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Looks up an environment property.
    #[must_use]
    pub fn env_property(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// # Errors
    ///
    /// Returns `ConfigError` for a zero deadline or a zero concurrency limit,
    /// either of which would reject every request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deadline_ms == 0 {
            return Err(ConfigError::ZeroDeadline);
        }
        if self.max_concurrent_dispatches == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn dispatch_config_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.deadline(), Duration::from_secs(5));
        assert_eq!(config.max_concurrent_dispatches, 1000);
        assert_eq!(config.version, "1.0.0");
        assert_eq!(config.active_env, "dev");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config: DispatchConfig = serde_json::from_value(json!({
            "active_env": "prod",
            "env": { "pay_notify_url": "https://example.com/notify" }
        }))
        .unwrap();

        assert_eq!(config.active_env, "prod");
        assert_eq!(config.deadline_ms, 5_000);
        assert_eq!(
            config.env_property("pay_notify_url"),
            Some("https://example.com/notify")
        );
        assert_eq!(config.env_property("missing"), None);
    }

    #[test]
    fn zero_values_are_rejected() {
        let config = DispatchConfig {
            deadline_ms: 0,
            ..DispatchConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroDeadline));

        let config = DispatchConfig {
            max_concurrent_dispatches: 0,
            ..DispatchConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroConcurrency));
    }
}
