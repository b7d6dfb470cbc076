//! Configuration for the VitalWatch agent.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timezone used to classify readings into time-of-day slots
    pub timezone: Tz,

    /// Number of recent values averaged by the forecaster
    pub forecast_window: usize,

    /// Number of history entries fetched for each analysis
    pub history_limit: usize,

    /// How long history entries are kept
    #[serde(with = "duration_serde")]
    pub retention: Duration,

    /// Path for storing history, records and the activity log
    pub data_path: PathBuf,

    /// Port of the HTTP analysis server
    pub server_port: u16,

    /// Optional webhook notification target
    pub webhook: WebhookConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitalwatch-agent");

        Self {
            timezone: Tz::UTC,
            forecast_window: 5,
            history_limit: 50,
            retention: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            data_path: data_dir,
            server_port: 3000,
            webhook: WebhookConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitalwatch-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Path of the persisted history store.
    pub fn store_path(&self) -> PathBuf {
        self.data_path.join("store.json")
    }

    /// Path of the persisted activity log.
    pub fn activity_path(&self) -> PathBuf {
        self.data_path.join("activity.json")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "history_limit must be at least 1".to_string(),
            ));
        }
        if self.retention.is_zero() {
            return Err(ConfigError::Invalid("retention must be positive".to_string()));
        }
        Ok(())
    }
}

/// Webhook notification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Target URL; webhook notifications are disabled when unset
    pub url: Option<String>,
    /// Bearer authentication token
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl WebhookConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(10))
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, stored as whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path() -> PathBuf {
        std::env::temp_dir().join(format!("vitalwatch-config-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_save_and_reload() {
        let path = temp_config_path();
        let config = Config {
            timezone: chrono_tz::Europe::Berlin,
            forecast_window: 8,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(reloaded.forecast_window, 8);
        assert_eq!(reloaded.retention, config.retention);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.forecast_window, 5);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.retention, Duration::from_secs(604_800));
        assert!(!config.webhook.is_enabled());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"timezone": "Asia/Ho_Chi_Minh", "retention": 3600}"#).unwrap();
        assert_eq!(config.timezone, chrono_tz::Asia::Ho_Chi_Minh);
        assert_eq!(config.retention, Duration::from_secs(3600));
        assert_eq!(config.history_limit, 50);
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let result: Result<Config, _> = serde_json::from_str(r#"{"timezone": "Mars/Olympus"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let path = std::env::temp_dir().join("vitalwatch-missing-config.json");
        let _ = std::fs::remove_file(&path);
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_load_rejects_zero_history_limit() {
        let path = temp_config_path();
        std::fs::write(&path, r#"{"history_limit": 0}"#).unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_webhook_enabled() {
        let webhook = WebhookConfig {
            url: Some("https://example.com/hook".to_string()),
            token: None,
            timeout_secs: None,
        };
        assert!(webhook.is_enabled());
        assert_eq!(webhook.timeout(), Duration::from_secs(10));

        let blank = WebhookConfig {
            url: Some("  ".to_string()),
            ..WebhookConfig::default()
        };
        assert!(!blank.is_enabled());
    }
}
