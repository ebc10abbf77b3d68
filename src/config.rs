//! Application configuration loaded from environment variables.

use serde::Deserialize;
use strum::Display;

/// Deployment mode, read from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeploymentMode {
    /// Error details are hidden from clients.
    Production,
    /// Local development.
    #[default]
    Development,
    /// Test runs: the flag evaluator is not initialized at startup.
    Test,
}

impl DeploymentMode {
    /// Whether this is a production deployment.
    pub fn is_production(self) -> bool {
        self == DeploymentMode::Production
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deployment mode (production, development, test).
    #[serde(default)]
    pub app_env: DeploymentMode,

    /// Version reported by the health check.
    #[serde(default)]
    pub version: Option<String>,

    // === Feature Flags ===
    /// Flag service SDK key. Absent means flags always resolve to defaults.
    #[serde(default)]
    pub flag_sdk_key: Option<String>,

    /// Flag service base URL.
    #[serde(default = "default_flag_service_url")]
    pub flag_service_url: String,

    /// Environment key sent with every evaluation.
    #[serde(default = "default_flag_environment")]
    pub flag_environment: String,

    /// Transport timeout for flag service calls.
    #[serde(default = "default_flag_timeout_ms")]
    pub flag_timeout_ms: u64,

    // === Logging ===
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Emit JSON log lines.
    #[serde(default)]
    pub log_json: bool,
}

fn default_port() -> u16 {
    3000
}

fn default_flag_service_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_flag_environment() -> String {
    "production".to_string()
}

fn default_flag_timeout_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Version reported when `VERSION` is not set.
pub const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            app_env: DeploymentMode::default(),
            version: None,
            flag_sdk_key: None,
            flag_service_url: default_flag_service_url(),
            flag_environment: default_flag_environment(),
            flag_timeout_ms: default_flag_timeout_ms(),
            rust_log: default_log_level(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("PORT must be non-zero".to_string());
        }

        if let Err(e) = url::Url::parse(&self.flag_service_url) {
            return Err(format!("FLAG_SERVICE_URL is not a valid URL: {}", e));
        }

        if self.flag_timeout_ms == 0 {
            return Err("FLAG_TIMEOUT_MS must be greater than 0".to_string());
        }

        Ok(())
    }

    /// The SDK key, treating a blank value as absent.
    pub fn sdk_key(&self) -> Option<&str> {
        self.flag_sdk_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Version string for the health check.
    pub fn version(&self) -> &str {
        self.version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_sensible() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.app_env, DeploymentMode::Development);
        assert_eq!(config.flag_timeout_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserializes_from_env_pairs() {
        let vars = vec![
            ("PORT".to_string(), "8081".to_string()),
            ("APP_ENV".to_string(), "production".to_string()),
            ("FLAG_SDK_KEY".to_string(), "sdk-123".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.port, 8081);
        assert!(config.app_env.is_production());
        assert_eq!(config.sdk_key(), Some("sdk-123"));
        assert_eq!(config.flag_service_url, "http://localhost:8000");
    }

    #[test]
    fn blank_sdk_key_is_treated_as_absent() {
        let config = Config {
            flag_sdk_key: Some("   ".to_string()),
            ..Config::default()
        };
        assert_eq!(config.sdk_key(), None);
    }

    #[test]
    fn version_falls_back_to_package_version() {
        let mut config = Config::default();
        assert_eq!(config.version(), DEFAULT_VERSION);
        assert!(!config.version().is_empty());

        config.version = Some("2.3.4".to_string());
        assert_eq!(config.version(), "2.3.4");
    }

    #[test]
    fn validate_rejects_bad_flag_service_url() {
        let config = Config {
            flag_service_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_port_and_timeout() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            flag_timeout_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
