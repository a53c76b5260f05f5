use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hydra_bridge::adapters::js::EngineConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    IoError(String, #[source] std::io::Error),

    #[error("JSON parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Schema validation failed: {0}")]
    ValidationError(String),
}

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[schemars(title = "Hydra Host Configuration")]
#[schemars(description = "Configuration for the headless GeoGebra applet host")]
pub struct Config {
    /// Logging level
    #[serde(default = "default_log_level")]
    #[schemars(description = "Log level: trace, debug, info, warn, error")]
    #[schemars(regex(pattern = r"^(trace|debug|info|warn|error)$"))]
    pub log_level: String,

    /// Applet script to load instead of the bundled one
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Path to a JavaScript file that defines window.ggbApplet (default: bundled applet)")]
    pub applet: Option<PathBuf>,

    /// How long to wait for the applet before giving up
    #[serde(default = "default_load_timeout_ms")]
    #[schemars(description = "Milliseconds to wait for the applet to report itself loaded", range(min = 1, max = 600000))]
    pub load_timeout_ms: u64,

    /// Animation frame interval
    #[serde(default = "default_frame_interval_ms")]
    #[schemars(description = "Milliseconds between requestAnimationFrame callbacks", range(min = 1, max = 1000))]
    pub frame_interval_ms: u64,

    /// Commands run once the applet is ready
    #[serde(default)]
    #[schemars(description = "GeoGebra commands evaluated in order after the applet has loaded")]
    pub startup_commands: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_load_timeout_ms() -> u64 {
    10_000
}

fn default_frame_interval_ms() -> u64 {
    16
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            applet: None,
            load_timeout_ms: default_load_timeout_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            startup_commands: Vec::new(),
        }
    }
}

impl Config {
    /// Load and validate from JSON file
    pub fn from_json_file(path: &str) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::IoError(path.to_string(), e))?;
        Self::from_json_str(&content)
    }

    /// Load and validate from JSON string
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        let schema_json = serde_json::to_value(Self::schema())?;
        let compiled = jsonschema::validator_for(&schema_json)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        compiled
            .validate(&value)
            .map_err(|e| ConfigError::ValidationError(format!("{}", e)))?;

        Ok(serde_json::from_value(value)?)
    }

    /// JSON schema of the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Config)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Engine settings derived from this configuration
    pub fn engine_config(&self) -> EngineConfig {
        let config = EngineConfig::new().with_frame_interval(Duration::from_millis(self.frame_interval_ms));
        match &self.applet {
            Some(path) => config.with_applet_file(path),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydra_bridge::adapters::js::AppletSource;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.load_timeout(), Duration::from_secs(10));
        assert!(config.startup_commands.is_empty());
        assert!(matches!(config.engine_config().applet(), AppletSource::Bundled));
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.frame_interval_ms, 16);
        assert_eq!(config.load_timeout_ms, 10_000);
    }

    #[test]
    fn test_valid_json() {
        let json = r#"{
            "log_level": "debug",
            "applet": "./ggb.js",
            "load_timeout_ms": 2500,
            "frame_interval_ms": 8,
            "startup_commands": ["A = (1, 2)", "B = (3, 4)"]
        }"#;

        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.load_timeout(), Duration::from_millis(2500));
        assert_eq!(config.startup_commands.len(), 2);

        let engine = config.engine_config();
        assert_eq!(engine.frame_interval(), Duration::from_millis(8));
        assert!(matches!(engine.applet(), AppletSource::File(p) if p.ends_with("ggb.js")));
    }

    #[test]
    fn test_invalid_log_level() {
        let result = Config::from_json_str(r#"{ "log_level": "loud" }"#);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_invalid_frame_interval() {
        let result = Config::from_json_str(r#"{ "frame_interval_ms": 0 }"#);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = Config::from_json_str(r#"{ "tick_rate": 64 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_json() {
        let result = Config::from_json_str("{ log_level: ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
