//! Configuration management for the churn dashboard

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub explanation: ExplanationConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage locations of the pre-built artifacts.
///
/// The whole struct is the cache key for a loaded session, so changing any
/// path loads a fresh artifact set.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Hash)]
pub struct ArtifactsConfig {
    /// XGBoost JSON model
    pub model: String,
    /// Reference dataset the form bounds are taken from
    pub reference: String,
    pub x_train: String,
    pub x_test: String,
    pub y_train: String,
    pub y_test: String,
    /// Fitted scaler JSON
    pub scaler: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8501
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Explanation engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExplanationConfig {
    /// Maximum number of rows in a waterfall plot before folding the rest
    #[serde(default = "default_waterfall_max_display")]
    pub waterfall_max_display: usize,
    /// Check `baseline + sum(phi) == raw output` after computing
    #[serde(default = "default_verify_additivity")]
    pub verify_additivity: bool,
    #[serde(default = "default_additivity_tolerance")]
    pub additivity_tolerance: f64,
}

fn default_waterfall_max_display() -> usize {
    20
}

fn default_verify_additivity() -> bool {
    true
}

fn default_additivity_tolerance() -> f64 {
    1e-6
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            waterfall_max_display: default_waterfall_max_display(),
            verify_additivity: default_verify_additivity(),
            additivity_tolerance: default_additivity_tolerance(),
        }
    }
}

/// What-if prediction configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    /// Identifier stamped on records built from the form
    #[serde(default = "default_placeholder_customer_id")]
    pub placeholder_customer_id: String,
}

fn default_placeholder_customer_id() -> String {
    "6464-UIAEA".to_string()
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            placeholder_customer_id: default_placeholder_customer_id(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifacts: ArtifactsConfig {
                model: "artifacts/model.json".to_string(),
                reference: "artifacts/reference.csv".to_string(),
                x_train: "artifacts/X_train.csv".to_string(),
                x_test: "artifacts/X_test.csv".to_string(),
                y_train: "artifacts/y_train.csv".to_string(),
                y_test: "artifacts/y_test.csv".to_string(),
                scaler: "artifacts/scaler.json".to_string(),
            },
            server: ServerConfig::default(),
            explanation: ExplanationConfig::default(),
            prediction: PredictionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.explanation.waterfall_max_display, 20);
        assert!(config.explanation.verify_additivity);
        assert_eq!(config.prediction.placeholder_customer_id, "6464-UIAEA");
    }

    #[test]
    fn test_load_from_path_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[artifacts]
model = "m.json"
reference = "ref.csv"
x_train = "xtr.csv"
x_test = "xte.csv"
y_train = "ytr.csv"
y_test = "yte.csv"
scaler = "s.json"

[server]
port = 9000
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.artifacts.model, "m.json");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_artifacts_section_fails() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nport = 1").unwrap();
        assert!(AppConfig::load_from_path(file.path()).is_err());
    }
}
