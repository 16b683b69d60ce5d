use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Model artifact configuration
    pub model: ModelConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Training configuration
    pub training: TrainingConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, the file named by
    /// `CONFIG_PATH` and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration layering an explicit file over the embedded defaults
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: OBESITY_RISK__)
            .add_source(
                config::Environment::with_prefix("OBESITY_RISK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Permissive CORS for browser front-ends
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            cors_permissive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path of the serialized artifact bundle
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Input dataset (CSV)
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Number of trees in the forest
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    /// Maximum tree depth (unbounded when absent)
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Minimum samples required to split a node
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,

    /// Minimum samples in each leaf
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,

    /// Random seed
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Drop the first transport dummy column
    #[serde(default = "default_true")]
    pub drop_first: bool,

    /// Fraction of rows held out for evaluation (0 = fit on everything)
    #[serde(default)]
    pub test_size: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            n_trees: default_n_trees(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            seed: default_seed(),
            drop_first: true,
            test_size: 0.0,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("data/obesity_model.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "obesity-risk".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/Obesity.csv")
}

fn default_n_trees() -> usize {
    100
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_seed() -> u64 {
    42
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_http_port(), 8080);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_n_trees(), 100);
        assert_eq!(default_seed(), 42);
        assert!(default_true());
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config = Config::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.training.n_trees, 100);
        assert!(config.training.drop_first);
        assert_eq!(config.training.test_size, 0.0);
        assert_eq!(
            config.model.artifact_path,
            PathBuf::from("data/obesity_model.json")
        );
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[server]\nhttp_port = \"eighty\"\n").unwrap();

        let err = Config::load_from(path.to_str().unwrap()).unwrap_err();
        let err = crate::error::AppError::from(err);
        assert!(matches!(err, crate::error::AppError::Configuration(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_file_overrides_embedded_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[server]\nhttp_port = 9100\n").unwrap();

        let config = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.http_port, 9100);
        assert_eq!(config.training.n_trees, 100);
    }

    #[test]
    fn test_training_defaults_match_struct_default() {
        let training = TrainingConfig::default();
        assert_eq!(training.min_samples_split, 2);
        assert_eq!(training.min_samples_leaf, 1);
        assert!(training.max_depth.is_none());
    }
}
