//! Configuration Loader
//!
//! Environment-aware loading of [`TransferQueueConfig`] through the `config` crate:
//! YAML base file, optional per-environment overlay, then environment variables.

use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::TransferQueueConfig;
use crate::constants::environment;
use crate::error::{Result, TransferError};

/// Loaded, validated configuration plus where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TransferQueueConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load from `./config` with environment auto-detection
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load from a specific directory with environment auto-detection
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load from a specific directory with an explicit environment name
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>> {
        Self::build(config_dir, environment, None)
    }

    /// Load with an explicit variable map standing in for the process environment.
    ///
    /// Keys use the same `TRANSFER_QUEUE__SECTION__KEY` form as real variables.
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: HashMap<String, String>,
    ) -> Result<Arc<ConfigManager>> {
        Self::build(config_dir, environment, Some(overrides))
    }

    /// Wrap an already-built configuration
    pub fn from_config(config: TransferQueueConfig) -> Result<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: Self::default_config_directory(),
        }))
    }

    fn build(
        config_dir: Option<PathBuf>,
        environment_name: &str,
        env_source: Option<HashMap<String, String>>,
    ) -> Result<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);
        let base_path = Self::base_file(&config_directory);
        let overlay_path = Self::environment_file(&config_directory, environment_name);

        debug!(
            environment = environment_name,
            base = %base_path.display(),
            overlay = %overlay_path.display(),
            "Loading transfer queue configuration"
        );

        if !base_path.is_file() {
            return Err(TransferError::Configuration(format!(
                "configuration file not found: {}",
                base_path.display()
            )));
        }

        let env_layer = Environment::with_prefix(environment::CONFIG_ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(env_source);

        let config: TransferQueueConfig = Config::builder()
            .add_source(File::from(base_path).required(true))
            .add_source(File::from(overlay_path).required(false))
            .add_source(env_layer)
            .build()?
            .try_deserialize()?;

        config.validate()?;

        info!(
            environment = environment_name,
            min_poll_interval_ms = config.processor.min_poll_interval_ms,
            max_poll_interval_ms = config.processor.max_poll_interval_ms,
            batch_size = config.processor.batch_size,
            worker_count = config.processor.worker_count,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment_name.to_string(),
            config_directory,
        }))
    }

    pub fn config(&self) -> &TransferQueueConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// `TRANSFER_QUEUE_ENV`, then `APP_ENV`, then `development`
    pub fn detect_environment() -> String {
        env::var(environment::ENV_VAR)
            .or_else(|_| env::var(environment::FALLBACK_ENV_VAR))
            .unwrap_or_else(|_| environment::DEFAULT.to_string())
    }

    fn default_config_directory() -> PathBuf {
        PathBuf::from("config")
    }

    fn base_file(dir: &Path) -> PathBuf {
        dir.join(format!("{}.yaml", environment::CONFIG_FILE_STEM))
    }

    fn environment_file(dir: &Path, environment_name: &str) -> PathBuf {
        dir.join(format!(
            "{}.{}.yaml",
            environment::CONFIG_FILE_STEM,
            environment_name
        ))
    }
}
