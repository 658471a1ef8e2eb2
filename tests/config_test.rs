//! Configuration loading: YAML base, environment overlay and variable overrides

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use transfer_queue::{ConfigManager, TransferError, TransferQueueConfig};

const BASE: &str = r#"
processor:
  min_poll_interval_ms: 10
  max_poll_interval_ms: 10000
  batch_size: 10
  worker_count: 10
circuit_breaker:
  enabled: true
  failure_threshold: 5
"#;

fn write_config(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("write config file");
}

fn config_dir(base: &str) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    write_config(dir.path(), "transfer-queue.yaml", base);
    dir
}

#[test]
fn test_base_file_with_defaults_for_missing_keys() {
    let dir = config_dir(BASE);

    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "development")
            .unwrap();
    let config = manager.config();

    assert_eq!(manager.environment(), "development");
    assert_eq!(config.processor.batch_size, 10);
    assert_eq!(config.processor.min_poll_interval(), Duration::from_millis(10));
    assert_eq!(config.processor.max_poll_interval(), Duration::from_secs(10));
    assert_eq!(config.dispatch_retry, TransferQueueConfig::default().dispatch_retry);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_environment_overlay_overrides_base() {
    let dir = config_dir(BASE);
    write_config(
        dir.path(),
        "transfer-queue.test.yaml",
        "processor:\n  max_poll_interval_ms: 100\ncircuit_breaker:\n  enabled: false\n",
    );

    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test").unwrap();
    let config = manager.config();

    assert_eq!(config.processor.max_poll_interval_ms, 100);
    assert_eq!(config.processor.min_poll_interval_ms, 10);
    assert!(!config.circuit_breaker.enabled);
}

#[test]
fn test_variable_overrides_win_over_files() {
    let dir = config_dir(BASE);
    let overrides = HashMap::from([
        (
            "TRANSFER_QUEUE__PROCESSOR__BATCH_SIZE".to_string(),
            "50".to_string(),
        ),
        (
            "TRANSFER_QUEUE__LOGGING__JSON".to_string(),
            "true".to_string(),
        ),
    ]);

    let manager =
        ConfigManager::load_with_overrides(Some(dir.path().to_path_buf()), "development", overrides)
            .unwrap();

    assert_eq!(manager.config().processor.batch_size, 50);
    assert!(manager.config().logging.json);
}

#[test]
fn test_missing_base_file_is_an_error() {
    let dir = TempDir::new().unwrap();

    let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
        .unwrap_err();
    assert!(matches!(err, TransferError::Configuration(_)));
}

#[test]
fn test_invalid_values_are_rejected() {
    let dir = config_dir(
        "processor:\n  min_poll_interval_ms: 500\n  max_poll_interval_ms: 100\n",
    );

    let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
        .unwrap_err();
    match err {
        TransferError::Configuration(message) => assert!(message.contains("min_poll_interval_ms")),
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn test_shipped_configuration_loads_for_every_environment() {
    let shipped = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config");

    for environment in ["development", "test", "production"] {
        let manager =
            ConfigManager::load_from_directory_with_env(Some(shipped.clone()), environment)
                .unwrap_or_else(|err| panic!("{environment}: {err}"));
        assert!(manager.config().validate().is_ok());
    }

    let production =
        ConfigManager::load_from_directory_with_env(Some(shipped), "production").unwrap();
    assert!(production.config().logging.json);
}
