// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use lockstep::backends::camera::types::CameraBackendType;
use lockstep::config::PipelineConfig;
use std::time::Duration;

#[test]
fn test_config_default() {
    // Defaults must describe a runnable pipeline
    let config = PipelineConfig::default();
    config.validate().expect("default config should be valid");

    assert_eq!(config.source_count, 3, "Three lock-step sources by default");
    assert_eq!(config.backend, CameraBackendType::Synthetic);
    assert_eq!(
        config.retrieve_timeout(),
        Duration::from_millis(5000),
        "Retrieval timeout should default to 5 seconds"
    );
    assert_eq!(config.pool_capacity, 4);
    assert!(config.display && config.record);
}

#[test]
fn test_config_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    std::fs::write(
        &path,
        r#"{"source_count": 2, "frame_rate": 30, "display": false}"#,
    )
    .unwrap();

    let config = PipelineConfig::load(&path).unwrap();
    assert_eq!(config.source_count, 2);
    assert_eq!(config.frame_rate, 30);
    assert!(!config.display);
    // Unspecified keys keep their defaults
    assert_eq!(config.quality, 90);
}

#[test]
fn test_config_load_missing_file() {
    let result = PipelineConfig::load(std::path::Path::new("/nonexistent/pipeline.json"));
    assert!(result.is_err(), "Missing config file should be an error");
}

#[test]
fn test_config_load_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    std::fs::write(&path, r#"{"source_count": 0}"#).unwrap();

    assert!(
        PipelineConfig::load(&path).is_err(),
        "Zero sources should fail validation at load time"
    );
}

#[test]
fn test_config_roundtrip() {
    let config = PipelineConfig {
        source_count: 5,
        frame_limit: Some(100),
        ..Default::default()
    };
    let text = serde_json::to_string(&config).unwrap();
    let parsed: PipelineConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
