// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration
//!
//! Loaded from a JSON file when one is given, otherwise built from defaults
//! and overridden by CLI flags. Unknown keys are rejected so a typo in a
//! config file fails loudly instead of silently using a default.

use crate::backends::camera::types::{CameraBackendType, CaptureFormat, PixelFormat};
use crate::constants;
use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfig {
    /// Number of lock-step sources
    pub source_count: usize,
    pub backend: CameraBackendType,
    pub width: u32,
    pub height: u32,
    /// Per-source latest-image buffer pool capacity
    pub pool_capacity: usize,
    pub retrieve_timeout_ms: u64,
    pub frame_rate: u32,
    /// JPEG quality for recordings, 1..=100
    pub quality: u8,
    pub display: bool,
    pub record: bool,
    /// Recording directory; defaults to a session directory under the
    /// user's video directory
    pub output_dir: Option<PathBuf>,
    /// Stop after this many delivered cycles
    pub frame_limit: Option<u64>,
    pub concurrent_retrieval: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_count: constants::DEFAULT_SOURCE_COUNT,
            backend: CameraBackendType::default(),
            width: constants::DEFAULT_WIDTH,
            height: constants::DEFAULT_HEIGHT,
            pool_capacity: constants::DEFAULT_POOL_CAPACITY,
            retrieve_timeout_ms: constants::DEFAULT_RETRIEVE_TIMEOUT.as_millis() as u64,
            frame_rate: constants::DEFAULT_FRAME_RATE,
            quality: constants::DEFAULT_QUALITY,
            display: true,
            record: true,
            output_dir: None,
            frame_limit: None,
            concurrent_retrieval: true,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Config(format!("parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.source_count == 0 {
            return Err(PipelineError::Config("source_count must be at least 1".into()));
        }
        if self.pool_capacity == 0 {
            return Err(PipelineError::Config("pool_capacity must be at least 1".into()));
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(PipelineError::Config(format!(
                "quality must be in 1..=100, got {}",
                self.quality
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::Config("width and height must be non-zero".into()));
        }
        Ok(())
    }

    pub fn retrieve_timeout(&self) -> Duration {
        Duration::from_millis(self.retrieve_timeout_ms)
    }

    pub fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            width: self.width,
            height: self.height,
            pixel_format: PixelFormat::Bgr8,
            frame_rate: self.frame_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.source_count, 3);
        assert_eq!(config.retrieve_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"source_count": 2, "record": false}"#).unwrap();
        assert_eq!(config.source_count, 2);
        assert!(!config.record);
        assert_eq!(config.quality, constants::DEFAULT_QUALITY);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<PipelineConfig>(r#"{"sourcecount": 2}"#).is_err());
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let config = PipelineConfig {
            quality: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_sources_is_rejected() {
        let config = PipelineConfig {
            source_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
