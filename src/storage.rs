// SPDX-License-Identifier: GPL-3.0-only

//! Recording storage locations
//!
//! Each run records into its own timestamped session directory so
//! consecutive runs never overwrite each other.

use crate::errors::PipelineError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Base directory for recordings: the user's video directory, falling back
/// to the home directory, then to the current directory.
pub fn recordings_base() -> PathBuf {
    dirs::video_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lockstep")
}

/// Create and return the session directory for this run.
///
/// An explicit `override_dir` is created as given; otherwise a fresh
/// `lockstep/<timestamp>` directory is created under the recordings base.
pub fn session_dir(override_dir: Option<&Path>) -> Result<PathBuf, PipelineError> {
    let dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
            recordings_base().join(stamp.to_string())
        }
    };
    std::fs::create_dir_all(&dir)
        .map_err(|e| PipelineError::Storage(format!("create {}: {}", dir.display(), e)))?;
    info!(dir = %dir.display(), "Session directory ready");
    Ok(dir)
}
