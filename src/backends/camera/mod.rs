// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The pipeline core never talks to camera hardware directly. It consumes
//! two narrow capabilities:
//!
//! - [`CameraBackend`]: device discovery and attachment, one per vendor
//!   stack (synthetic test patterns, V4L2, ...)
//! - [`CaptureDevice`]: one attached device delivering raw frames
//!
//! Vendor-runtime initialization and teardown is modeled by
//! [`BackendRuntime`], a guard acquired before any backend call and held for
//! the whole controller lifetime, so teardown runs on every exit path.

pub mod acquirer;
pub mod frame_loop;
pub mod pool;
pub mod source;
pub mod synthetic;
pub mod types;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use acquirer::{RetrievalMode, SynchronizedAcquirer};
pub use frame_loop::{CaptureLoop, LoopAction};
pub use pool::FramePool;
pub use source::SourceHandle;
pub use types::*;

use crate::errors::CaptureError;
use tracing::info;

/// Device discovery and attachment for one vendor stack
pub trait CameraBackend: Send {
    /// Backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Whether the backend can run on this system
    fn is_available(&self) -> bool;

    /// Enumerate attachable devices, in a stable order
    fn enumerate(&self) -> Vec<DeviceDescriptor>;

    /// Attach one enumerated device with the requested capture format.
    ///
    /// The returned device is handed to the source's capture loop and lives
    /// on that thread until the source stops.
    fn attach(
        &self,
        descriptor: &DeviceDescriptor,
        format: &CaptureFormat,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError>;
}

/// One attached device: the only thing the capture loop talks to
pub trait CaptureDevice: Send {
    /// Block until the device delivers its next grab result.
    ///
    /// Bad grabs are delivered as frames with a failed [`GrabStatus`], not
    /// as errors; the source surfaces them to the acquirer at retrieval
    /// time. An `Err` means the device itself broke.
    fn grab(&mut self) -> Result<CameraFrame, CaptureError>;
}

/// Scoped vendor-runtime bracket.
///
/// Stands in for process-wide init/terminate pairs of camera SDKs. Acquire
/// before constructing the controller; released on drop, including on error
/// and panic unwinds.
pub struct BackendRuntime {
    backend_type: CameraBackendType,
}

impl BackendRuntime {
    pub fn acquire(backend_type: CameraBackendType) -> Self {
        info!(backend = %backend_type, "Acquiring backend runtime");
        Self { backend_type }
    }

    pub fn backend_type(&self) -> CameraBackendType {
        self.backend_type
    }
}

impl Drop for BackendRuntime {
    fn drop(&mut self) {
        info!(backend = %self.backend_type, "Released backend runtime");
    }
}

/// Get a concrete backend instance for the requested type.
///
/// Requesting `V4l2` without the feature falls back to the synthetic
/// backend so `list` still produces useful output.
pub fn get_backend(backend_type: CameraBackendType) -> Box<dyn CameraBackend> {
    match backend_type {
        CameraBackendType::Synthetic => Box::new(synthetic::SyntheticBackend::default()),
        #[cfg(feature = "v4l2")]
        CameraBackendType::V4l2 => Box::new(v4l2::V4l2Backend::new()),
        #[cfg(not(feature = "v4l2"))]
        CameraBackendType::V4l2 => {
            tracing::warn!("v4l2 feature not compiled in, using synthetic backend");
            Box::new(synthetic::SyntheticBackend::default())
        }
    }
}
