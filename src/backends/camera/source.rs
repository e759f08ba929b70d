// SPDX-License-Identifier: GPL-3.0-only

//! Acquisition lifecycle of one source
//!
//! A `SourceHandle` ties together a device, its latest-image [`FramePool`]
//! and the capture loop feeding that pool. Lifecycle is strictly
//! `Closed → Open → Acquiring → Stopped`; stop and close are idempotent.

use super::frame_loop::{CaptureLoop, LoopAction};
use super::pool::FramePool;
use super::types::{CameraFrame, CaptureFormat, DeviceDescriptor, GrabStatus, SourceId, SourceState};
use super::{CameraBackend, CaptureDevice};
use crate::errors::CaptureError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct SourceHandle {
    id: SourceId,
    descriptor: DeviceDescriptor,
    format: CaptureFormat,
    pool: Arc<FramePool>,
    state: SourceState,
    /// Present between open() and start_acquisition(), then moved onto the
    /// capture thread
    device: Option<Box<dyn CaptureDevice>>,
    capture_loop: Option<CaptureLoop>,
}

impl SourceHandle {
    pub fn new(
        id: SourceId,
        descriptor: DeviceDescriptor,
        format: CaptureFormat,
        pool_capacity: usize,
    ) -> Self {
        Self {
            id,
            descriptor,
            format,
            pool: Arc::new(FramePool::new(pool_capacity)),
            state: SourceState::Closed,
            device: None,
            capture_loop: None,
        }
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    /// Attach the underlying device. `Closed → Open`.
    pub fn open(&mut self, backend: &dyn CameraBackend) -> Result<(), CaptureError> {
        if self.state != SourceState::Closed {
            return Err(CaptureError::DeviceUnavailable {
                source: self.id.label.clone(),
                reason: format!("open() in state {}", self.state),
            });
        }
        let device = backend.attach(&self.descriptor, &self.format)?;
        info!(
            source = %self.id,
            serial = %self.descriptor.serial,
            format = %self.format,
            "Using device"
        );
        self.device = Some(device);
        self.state = SourceState::Open;
        Ok(())
    }

    /// Spawn the capture loop feeding this source's pool. `Open → Acquiring`.
    pub fn start_acquisition(&mut self) -> Result<(), CaptureError> {
        let mut device = match (self.state, self.device.take()) {
            (SourceState::Open, Some(device)) => device,
            (state, device) => {
                self.device = device;
                return Err(CaptureError::DeviceUnavailable {
                    source: self.id.label.clone(),
                    reason: format!("start_acquisition() in state {}", state),
                });
            }
        };

        let id = self.id.clone();
        let pool = Arc::clone(&self.pool);
        self.capture_loop = Some(CaptureLoop::spawn(&self.id.label, move || {
            match device.grab() {
                Ok(mut frame) => {
                    // The device reports its own identity; remap to the
                    // configured source id so failures stay attributable
                    frame.source = id.clone();
                    pool.push(frame);
                    LoopAction::Continue
                }
                Err(err) => {
                    warn!(source = %id, error = %err, "Device failed, capture loop exiting");
                    pool.close();
                    LoopAction::Stop
                }
            }
        }));
        self.state = SourceState::Acquiring;
        Ok(())
    }

    /// Shared pool handle, for retrievals issued off-thread by the acquirer
    pub(crate) fn pool_arc(&self) -> &Arc<FramePool> {
        &self.pool
    }

    /// Wait up to `timeout` for this source's next frame.
    ///
    /// Only valid while acquiring. A device-flagged bad grab surfaces as
    /// [`CaptureError::GrabFailed`]; an empty pool at the deadline as
    /// [`CaptureError::AcquisitionTimeout`]. `cycle` is threaded through for
    /// attribution only.
    pub fn retrieve(&self, timeout: Duration, cycle: u64) -> Result<CameraFrame, CaptureError> {
        retrieve_from(&self.pool, &self.id.label, timeout, cycle)
    }

    /// Stop the capture loop and close the pool. Idempotent.
    /// `Acquiring/Open → Stopped`.
    pub fn stop_acquisition(&mut self) {
        if self.state == SourceState::Stopped {
            return;
        }
        self.pool.close();
        if let Some(mut capture_loop) = self.capture_loop.take() {
            capture_loop.stop();
        }
        self.device = None;
        info!(source = %self.id, dropped = self.pool.dropped_frames(), "Source stopped");
        self.state = SourceState::Stopped;
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.stop_acquisition();
    }
}

/// Pool-level retrieval with error attribution.
///
/// Split out of [`SourceHandle::retrieve`] so the acquirer's concurrent mode
/// can issue retrievals from scoped threads holding only the (thread-safe)
/// pool, not the whole handle.
pub(crate) fn retrieve_from(
    pool: &FramePool,
    label: &str,
    timeout: Duration,
    cycle: u64,
) -> Result<CameraFrame, CaptureError> {
    let frame = pool
        .pop(timeout)
        .ok_or_else(|| CaptureError::AcquisitionTimeout {
            source: label.to_string(),
            cycle,
        })?;
    match frame.status {
        GrabStatus::Ok => Ok(frame),
        GrabStatus::Failed {
            code,
            ref description,
        } => Err(CaptureError::GrabFailed {
            source: label.to_string(),
            cycle,
            code,
            description: description.clone(),
        }),
    }
}
