// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera backend
//!
//! Generates a moving RGB gradient at the configured rate, one device per
//! configured slot. Always available, so the full pipeline (pools, acquirer,
//! converter, sinks) runs and is testable on machines without cameras.

use super::types::{
    CameraBackendType, CameraFrame, CaptureFormat, DeviceDescriptor, FrameData, GrabStatus,
    PixelFormat, SourceId,
};
use super::{CameraBackend, CaptureDevice};
use crate::errors::CaptureError;
use std::time::{Duration, Instant};
use tracing::debug;

/// Backend producing test-pattern devices
pub struct SyntheticBackend {
    device_count: usize,
}

impl SyntheticBackend {
    pub fn new(device_count: usize) -> Self {
        Self { device_count }
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        // Enough slots for any realistic rig; attach is what binds a slot
        Self::new(8)
    }
}

impl CameraBackend for SyntheticBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Synthetic
    }

    fn is_available(&self) -> bool {
        true
    }

    fn enumerate(&self) -> Vec<DeviceDescriptor> {
        (0..self.device_count)
            .map(|i| DeviceDescriptor {
                path: format!("synthetic:{}", i),
                serial: format!("SYN-{:04}", i),
                model: "Synthetic test pattern".to_string(),
            })
            .collect()
    }

    fn attach(
        &self,
        descriptor: &DeviceDescriptor,
        format: &CaptureFormat,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let slot: usize = descriptor
            .path
            .strip_prefix("synthetic:")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| CaptureError::DeviceUnavailable {
                source: descriptor.path.clone(),
                reason: "not a synthetic device path".to_string(),
            })?;
        if slot >= self.device_count {
            return Err(CaptureError::DeviceUnavailable {
                source: descriptor.path.clone(),
                reason: format!("slot {} out of range", slot),
            });
        }
        debug!(path = %descriptor.path, format = %format, "Attached synthetic device");
        Ok(Box::new(SyntheticDevice::new(slot, format.clone())))
    }
}

/// One synthetic device paced at the configured frame rate
pub struct SyntheticDevice {
    slot: usize,
    format: CaptureFormat,
    sequence: u64,
    frame_interval: Duration,
    next_frame_at: Instant,
}

impl SyntheticDevice {
    pub fn new(slot: usize, format: CaptureFormat) -> Self {
        let fps = format.frame_rate.max(1);
        Self {
            slot,
            format,
            sequence: 0,
            frame_interval: Duration::from_secs(1) / fps,
            next_frame_at: Instant::now(),
        }
    }

    /// Moving gradient with a per-slot phase so each device's picture differs
    fn render_pattern(&self) -> Vec<u8> {
        let w = self.format.width as usize;
        let h = self.format.height as usize;
        let phase = (self.sequence as usize).wrapping_mul(3) + self.slot * 64;
        let mut data = vec![0u8; self.format.pixel_format.buffer_len(self.format.width, self.format.height)];
        match self.format.pixel_format {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => {
                for y in 0..h {
                    for x in 0..w {
                        let i = (y * w + x) * 3;
                        data[i] = ((x + phase) % 256) as u8;
                        data[i + 1] = ((y + phase) % 256) as u8;
                        data[i + 2] = ((x + y + phase) % 256) as u8;
                    }
                }
            }
            PixelFormat::Mono8 => {
                for y in 0..h {
                    for x in 0..w {
                        data[y * w + x] = ((x + y + phase) % 256) as u8;
                    }
                }
            }
            PixelFormat::Rgba8 => {
                for y in 0..h {
                    for x in 0..w {
                        let i = (y * w + x) * 4;
                        data[i] = ((x + phase) % 256) as u8;
                        data[i + 1] = ((y + phase) % 256) as u8;
                        data[i + 2] = ((x + y + phase) % 256) as u8;
                        data[i + 3] = 255;
                    }
                }
            }
            PixelFormat::Yuyv => {
                // Luma gradient over neutral chroma
                for (i, b) in data.iter_mut().enumerate() {
                    *b = if i % 2 == 0 {
                        ((i / 2 + phase) % 256) as u8
                    } else {
                        128
                    };
                }
            }
        }
        data
    }
}

impl CaptureDevice for SyntheticDevice {
    fn grab(&mut self) -> Result<CameraFrame, CaptureError> {
        // Pace to the nominal frame rate like hardware would
        let now = Instant::now();
        if let Some(wait) = self.next_frame_at.checked_duration_since(now) {
            std::thread::sleep(wait);
        }
        self.next_frame_at += self.frame_interval;

        self.sequence += 1;
        let data = self.render_pattern();
        Ok(CameraFrame {
            source: SourceId::new(self.slot, format!("synthetic:{}", self.slot)),
            width: self.format.width,
            height: self.format.height,
            format: self.format.pixel_format,
            data: FrameData::from_vec(data),
            sequence: self.sequence,
            captured_at: Instant::now(),
            timestamp: chrono::Local::now(),
            status: GrabStatus::Ok,
        })
    }
}
