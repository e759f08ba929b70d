// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Frame pixel storage.
///
/// Frames are reference counted so a buffer can sit in a source's pool, travel
/// through a `FrameSet` and be held by several sinks without copying. The
/// underlying allocation is reclaimed when the last holder drops it, which is
/// what keeps per-source memory bounded by the pool capacity.
#[derive(Clone)]
pub struct FrameData(Arc<[u8]>);

impl FrameData {
    /// Wrap an owned buffer without copying.
    pub fn from_vec(data: Vec<u8>) -> Self {
        FrameData(Arc::from(data))
    }

    /// Get the length of the frame data in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the frame data is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameData({} bytes)", self.0.len())
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

/// Camera backend type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
pub enum CameraBackendType {
    /// Synthetic test-pattern devices (always available)
    #[default]
    Synthetic,
    /// V4L2 capture devices (feature "v4l2")
    V4l2,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::Synthetic => write!(f, "synthetic"),
            CameraBackendType::V4l2 => write!(f, "v4l2"),
        }
    }
}

/// Identity of one configured source: its position in the configured order
/// plus a short human label ("A", "B", ...) used for windows and file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId {
    pub index: usize,
    pub label: String,
}

impl SourceId {
    pub fn new(index: usize, label: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// A device found during enumeration
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    /// Backend-specific device path or node id
    pub path: String,
    /// Device serial (or a stable synthetic identifier)
    pub serial: String,
    /// Human-readable model/card name
    pub model: String,
}

/// Capture format requested when attaching a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    /// Format the device delivers frames in
    pub pixel_format: PixelFormat,
    /// Nominal device frame rate
    pub frame_rate: u32,
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} {} @ {}fps",
            self.width, self.height, self.pixel_format, self.frame_rate
        )
    }
}

/// Pixel format for camera frames
///
/// Sources deliver any of these; the converter maps everything to `Bgr8`,
/// the canonical packed 3-channel format used by all sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit grayscale, 1 byte per pixel
    Mono8,
    /// Packed R G B, 3 bytes per pixel
    Rgb8,
    /// Packed B G R, 3 bytes per pixel (canonical target)
    Bgr8,
    /// Packed R G B A, 4 bytes per pixel
    Rgba8,
    /// Packed 4:2:2 Y0 U Y1 V, 4 bytes per 2 pixels
    Yuyv,
}

impl PixelFormat {
    /// Bytes per pixel of a packed format. Yuyv is macropixel-packed (4 bytes
    /// per 2 pixels) and reports the 2 bytes each pixel costs.
    pub fn channel_count(&self) -> usize {
        match self {
            PixelFormat::Mono8 => 1,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Yuyv => 2,
        }
    }

    /// Expected buffer length for a tightly packed frame
    pub fn buffer_len(&self, width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * self.channel_count()
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::Mono8 => write!(f, "Mono8"),
            PixelFormat::Rgb8 => write!(f, "RGB8"),
            PixelFormat::Bgr8 => write!(f, "BGR8"),
            PixelFormat::Rgba8 => write!(f, "RGBA8"),
            PixelFormat::Yuyv => write!(f, "YUYV"),
        }
    }
}

/// Outcome of a single grab as reported by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrabStatus {
    /// Frame contains valid pixel data
    Ok,
    /// Device delivered a result but flagged it bad
    Failed { code: u32, description: String },
}

impl GrabStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, GrabStatus::Ok)
    }
}

/// A single frame from one source
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub source: SourceId,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: FrameData,
    /// Strictly increasing per source
    pub sequence: u64,
    /// Capture instant (for latency/pool-age diagnostics)
    pub captured_at: Instant,
    /// Wall-clock capture time
    pub timestamp: chrono::DateTime<chrono::Local>,
    pub status: GrabStatus,
}

/// One synchronized acquisition cycle: exactly one frame per configured
/// source, in configuration order.
///
/// A `FrameSet` only exists for complete cycles. When any source fails its
/// retrieval the acquirer reports a cycle failure instead; partial sets are
/// never produced.
#[derive(Debug, Clone)]
pub struct FrameSet {
    pub cycle: u64,
    pub frames: Vec<CameraFrame>,
}

impl FrameSet {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Acquisition lifecycle of one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Created, device not yet attached
    Closed,
    /// Device attached, not yet delivering frames
    Open,
    /// Capture loop running, pool being fed
    Acquiring,
    /// Stopped; terminal
    Stopped,
}

impl std::fmt::Display for SourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceState::Closed => write!(f, "closed"),
            SourceState::Open => write!(f, "open"),
            SourceState::Acquiring => write!(f, "acquiring"),
            SourceState::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_len_matches_channel_count() {
        assert_eq!(PixelFormat::Bgr8.buffer_len(1920, 1200), 1920 * 1200 * 3);
        assert_eq!(PixelFormat::Mono8.buffer_len(640, 480), 640 * 480);
        assert_eq!(PixelFormat::Yuyv.buffer_len(640, 480), 640 * 480 * 2);
    }

    #[test]
    fn frame_data_is_shared_not_copied() {
        let data = FrameData::from_vec(vec![1, 2, 3, 4]);
        let clone = data.clone();
        assert_eq!(data.as_ref().as_ptr(), clone.as_ref().as_ptr());
        assert_eq!(clone.len(), 4);
    }
}
