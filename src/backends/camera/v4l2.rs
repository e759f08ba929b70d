// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera backend
//!
//! Enumerates `/dev/video*` nodes and captures through memory-mapped
//! streaming. The stream borrows from its device, so both live together in
//! an ouroboros-built self-referencing struct.

use super::types::{
    CameraBackendType, CameraFrame, CaptureFormat, DeviceDescriptor, FrameData, GrabStatus,
    PixelFormat, SourceId,
};
use super::{CameraBackend, CaptureDevice};
use crate::errors::CaptureError;
use ouroboros::self_referencing;
use std::path::PathBuf;
use tracing::{info, warn};

fn fourcc_for(format: PixelFormat) -> v4l::FourCC {
    match format {
        PixelFormat::Mono8 => v4l::FourCC::new(b"GREY"),
        PixelFormat::Rgb8 => v4l::FourCC::new(b"RGB3"),
        PixelFormat::Bgr8 => v4l::FourCC::new(b"BGR3"),
        PixelFormat::Rgba8 => v4l::FourCC::new(b"AB24"),
        PixelFormat::Yuyv => v4l::FourCC::new(b"YUYV"),
    }
}

fn pixel_format_for(fourcc: v4l::FourCC) -> Option<PixelFormat> {
    match &fourcc.repr {
        b"GREY" => Some(PixelFormat::Mono8),
        b"RGB3" => Some(PixelFormat::Rgb8),
        b"BGR3" => Some(PixelFormat::Bgr8),
        b"AB24" => Some(PixelFormat::Rgba8),
        b"YUYV" => Some(PixelFormat::Yuyv),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for V4l2Backend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        !self.enumerate().is_empty()
    }

    fn enumerate(&self) -> Vec<DeviceDescriptor> {
        let mut nodes: Vec<PathBuf> = match std::fs::read_dir("/dev") {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| name.starts_with("video"))
                })
                .collect(),
            Err(_) => return Vec::new(),
        };
        nodes.sort();

        nodes
            .into_iter()
            .filter_map(|path| {
                let device = v4l::Device::with_path(&path).ok()?;
                let caps = device.query_caps().ok()?;
                Some(DeviceDescriptor {
                    path: path.to_string_lossy().into_owned(),
                    serial: caps.bus.clone(),
                    model: caps.card.clone(),
                })
            })
            .collect()
    }

    fn attach(
        &self,
        descriptor: &DeviceDescriptor,
        format: &CaptureFormat,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let device = V4l2Device::open(descriptor, format)?;
        Ok(Box::new(device))
    }
}

#[self_referencing]
struct StreamState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct V4l2Device {
    path: String,
    state: StreamState,
    format: CaptureFormat,
    sequence: u64,
}

impl V4l2Device {
    fn open(descriptor: &DeviceDescriptor, requested: &CaptureFormat) -> Result<Self, CaptureError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let unavailable = |reason: String| CaptureError::DeviceUnavailable {
            source: descriptor.path.clone(),
            reason,
        };

        let device = v4l::Device::with_path(&descriptor.path)
            .map_err(|e| unavailable(format!("open: {}", e)))?;

        let mut format = device
            .format()
            .map_err(|e| unavailable(format!("read format: {}", e)))?;
        format.width = requested.width;
        format.height = requested.height;
        format.fourcc = fourcc_for(requested.pixel_format);

        // Drivers may refuse the request; capture whatever they settled on
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                warn!(path = %descriptor.path, error = %err, "Format not accepted");
                device
                    .format()
                    .map_err(|e| unavailable(format!("read format after set failure: {}", e)))?
            }
        };
        let pixel_format = pixel_format_for(format.fourcc)
            .ok_or_else(|| unavailable(format!("unsupported fourcc {}", format.fourcc)))?;

        if requested.frame_rate > 0 {
            let params = v4l::video::capture::Parameters::with_fps(requested.frame_rate);
            if let Err(err) = device.set_params(&params) {
                warn!(path = %descriptor.path, error = %err, "Frame rate not accepted");
            }
        }

        let state = StreamStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(
                    device,
                    Type::VideoCapture,
                    crate::constants::DEFAULT_POOL_CAPACITY as u32,
                )
            },
        }
        .try_build()
        .map_err(|e| unavailable(format!("create stream: {}", e)))?;

        info!(
            path = %descriptor.path,
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "V4L2 device streaming"
        );
        Ok(Self {
            path: descriptor.path.clone(),
            state,
            format: CaptureFormat {
                width: format.width,
                height: format.height,
                pixel_format,
                frame_rate: requested.frame_rate,
            },
            sequence: 0,
        })
    }

    fn frame(&self, data: FrameData, status: GrabStatus) -> CameraFrame {
        CameraFrame {
            // Remapped to the configured SourceId by the capture loop
            source: SourceId::new(0, &self.path),
            width: self.format.width,
            height: self.format.height,
            format: self.format.pixel_format,
            data,
            sequence: self.sequence,
            captured_at: std::time::Instant::now(),
            timestamp: chrono::Local::now(),
            status,
        }
    }
}

impl CaptureDevice for V4l2Device {
    fn grab(&mut self) -> Result<CameraFrame, CaptureError> {
        use v4l::io::traits::CaptureStream;

        self.sequence += 1;
        match self.state.with_stream_mut(|stream| {
            stream.next().map(|(buf, _meta)| buf.to_vec())
        }) {
            Ok(buf) => Ok(self.frame(FrameData::from_vec(buf), GrabStatus::Ok)),
            Err(err) => {
                // Surface the bad grab; retrieval attributes it to a cycle
                let code = err.raw_os_error().map(|e| e as u32).unwrap_or(0);
                Ok(self.frame(
                    FrameData::from_vec(Vec::new()),
                    GrabStatus::Failed {
                        code,
                        description: err.to_string(),
                    },
                ))
            }
        }
    }
}
