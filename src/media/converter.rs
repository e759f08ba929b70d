// SPDX-License-Identifier: GPL-3.0-only

//! Frame conversion to the canonical pixel format
//!
//! Maps every supported source format to packed BGR while preserving the
//! frame's geometry and identity. Conversion is a pure function of the
//! input frame; the converter itself carries no cross-call state beyond
//! the target format.

use super::conversions;
use crate::backends::camera::types::{CameraFrame, FrameData, FrameSet, PixelFormat, SourceId};
use crate::errors::ConvertError;

/// A frame in the canonical format, ready for sinks
#[derive(Debug, Clone)]
pub struct ConvertedFrame {
    pub source: SourceId,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: FrameData,
    pub sequence: u64,
    pub timestamp: chrono::DateTime<chrono::Local>,
}

/// One fully converted cycle, member order matching the source FrameSet
#[derive(Debug, Clone)]
pub struct ConvertedSet {
    pub cycle: u64,
    pub frames: Vec<ConvertedFrame>,
}

impl ConvertedSet {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

pub struct FrameConverter {
    target: PixelFormat,
    /// Source formats the conversion collaborator has a mapping for
    mappings: Vec<PixelFormat>,
}

impl FrameConverter {
    /// Only `Bgr8` is supported as the canonical target.
    pub fn new(target: PixelFormat) -> Self {
        assert_eq!(target, PixelFormat::Bgr8, "canonical target is BGR8");
        Self {
            target,
            mappings: vec![
                PixelFormat::Mono8,
                PixelFormat::Rgb8,
                PixelFormat::Bgr8,
                PixelFormat::Rgba8,
                PixelFormat::Yuyv,
            ],
        }
    }

    /// Restrict the mapping table, e.g. to what a vendor converter offers
    pub fn with_mappings(target: PixelFormat, mappings: Vec<PixelFormat>) -> Self {
        let mut converter = Self::new(target);
        converter.mappings = mappings;
        converter
    }

    pub fn target(&self) -> PixelFormat {
        self.target
    }

    /// Convert one frame. Output length is always
    /// `width * height * channel_count(target)`.
    pub fn convert(&self, frame: &CameraFrame) -> Result<ConvertedFrame, ConvertError> {
        if !self.mappings.contains(&frame.format) {
            return Err(ConvertError::UnsupportedFormat {
                source: frame.source.label.clone(),
                format: frame.format.to_string(),
            });
        }
        let expected = frame.format.buffer_len(frame.width, frame.height);
        if frame.data.len() != expected {
            return Err(ConvertError::BadBuffer {
                source: frame.source.label.clone(),
                expected,
                actual: frame.data.len(),
            });
        }

        let data = match frame.format {
            // Already canonical: share the buffer, no copy
            PixelFormat::Bgr8 => frame.data.clone(),
            PixelFormat::Rgb8 => FrameData::from_vec(conversions::rgb_to_bgr(&frame.data)),
            PixelFormat::Rgba8 => FrameData::from_vec(conversions::rgba_to_bgr(&frame.data)),
            PixelFormat::Mono8 => FrameData::from_vec(conversions::mono_to_bgr(&frame.data)),
            PixelFormat::Yuyv => FrameData::from_vec(conversions::yuyv_to_bgr(
                &frame.data,
                frame.width,
                frame.height,
            )),
        };

        Ok(ConvertedFrame {
            source: frame.source.clone(),
            width: frame.width,
            height: frame.height,
            format: self.target,
            data,
            sequence: frame.sequence,
            timestamp: frame.timestamp,
        })
    }

    /// Convert a whole cycle, keeping member order
    pub fn convert_set(&self, set: &FrameSet) -> Result<ConvertedSet, ConvertError> {
        let frames = set
            .frames
            .iter()
            .map(|frame| self.convert(frame))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ConvertedSet {
            cycle: set.cycle,
            frames,
        })
    }
}

impl Default for FrameConverter {
    fn default() -> Self {
        Self::new(PixelFormat::Bgr8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::GrabStatus;
    use std::time::Instant;

    fn frame(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> CameraFrame {
        CameraFrame {
            source: SourceId::new(0, "A"),
            width,
            height,
            format,
            data: FrameData::from_vec(data),
            sequence: 1,
            captured_at: Instant::now(),
            timestamp: chrono::Local::now(),
            status: GrabStatus::Ok,
        }
    }

    #[test]
    fn conversion_preserves_geometry_and_sizes_output() {
        let converter = FrameConverter::default();
        for (format, w, h) in [
            (PixelFormat::Rgb8, 8u32, 4u32),
            (PixelFormat::Rgba8, 8, 4),
            (PixelFormat::Mono8, 8, 4),
            (PixelFormat::Yuyv, 8, 4),
            (PixelFormat::Bgr8, 8, 4),
        ] {
            let input = frame(format, w, h, vec![50; format.buffer_len(w, h)]);
            let out = converter.convert(&input).unwrap();
            assert_eq!(out.width, w);
            assert_eq!(out.height, h);
            assert_eq!(out.format, PixelFormat::Bgr8);
            assert_eq!(
                out.data.len(),
                (w * h) as usize * PixelFormat::Bgr8.channel_count()
            );
        }
    }

    #[test]
    fn odd_geometry_yuyv_keeps_the_length_contract() {
        // 3 pixels: the trailing half macropixel must still become a pixel
        let converter = FrameConverter::default();
        let input = frame(PixelFormat::Yuyv, 3, 1, vec![128; 6]);
        let out = converter.convert(&input).unwrap();
        assert_eq!(
            out.data.len(),
            3 * PixelFormat::Bgr8.channel_count(),
            "every input pixel must map to one canonical pixel"
        );
    }

    #[test]
    fn bgr_passthrough_shares_the_buffer() {
        let converter = FrameConverter::default();
        let input = frame(PixelFormat::Bgr8, 4, 2, vec![9; 24]);
        let out = converter.convert(&input).unwrap();
        assert_eq!(input.data.as_ref().as_ptr(), out.data.as_ref().as_ptr());
    }

    #[test]
    fn short_buffer_is_rejected() {
        let converter = FrameConverter::default();
        let input = frame(PixelFormat::Rgb8, 8, 4, vec![0; 10]);
        match converter.convert(&input) {
            Err(ConvertError::BadBuffer { expected, actual, .. }) => {
                assert_eq!(expected, 8 * 4 * 3);
                assert_eq!(actual, 10);
            }
            other => panic!("expected BadBuffer, got {:?}", other),
        }
    }

    #[test]
    fn missing_mapping_is_unsupported() {
        let converter =
            FrameConverter::with_mappings(PixelFormat::Bgr8, vec![PixelFormat::Bgr8]);
        let input = frame(PixelFormat::Yuyv, 4, 2, vec![0; 16]);
        match converter.convert(&input) {
            Err(ConvertError::UnsupportedFormat { source, format }) => {
                assert_eq!(source, "A");
                assert_eq!(format, "YUYV");
            }
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn convert_set_keeps_cycle_and_order() {
        let converter = FrameConverter::default();
        let mut set = FrameSet {
            cycle: 42,
            frames: vec![],
        };
        for i in 0..3 {
            let mut f = frame(PixelFormat::Rgb8, 4, 2, vec![i as u8; 24]);
            f.source = SourceId::new(i, crate::constants::source_label(i));
            set.frames.push(f);
        }
        let converted = converter.convert_set(&set).unwrap();
        assert_eq!(converted.cycle, 42);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted.frames[2].source.label, "C");
    }
}
