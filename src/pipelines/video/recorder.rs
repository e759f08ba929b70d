// SPDX-License-Identifier: GPL-3.0-only

//! Persistent recording sink
//!
//! One writer per source, opened at startup with a fixed frame rate and
//! quality, appended to every complete cycle and closed exactly once during
//! draining. The concrete writer emits an MJPEG elementary stream
//! (`{label}.mjpeg`, concatenated JPEG frames) plus a JSON sidecar carrying
//! the stream parameters, so container muxing stays outside the core.

use crate::errors::SinkError;
use crate::media::conversions::bgr_to_rgb;
use crate::media::{ConvertedFrame, ConvertedSet};
use crate::pipelines::Sink;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Recording collaborator: open/append/close for one source's stream
pub trait VideoWriter: Send {
    /// Append one converted frame to the open stream
    fn append(&mut self, frame: &ConvertedFrame) -> Result<(), SinkError>;

    /// Flush and close the stream. Idempotent.
    fn close(&mut self) -> Result<(), SinkError>;

    /// Path of the stream being written
    fn path(&self) -> &Path;
}

/// Stream parameters persisted next to the MJPEG file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordingMeta {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub quality: u8,
    pub frames_written: u64,
}

/// MJPEG elementary stream writer
pub struct MjpegWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    meta: RecordingMeta,
}

impl MjpegWriter {
    /// Open `{path}` for writing. Mirrors the recording collaborator's
    /// `open(path, width, height, frameRate, quality)`.
    pub fn open(
        path: PathBuf,
        width: u32,
        height: u32,
        frame_rate: u32,
        quality: u8,
    ) -> Result<Self, SinkError> {
        let file = File::create(&path).map_err(|e| SinkError::WriteFailed {
            sink: "recording".to_string(),
            reason: format!("create {}: {}", path.display(), e),
        })?;
        info!(path = %path.display(), width, height, frame_rate, quality, "Recording opened");
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            meta: RecordingMeta {
                width,
                height,
                frame_rate,
                quality,
                frames_written: 0,
            },
        })
    }

    fn sidecar_path(&self) -> PathBuf {
        self.path.with_extension("json")
    }
}

impl VideoWriter for MjpegWriter {
    fn append(&mut self, frame: &ConvertedFrame) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or_else(|| SinkError::Finalized {
            sink: "recording".to_string(),
        })?;
        if (frame.width, frame.height) != (self.meta.width, self.meta.height) {
            return Err(SinkError::WriteFailed {
                sink: "recording".to_string(),
                reason: format!(
                    "frame is {}x{}, stream opened at {}x{}",
                    frame.width, frame.height, self.meta.width, self.meta.height
                ),
            });
        }

        // JPEG wants RGB order; the canonical pipeline format is BGR
        let rgb = bgr_to_rgb(&frame.data);
        let mut encoder = JpegEncoder::new_with_quality(&mut *writer, self.meta.quality);
        encoder
            .encode(
                &rgb,
                frame.width,
                frame.height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| SinkError::WriteFailed {
                sink: "recording".to_string(),
                reason: format!("{}: {}", self.path.display(), e),
            })?;
        self.meta.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush().map_err(|e| SinkError::WriteFailed {
            sink: "recording".to_string(),
            reason: format!("flush {}: {}", self.path.display(), e),
        })?;

        let sidecar = serde_json::to_vec_pretty(&self.meta).map_err(|e| SinkError::WriteFailed {
            sink: "recording".to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(self.sidecar_path(), sidecar).map_err(|e| SinkError::WriteFailed {
            sink: "recording".to_string(),
            reason: format!("sidecar {}: {}", self.sidecar_path().display(), e),
        })?;

        info!(
            path = %self.path.display(),
            frames = self.meta.frames_written,
            "Recording closed"
        );
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MjpegWriter {
    fn drop(&mut self) {
        if self.writer.is_some()
            && let Err(err) = self.close()
        {
            warn!(error = %err, "Recording close on drop failed");
        }
    }
}

/// Sink writing every source's stream, index-aligned with the FrameSet
pub struct RecordingSink {
    writers: Vec<Box<dyn VideoWriter>>,
    finalized: bool,
}

impl RecordingSink {
    /// Open one MJPEG writer per source label in `dir`
    pub fn open(
        dir: &Path,
        labels: &[String],
        width: u32,
        height: u32,
        frame_rate: u32,
        quality: u8,
    ) -> Result<Self, SinkError> {
        let writers = labels
            .iter()
            .map(|label| {
                let path = dir.join(format!("{}.mjpeg", label));
                MjpegWriter::open(path, width, height, frame_rate, quality)
                    .map(|w| Box::new(w) as Box<dyn VideoWriter>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            writers,
            finalized: false,
        })
    }

    /// Assemble a sink from pre-built writers (fault injection, alternative
    /// recording collaborators)
    pub fn from_writers(writers: Vec<Box<dyn VideoWriter>>) -> Self {
        Self {
            writers,
            finalized: false,
        }
    }
}

impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn accept(&mut self, set: &ConvertedSet) -> Result<(), SinkError> {
        if self.finalized {
            return Err(SinkError::Finalized {
                sink: self.name().to_string(),
            });
        }
        if set.len() != self.writers.len() {
            return Err(SinkError::WriteFailed {
                sink: self.name().to_string(),
                reason: format!(
                    "frame set has {} members, {} writers open",
                    set.len(),
                    self.writers.len()
                ),
            });
        }
        // Each frame is appended exactly once per cycle
        for (writer, frame) in self.writers.iter_mut().zip(&set.frames) {
            writer.append(frame)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        let mut first_error = None;
        for writer in &mut self.writers {
            if let Err(err) = writer.close() {
                warn!(error = %err, "Writer close failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{PixelFormat, SourceId};

    fn converted(label: &str, index: usize) -> ConvertedFrame {
        ConvertedFrame {
            source: SourceId::new(index, label),
            width: 8,
            height: 4,
            format: PixelFormat::Bgr8,
            data: vec![60u8; 8 * 4 * 3].into(),
            sequence: 1,
            timestamp: chrono::Local::now(),
        }
    }

    fn set(labels: &[&str]) -> ConvertedSet {
        ConvertedSet {
            cycle: 0,
            frames: labels
                .iter()
                .enumerate()
                .map(|(i, l)| converted(l, i))
                .collect(),
        }
    }

    #[test]
    fn writes_stream_and_sidecar_per_source() {
        let dir = tempfile::tempdir().unwrap();
        let labels = vec!["A".to_string(), "B".to_string()];
        let mut sink = RecordingSink::open(dir.path(), &labels, 8, 4, 20, 90).unwrap();

        sink.accept(&set(&["A", "B"])).unwrap();
        sink.accept(&set(&["A", "B"])).unwrap();
        sink.finalize().unwrap();

        for label in ["A", "B"] {
            let stream = dir.path().join(format!("{}.mjpeg", label));
            assert!(std::fs::metadata(&stream).unwrap().len() > 0);

            let sidecar = std::fs::read(dir.path().join(format!("{}.json", label))).unwrap();
            let meta: RecordingMeta = serde_json::from_slice(&sidecar).unwrap();
            assert_eq!(meta.frames_written, 2);
            assert_eq!(meta.frame_rate, 20);
            assert_eq!(meta.quality, 90);
            assert_eq!((meta.width, meta.height), (8, 4));
        }
    }

    #[test]
    fn mjpeg_stream_starts_with_jpeg_magic() {
        let dir = tempfile::tempdir().unwrap();
        let labels = vec!["A".to_string()];
        let mut sink = RecordingSink::open(dir.path(), &labels, 8, 4, 20, 90).unwrap();
        sink.accept(&set(&["A"])).unwrap();
        sink.finalize().unwrap();

        let bytes = std::fs::read(dir.path().join("A.mjpeg")).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn finalize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let labels = vec!["A".to_string()];
        let mut sink = RecordingSink::open(dir.path(), &labels, 8, 4, 20, 90).unwrap();
        sink.accept(&set(&["A"])).unwrap();
        sink.finalize().unwrap();
        sink.finalize().unwrap();
        assert!(sink.accept(&set(&["A"])).is_err());
    }

    #[test]
    fn member_count_mismatch_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let labels = vec!["A".to_string(), "B".to_string()];
        let mut sink = RecordingSink::open(dir.path(), &labels, 8, 4, 20, 90).unwrap();
        assert!(matches!(
            sink.accept(&set(&["A"])),
            Err(SinkError::WriteFailed { .. })
        ));
    }

    struct FailingWriter {
        path: PathBuf,
        fail_after: u64,
        written: u64,
    }

    impl VideoWriter for FailingWriter {
        fn append(&mut self, _frame: &ConvertedFrame) -> Result<(), SinkError> {
            if self.written >= self.fail_after {
                return Err(SinkError::WriteFailed {
                    sink: "recording".to_string(),
                    reason: "no space left on device".to_string(),
                });
            }
            self.written += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<(), SinkError> {
            Ok(())
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    #[test]
    fn disk_full_surfaces_as_write_error() {
        let mut sink = RecordingSink::from_writers(vec![Box::new(FailingWriter {
            path: PathBuf::from("A.mjpeg"),
            fail_after: 1,
            written: 0,
        })]);
        sink.accept(&set(&["A"])).unwrap();
        assert!(matches!(
            sink.accept(&set(&["A"])),
            Err(SinkError::WriteFailed { .. })
        ));
    }
}
