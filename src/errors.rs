// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture pipeline
//!
//! Error classes map directly onto the pipeline's recovery policy:
//! startup errors abort construction, per-cycle errors are logged and the
//! loop continues, sink write errors disable the offending sink, and
//! everything else drains the pipeline and surfaces at the top level.

use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Acquisition-side errors (devices and retrieval)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Enumeration found fewer devices than configured sources
    NoDevicesFound { found: usize, wanted: usize },
    /// The underlying device could not be attached or opened
    DeviceUnavailable { source: String, reason: String },
    /// No frame arrived within the retrieval timeout
    AcquisitionTimeout { source: String, cycle: u64 },
    /// The device reported a bad grab
    GrabFailed {
        source: String,
        cycle: u64,
        code: u32,
        description: String,
    },
}

impl CaptureError {
    /// Startup errors abort pipeline construction; retrieval errors are
    /// handled per cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::NoDevicesFound { .. } | CaptureError::DeviceUnavailable { .. }
        )
    }

    /// Source label the error is attributed to, if any
    pub fn source_label(&self) -> Option<&str> {
        match self {
            CaptureError::NoDevicesFound { .. } => None,
            CaptureError::DeviceUnavailable { source, .. }
            | CaptureError::AcquisitionTimeout { source, .. }
            | CaptureError::GrabFailed { source, .. } => Some(source),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoDevicesFound { found, wanted } => {
                write!(f, "No devices found: {} present, {} required", found, wanted)
            }
            CaptureError::DeviceUnavailable { source, reason } => {
                write!(f, "Device for source {} unavailable: {}", source, reason)
            }
            CaptureError::AcquisitionTimeout { source, cycle } => {
                write!(f, "Source {} timed out in cycle {}", source, cycle)
            }
            CaptureError::GrabFailed {
                source,
                cycle,
                code,
                description,
            } => write!(
                f,
                "Source {} grab failed in cycle {}: {:#x} {}",
                source, cycle, code, description
            ),
        }
    }
}

/// A failed acquisition cycle: no FrameSet was produced.
///
/// Carries every failing source so the failure is attributable even when
/// several sources miss the same cycle. The cycle index has already been
/// consumed; the next call starts the following cycle.
#[derive(Debug, Clone)]
pub struct CycleFailure {
    pub cycle: u64,
    pub failures: Vec<CaptureError>,
}

impl CycleFailure {
    /// A cycle is fatal when any of its failures is
    pub fn is_fatal(&self) -> bool {
        self.failures.iter().any(CaptureError::is_fatal)
    }
}

impl fmt::Display for CycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cycle {} failed:", self.cycle)?;
        for failure in &self.failures {
            write!(f, " [{}]", failure)?;
        }
        Ok(())
    }
}

/// Pixel conversion errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// No mapping from the source format to the canonical format
    UnsupportedFormat { source: String, format: String },
    /// Buffer size does not match the frame's declared geometry
    BadBuffer {
        source: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::UnsupportedFormat { source, format } => {
                write!(f, "Source {}: no conversion from {}", source, format)
            }
            ConvertError::BadBuffer {
                source,
                expected,
                actual,
            } => write!(
                f,
                "Source {}: buffer is {} bytes, expected {}",
                source, actual, expected
            ),
        }
    }
}

/// Sink-side errors
#[derive(Debug, Clone)]
pub enum SinkError {
    /// Persisting a frame failed (disk full, closed file, ...).
    /// The controller disables the sink for the remainder of the run.
    WriteFailed { sink: String, reason: String },
    /// The sink was asked to accept after finalize
    Finalized { sink: String },
    /// Renderer or other sink backend failure
    Backend { sink: String, reason: String },
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::WriteFailed { sink, reason } => {
                write!(f, "Sink {} write failed: {}", sink, reason)
            }
            SinkError::Finalized { sink } => {
                write!(f, "Sink {} already finalized", sink)
            }
            SinkError::Backend { sink, reason } => {
                write!(f, "Sink {} backend error: {}", sink, reason)
            }
        }
    }
}

/// Render collaborator errors, kept separate from `SinkError` because
/// `Busy` is not a failure: the display sink drops the frame and moves on.
#[derive(Debug, Clone)]
pub enum RenderError {
    /// The render budget is exhausted; drop the frame, never queue it
    Busy,
    /// The display subsystem failed
    Failed(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Busy => write!(f, "Renderer busy"),
            RenderError::Failed(reason) => write!(f, "Render failed: {}", reason),
        }
    }
}

/// Top-level pipeline error
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Fatal acquisition error (startup or escalated)
    Capture(CaptureError),
    /// Fatal conversion error (cannot safely display or record the source)
    Convert(ConvertError),
    /// Configuration load/parse error
    Config(String),
    /// Storage/filesystem error
    Storage(String),
    /// Unclassified fatal runtime failure
    Fatal(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Capture(e) => write!(f, "Capture error: {}", e),
            PipelineError::Convert(e) => write!(f, "Conversion error: {}", e),
            PipelineError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PipelineError::Storage(msg) => write!(f, "Storage error: {}", msg),
            PipelineError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for CycleFailure {}
impl std::error::Error for ConvertError {}
impl std::error::Error for SinkError {}
impl std::error::Error for RenderError {}

impl From<CaptureError> for PipelineError {
    fn from(err: CaptureError) -> Self {
        PipelineError::Capture(err)
    }
}

impl From<ConvertError> for PipelineError {
    fn from(err: ConvertError) -> Self {
        PipelineError::Convert(err)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_errors_are_fatal() {
        assert!(
            CaptureError::NoDevicesFound {
                found: 0,
                wanted: 3
            }
            .is_fatal()
        );
        assert!(
            !CaptureError::AcquisitionTimeout {
                source: "B".into(),
                cycle: 42
            }
            .is_fatal()
        );
    }

    #[test]
    fn cycle_failure_names_every_source() {
        let failure = CycleFailure {
            cycle: 7,
            failures: vec![
                CaptureError::AcquisitionTimeout {
                    source: "A".into(),
                    cycle: 7,
                },
                CaptureError::GrabFailed {
                    source: "C".into(),
                    cycle: 7,
                    code: 0xe1004,
                    description: "incomplete transfer".into(),
                },
            ],
        };
        let text = failure.to_string();
        assert!(text.contains("Source A"));
        assert!(text.contains("Source C"));
        assert!(!failure.is_fatal());
    }
}
