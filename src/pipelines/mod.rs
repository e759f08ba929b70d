// SPDX-License-Identifier: GPL-3.0-only

//! Frame consumers and the acquisition control loop
//!
//! Everything downstream of conversion is a [`Sink`]: the controller fans
//! each converted cycle out to every registered sink in order, so display
//! and recording stay decoupled from each other. A sink that fails a write
//! is disabled for the rest of the run; the others keep receiving cycles.

pub mod controller;
pub mod display;
pub mod video;

pub use controller::{PipelineController, PipelineState};
pub use display::DisplaySink;
pub use video::recorder::RecordingSink;

use crate::errors::SinkError;
use crate::media::ConvertedSet;

/// A consumer of converted frame sets
pub trait Sink {
    /// Short name for logs ("display", "recording")
    fn name(&self) -> &str;

    /// Consume one cycle. Must not retain frame buffers past the call
    /// beyond the reference-counted data itself.
    fn accept(&mut self, set: &ConvertedSet) -> Result<(), SinkError>;

    /// Flush and release the sink's resources. Called exactly once by the
    /// controller during draining; implementations must tolerate (and
    /// no-op on) repeated calls.
    fn finalize(&mut self) -> Result<(), SinkError>;
}
