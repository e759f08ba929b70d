// SPDX-License-Identifier: GPL-3.0-only

//! Video recording sink

pub mod recorder;

pub use recorder::{MjpegWriter, RecordingSink, VideoWriter};
