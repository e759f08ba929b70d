// SPDX-License-Identifier: GPL-3.0-only

//! Synchronized multi-camera acquisition pipeline
//!
//! Captures from N sources in lock-step: each acquisition cycle produces
//! either one frame from every source or nothing at all. Complete cycles
//! are converted to a canonical pixel format and fanned out to sinks
//! (terminal display, per-source recordings).
//!
//! - [`backends::camera`]: device abstraction, per-source capture threads,
//!   latest-image buffer pools, the synchronized acquirer
//! - [`media`]: pixel format conversion to canonical BGR
//! - [`pipelines`]: the lifecycle controller and the sinks it drives

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;
