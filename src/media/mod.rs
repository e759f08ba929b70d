// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion

pub mod conversions;
pub mod converter;

pub use converter::{ConvertedFrame, ConvertedSet, FrameConverter};
