// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants and defaults
//!
//! Defaults mirror the original multi-camera rig: four-slot latest-image
//! buffer pools, a 5 s retrieval timeout, half-resolution preview and
//! 20 fps / quality-90 recording.

use std::time::Duration;

/// Buffer-pool slots per source
pub const DEFAULT_POOL_CAPACITY: usize = 4;

/// Per-cycle retrieval timeout
pub const DEFAULT_RETRIEVE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default sensor resolution
pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1200;

/// Playback frame rate written into recordings
pub const DEFAULT_FRAME_RATE: u32 = 20;

/// JPEG quality for recorded frames (0-100)
pub const DEFAULT_QUALITY: u8 = 90;

/// Upper bound on how long one display pass may hold the cycle.
/// Past this the display sink starts dropping frames instead of queueing.
pub const DISPLAY_RENDER_BUDGET: Duration = Duration::from_millis(50);

/// Default number of synchronized sources
pub const DEFAULT_SOURCE_COUNT: usize = 3;

/// Key that requests an orderly shutdown from the preview window
pub const STOP_KEY: char = 'q';

/// Short label for a source position: "A".."Z", then "S26", "S27", ...
pub fn source_label(index: usize) -> String {
    if index < 26 {
        char::from(b'A' + index as u8).to_string()
    } else {
        format!("S{}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_labels_follow_configuration_order() {
        assert_eq!(source_label(0), "A");
        assert_eq!(source_label(2), "C");
        assert_eq!(source_label(25), "Z");
        assert_eq!(source_label(26), "S26");
    }
}
