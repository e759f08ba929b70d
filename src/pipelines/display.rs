// SPDX-License-Identifier: GPL-3.0-only

//! Live preview sink
//!
//! Shows each source's frame at half resolution through a [`FrameRenderer`]
//! capability. The renderer owns a bounded render budget: when it reports
//! busy the sink drops the current frame instead of queueing, so the
//! preview always shows the newest cycle and never stalls acquisition.
//! Key polling goes through the same capability; the stop key raises the
//! pipeline's shared stop flag.

use crate::constants::STOP_KEY;
use crate::errors::{RenderError, SinkError};
use crate::media::conversions::downscale_half_bgr;
use crate::media::{ConvertedFrame, ConvertedSet};
use crate::pipelines::Sink;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

pub mod terminal;

/// Render collaborator: a window system, terminal, or test double
pub trait FrameRenderer {
    /// Show one frame in the window identified by `label`.
    ///
    /// Returns [`RenderError::Busy`] when the render budget is exhausted;
    /// the caller drops the frame.
    fn show(&mut self, label: &str, frame: &ConvertedFrame) -> Result<(), RenderError>;

    /// Non-blocking key poll
    fn poll_key(&mut self) -> Result<Option<char>, RenderError>;

    /// Tear the display down. Idempotent.
    fn close(&mut self);
}

pub struct DisplaySink {
    renderer: Box<dyn FrameRenderer>,
    stop: Arc<AtomicBool>,
    finalized: bool,
    frames_shown: u64,
    frames_dropped: u64,
}

impl DisplaySink {
    pub fn new(renderer: Box<dyn FrameRenderer>, stop: Arc<AtomicBool>) -> Self {
        Self {
            renderer,
            stop,
            finalized: false,
            frames_shown: 0,
            frames_dropped: 0,
        }
    }

    /// Frames dropped because the renderer was busy
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }
}

impl Sink for DisplaySink {
    fn name(&self) -> &str {
        "display"
    }

    fn accept(&mut self, set: &ConvertedSet) -> Result<(), SinkError> {
        if self.finalized {
            return Err(SinkError::Finalized {
                sink: self.name().to_string(),
            });
        }

        for frame in &set.frames {
            let (data, width, height) =
                downscale_half_bgr(&frame.data, frame.width, frame.height);
            let preview = ConvertedFrame {
                source: frame.source.clone(),
                width,
                height,
                format: frame.format,
                data: data.into(),
                sequence: frame.sequence,
                timestamp: frame.timestamp,
            };
            match self.renderer.show(&frame.source.label, &preview) {
                Ok(()) => self.frames_shown += 1,
                Err(RenderError::Busy) => {
                    // Newest-cycle policy: drop, never queue
                    self.frames_dropped += 1;
                    debug!(
                        source = %frame.source,
                        cycle = set.cycle,
                        "Display busy, dropping frame"
                    );
                }
                Err(RenderError::Failed(reason)) => {
                    return Err(SinkError::Backend {
                        sink: self.name().to_string(),
                        reason,
                    });
                }
            }
        }

        match self.renderer.poll_key() {
            Ok(Some(key)) if key == STOP_KEY => {
                info!("Stop key pressed, requesting shutdown");
                self.stop.store(true, Ordering::SeqCst);
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Key poll failed"),
        }

        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.renderer.close();
        info!(
            shown = self.frames_shown,
            dropped = self.frames_dropped,
            "Display sink finalized"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{PixelFormat, SourceId};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RendererLog {
        shown: Vec<(String, u32, u32)>,
        busy_for: Vec<String>,
        keys: Vec<char>,
        closed: u32,
    }

    struct FakeRenderer {
        log: Rc<RefCell<RendererLog>>,
    }

    impl FrameRenderer for FakeRenderer {
        fn show(&mut self, label: &str, frame: &ConvertedFrame) -> Result<(), RenderError> {
            let mut log = self.log.borrow_mut();
            if log.busy_for.iter().any(|l| l == label) {
                return Err(RenderError::Busy);
            }
            log.shown.push((label.to_string(), frame.width, frame.height));
            Ok(())
        }

        fn poll_key(&mut self) -> Result<Option<char>, RenderError> {
            Ok(self.log.borrow_mut().keys.pop())
        }

        fn close(&mut self) {
            self.log.borrow_mut().closed += 1;
        }
    }

    fn set(cycle: u64, labels: &[&str]) -> ConvertedSet {
        ConvertedSet {
            cycle,
            frames: labels
                .iter()
                .enumerate()
                .map(|(i, label)| ConvertedFrame {
                    source: SourceId::new(i, *label),
                    width: 8,
                    height: 4,
                    format: PixelFormat::Bgr8,
                    data: vec![0u8; 8 * 4 * 3].into(),
                    sequence: cycle + 1,
                    timestamp: chrono::Local::now(),
                })
                .collect(),
        }
    }

    fn sink(log: Rc<RefCell<RendererLog>>) -> (DisplaySink, Arc<AtomicBool>) {
        let stop = Arc::new(AtomicBool::new(false));
        (
            DisplaySink::new(Box::new(FakeRenderer { log }), Arc::clone(&stop)),
            stop,
        )
    }

    #[test]
    fn frames_are_shown_at_half_resolution() {
        let log = Rc::new(RefCell::new(RendererLog::default()));
        let (mut sink, _stop) = sink(Rc::clone(&log));
        sink.accept(&set(0, &["A", "B"])).unwrap();
        let log = log.borrow();
        assert_eq!(log.shown.len(), 2);
        assert_eq!(log.shown[0], ("A".to_string(), 4, 2));
    }

    #[test]
    fn busy_renderer_drops_frame_without_error() {
        let log = Rc::new(RefCell::new(RendererLog::default()));
        log.borrow_mut().busy_for.push("A".to_string());
        let (mut sink, _stop) = sink(Rc::clone(&log));
        sink.accept(&set(0, &["A", "B"])).unwrap();
        assert_eq!(sink.frames_dropped(), 1);
        assert_eq!(log.borrow().shown.len(), 1);
    }

    #[test]
    fn stop_key_raises_stop_flag() {
        let log = Rc::new(RefCell::new(RendererLog::default()));
        log.borrow_mut().keys.push('q');
        let (mut sink, stop) = sink(Rc::clone(&log));
        sink.accept(&set(0, &["A"])).unwrap();
        assert!(stop.load(Ordering::SeqCst));
    }

    #[test]
    fn other_keys_are_ignored() {
        let log = Rc::new(RefCell::new(RendererLog::default()));
        log.borrow_mut().keys.push('x');
        let (mut sink, stop) = sink(Rc::clone(&log));
        sink.accept(&set(0, &["A"])).unwrap();
        assert!(!stop.load(Ordering::SeqCst));
    }

    #[test]
    fn finalize_closes_renderer_once() {
        let log = Rc::new(RefCell::new(RendererLog::default()));
        let (mut sink, _stop) = sink(Rc::clone(&log));
        sink.finalize().unwrap();
        sink.finalize().unwrap();
        assert_eq!(log.borrow().closed, 1);
        assert!(sink.accept(&set(0, &["A"])).is_err());
    }
}
