// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline lifecycle and the acquisition loop
//!
//! The controller walks the pipeline through Idle -> Running -> Draining ->
//! Stopped, driving the acquirer each iteration and fanning complete cycles
//! out to the sinks. Stop requests are observed between cycles, never
//! mid-cycle, and draining runs exactly once no matter how many paths
//! request it.

use crate::backends::camera::{CameraBackend, SynchronizedAcquirer};
use crate::errors::{PipelineError, PipelineResult};
use crate::media::FrameConverter;
use crate::pipelines::Sink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Lifecycle states, in order. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// A sink plus its enablement flag. Write failures disable a sink for the
/// remainder of the run without touching the others.
struct SinkSlot {
    sink: Box<dyn Sink>,
    enabled: bool,
}

pub struct PipelineController {
    acquirer: SynchronizedAcquirer,
    converter: FrameConverter,
    sinks: Vec<SinkSlot>,
    stop: Arc<AtomicBool>,
    retrieve_timeout: Duration,
    frame_limit: Option<u64>,
    state: PipelineState,
    cycles_delivered: u64,
}

impl PipelineController {
    pub fn new(
        acquirer: SynchronizedAcquirer,
        converter: FrameConverter,
        sinks: Vec<Box<dyn Sink>>,
        stop: Arc<AtomicBool>,
        retrieve_timeout: Duration,
        frame_limit: Option<u64>,
    ) -> Self {
        Self {
            acquirer,
            converter,
            sinks: sinks
                .into_iter()
                .map(|sink| SinkSlot {
                    sink,
                    enabled: true,
                })
                .collect(),
            stop,
            retrieve_timeout,
            frame_limit,
            state: PipelineState::Idle,
            cycles_delivered: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Complete cycles delivered to the sinks so far
    pub fn cycles_delivered(&self) -> u64 {
        self.cycles_delivered
    }

    /// Shared stop flag; setting it ends the run at the next cycle boundary
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Open every source and start acquisition: Idle -> Running
    pub fn start(&mut self, backend: &dyn CameraBackend) -> PipelineResult<()> {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::Fatal(format!(
                "start() called in state {:?}",
                self.state
            )));
        }
        for source in self.acquirer.sources_mut() {
            source.open(backend)?;
        }
        self.acquirer.start_all()?;
        self.state = PipelineState::Running;
        info!(
            sources = self.acquirer.source_count(),
            sinks = self.sinks.len(),
            "Pipeline running"
        );
        Ok(())
    }

    /// Run until the stop flag is raised, the frame limit is reached, or a
    /// fatal error drains the pipeline
    pub fn run(&mut self) -> PipelineResult<()> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::Fatal(format!(
                "run() called in state {:?}",
                self.state
            )));
        }
        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!("Stop requested");
                break;
            }
            if let Some(limit) = self.frame_limit
                && self.cycles_delivered >= limit
            {
                info!(limit, "Frame limit reached");
                break;
            }

            match self.acquirer.next(self.retrieve_timeout) {
                Ok(set) => {
                    let converted = match self.converter.convert_set(&set) {
                        Ok(converted) => converted,
                        Err(err) => {
                            // A source we cannot convert can never be shown
                            // or recorded; the run cannot continue.
                            error!(cycle = set.cycle, error = %err, "Conversion failed");
                            self.drain();
                            return Err(PipelineError::Convert(err));
                        }
                    };
                    self.fan_out(&converted);
                    self.cycles_delivered += 1;
                }
                Err(failure) if failure.is_fatal() => {
                    error!(error = %failure, "Fatal acquisition failure");
                    self.drain();
                    return Err(PipelineError::Fatal(failure.to_string()));
                }
                Err(failure) => {
                    // The cycle index is already consumed; carry on with
                    // the next one.
                    warn!(error = %failure, "Cycle skipped");
                }
            }
        }
        self.drain();
        Ok(())
    }

    fn fan_out(&mut self, set: &crate::media::ConvertedSet) {
        for slot in self.sinks.iter_mut().filter(|s| s.enabled) {
            if let Err(err) = slot.sink.accept(set) {
                warn!(sink = slot.sink.name(), error = %err, "Sink disabled");
                slot.enabled = false;
            }
        }
    }

    /// Running -> Draining -> Stopped: stop the sources, finalize every
    /// sink once. Safe to call from any state; repeats are no-ops.
    fn drain(&mut self) {
        if matches!(self.state, PipelineState::Draining | PipelineState::Stopped) {
            return;
        }
        self.state = PipelineState::Draining;
        self.acquirer.stop_all();
        for slot in &mut self.sinks {
            if let Err(err) = slot.sink.finalize() {
                warn!(sink = slot.sink.name(), error = %err, "Finalize failed");
            }
        }
        self.state = PipelineState::Stopped;
        info!(cycles = self.cycles_delivered, "Pipeline stopped");
    }

    /// Request and complete a stop. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.drain();
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::SyntheticBackend;
    use crate::backends::camera::types::{CaptureFormat, PixelFormat, SourceId};
    use crate::backends::camera::{RetrievalMode, SourceHandle};
    use crate::constants::source_label;
    use crate::errors::SinkError;
    use crate::media::ConvertedSet;
    use std::sync::Mutex;

    fn format() -> CaptureFormat {
        CaptureFormat {
            width: 16,
            height: 8,
            pixel_format: PixelFormat::Rgb8,
            frame_rate: 500,
        }
    }

    fn acquirer(n: usize, backend: &SyntheticBackend) -> SynchronizedAcquirer {
        let descriptors = backend.enumerate();
        let sources = (0..n)
            .map(|i| {
                SourceHandle::new(
                    SourceId::new(i, source_label(i)),
                    descriptors[i].clone(),
                    format(),
                    4,
                )
            })
            .collect();
        SynchronizedAcquirer::new(sources, RetrievalMode::Concurrent)
    }

    #[derive(Default)]
    struct Counts {
        accepted: u64,
        finalized: u64,
    }

    struct CountingSink {
        counts: Arc<Mutex<Counts>>,
        fail_accept_after: Option<u64>,
    }

    impl Sink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        fn accept(&mut self, _set: &ConvertedSet) -> Result<(), SinkError> {
            let mut counts = self.counts.lock().unwrap();
            if let Some(limit) = self.fail_accept_after
                && counts.accepted >= limit
            {
                return Err(SinkError::WriteFailed {
                    sink: "counting".to_string(),
                    reason: "no space left on device".to_string(),
                });
            }
            counts.accepted += 1;
            Ok(())
        }

        fn finalize(&mut self) -> Result<(), SinkError> {
            self.counts.lock().unwrap().finalized += 1;
            Ok(())
        }
    }

    fn counting_sink(fail_accept_after: Option<u64>) -> (Box<dyn Sink>, Arc<Mutex<Counts>>) {
        let counts = Arc::new(Mutex::new(Counts::default()));
        (
            Box::new(CountingSink {
                counts: Arc::clone(&counts),
                fail_accept_after,
            }),
            counts,
        )
    }

    #[test]
    fn frame_limit_ends_the_run_and_finalizes_once() {
        let backend = SyntheticBackend::new(2);
        let (sink, counts) = counting_sink(None);
        let mut controller = PipelineController::new(
            acquirer(2, &backend),
            FrameConverter::default(),
            vec![sink],
            Arc::new(AtomicBool::new(false)),
            Duration::from_secs(2),
            Some(3),
        );
        controller.start(&backend).unwrap();
        controller.run().unwrap();

        assert_eq!(controller.state(), PipelineState::Stopped);
        assert_eq!(controller.cycles_delivered(), 3);
        let counts = counts.lock().unwrap();
        assert_eq!(counts.accepted, 3);
        assert_eq!(counts.finalized, 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let backend = SyntheticBackend::new(1);
        let (sink, counts) = counting_sink(None);
        let mut controller = PipelineController::new(
            acquirer(1, &backend),
            FrameConverter::default(),
            vec![sink],
            Arc::new(AtomicBool::new(false)),
            Duration::from_secs(2),
            Some(1),
        );
        controller.start(&backend).unwrap();
        controller.run().unwrap();
        controller.stop();
        controller.stop();
        assert_eq!(counts.lock().unwrap().finalized, 1);
    }

    #[test]
    fn failing_sink_is_disabled_others_keep_running() {
        let backend = SyntheticBackend::new(1);
        let (bad, bad_counts) = counting_sink(Some(1));
        let (good, good_counts) = counting_sink(None);
        let mut controller = PipelineController::new(
            acquirer(1, &backend),
            FrameConverter::default(),
            vec![bad, good],
            Arc::new(AtomicBool::new(false)),
            Duration::from_secs(2),
            Some(4),
        );
        controller.start(&backend).unwrap();
        controller.run().unwrap();

        assert_eq!(bad_counts.lock().unwrap().accepted, 1);
        assert_eq!(good_counts.lock().unwrap().accepted, 4);
        // Disabled sinks are still finalized during draining
        assert_eq!(bad_counts.lock().unwrap().finalized, 1);
        assert_eq!(good_counts.lock().unwrap().finalized, 1);
    }

    #[test]
    fn out_of_order_lifecycle_calls_are_errors_not_panics() {
        let backend = SyntheticBackend::new(1);
        let (sink, _) = counting_sink(None);
        let mut controller = PipelineController::new(
            acquirer(1, &backend),
            FrameConverter::default(),
            vec![sink],
            Arc::new(AtomicBool::new(false)),
            Duration::from_secs(2),
            Some(1),
        );

        // run() before start()
        assert!(matches!(controller.run(), Err(PipelineError::Fatal(_))));

        controller.start(&backend).unwrap();
        // start() twice
        assert!(controller.start(&backend).is_err());

        controller.run().unwrap();
        // run() after the pipeline stopped
        assert!(controller.run().is_err());
    }

    #[test]
    fn raised_stop_flag_ends_the_run() {
        let backend = SyntheticBackend::new(1);
        let (sink, _) = counting_sink(None);
        let stop = Arc::new(AtomicBool::new(true));
        let mut controller = PipelineController::new(
            acquirer(1, &backend),
            FrameConverter::default(),
            vec![sink],
            Arc::clone(&stop),
            Duration::from_secs(2),
            None,
        );
        controller.start(&backend).unwrap();
        controller.run().unwrap();
        assert_eq!(controller.state(), PipelineState::Stopped);
        assert_eq!(controller.cycles_delivered(), 0);
    }
}
