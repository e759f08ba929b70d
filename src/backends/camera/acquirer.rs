// SPDX-License-Identifier: GPL-3.0-only

//! Lock-step acquisition across N sources
//!
//! `next(timeout)` asks every source for one frame belonging to the current
//! cycle and assembles a [`FrameSet`], strictly all-or-nothing: any failed
//! retrieval fails the whole cycle, naming every failing source, and no
//! partial set is ever produced. The cycle index advances on failure too so
//! later cycles stay aligned.
//!
//! Retrieval order across sources is the configuration order. Sequential
//! mode polls them one after another (cycle latency is the sum of the
//! per-source latencies); concurrent mode, the default, issues all
//! retrievals on scoped threads and joins before assembly (latency is their
//! maximum). Pools are thread-safe, so the concurrent variant needs no
//! extra state.

use super::source::SourceHandle;
use super::types::FrameSet;
use crate::errors::{CaptureError, CycleFailure};
use std::time::Duration;
use tracing::debug;

/// How the per-cycle retrievals are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    /// One retrieve() per source, in configuration order
    Sequential,
    /// All retrieves in parallel, joined before assembly
    #[default]
    Concurrent,
}

pub struct SynchronizedAcquirer {
    sources: Vec<SourceHandle>,
    mode: RetrievalMode,
    cycle: u64,
}

impl SynchronizedAcquirer {
    pub fn new(sources: Vec<SourceHandle>, mode: RetrievalMode) -> Self {
        assert!(!sources.is_empty(), "acquirer needs at least one source");
        Self {
            sources,
            mode,
            cycle: 0,
        }
    }

    pub fn sources(&self) -> &[SourceHandle] {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut [SourceHandle] {
        &mut self.sources
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Cycle index the next call to [`next`](Self::next) will use
    pub fn current_cycle(&self) -> u64 {
        self.cycle
    }

    /// Start acquisition on every source, in configuration order
    pub fn start_all(&mut self) -> Result<(), CaptureError> {
        for source in &mut self.sources {
            source.start_acquisition()?;
        }
        Ok(())
    }

    /// Stop every source. Idempotent.
    pub fn stop_all(&mut self) {
        for source in &mut self.sources {
            source.stop_acquisition();
        }
    }

    /// Retrieve one synchronized frame set.
    ///
    /// Consumes one cycle index whether or not the cycle succeeds.
    pub fn next(&mut self, timeout: Duration) -> Result<FrameSet, CycleFailure> {
        let cycle = self.cycle;
        self.cycle += 1;

        let results: Vec<Result<_, CaptureError>> = match self.mode {
            RetrievalMode::Sequential => self
                .sources
                .iter()
                .map(|source| source.retrieve(timeout, cycle))
                .collect(),
            RetrievalMode::Concurrent => std::thread::scope(|scope| {
                let handles: Vec<_> = self
                    .sources
                    .iter()
                    .map(|source| {
                        let pool = std::sync::Arc::clone(source.pool_arc());
                        let label = source.id().label.clone();
                        scope.spawn(move || {
                            super::source::retrieve_from(&pool, &label, timeout, cycle)
                        })
                    })
                    .collect();
                // Join in configuration order so results stay positional
                handles
                    .into_iter()
                    .map(|handle| handle.join().expect("retrieval thread panicked"))
                    .collect()
            }),
        };

        let mut frames = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(frame) => frames.push(frame),
                Err(err) => failures.push(err),
            }
        }

        if failures.is_empty() {
            debug!(cycle, sources = frames.len(), "Cycle complete");
            Ok(FrameSet { cycle, frames })
        } else {
            Err(CycleFailure { cycle, failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::SyntheticBackend;
    use crate::backends::camera::types::{
        CaptureFormat, DeviceDescriptor, PixelFormat, SourceId,
    };
    use crate::backends::camera::CameraBackend;
    use crate::constants::source_label;

    fn format() -> CaptureFormat {
        CaptureFormat {
            width: 16,
            height: 8,
            pixel_format: PixelFormat::Rgb8,
            frame_rate: 500,
        }
    }

    fn acquirer(n: usize, mode: RetrievalMode, open: bool) -> SynchronizedAcquirer {
        let backend = SyntheticBackend::new(n);
        let descriptors = backend.enumerate();
        let sources = (0..n)
            .map(|i| {
                let mut source = SourceHandle::new(
                    SourceId::new(i, source_label(i)),
                    descriptors[i].clone(),
                    format(),
                    4,
                );
                if open {
                    source.open(&backend).unwrap();
                }
                source
            })
            .collect();
        SynchronizedAcquirer::new(sources, mode)
    }

    #[test]
    fn complete_cycles_in_both_modes() {
        for mode in [RetrievalMode::Sequential, RetrievalMode::Concurrent] {
            let mut acquirer = acquirer(3, mode, true);
            acquirer.start_all().unwrap();

            let set = acquirer.next(Duration::from_secs(2)).unwrap();
            assert_eq!(set.cycle, 0);
            assert_eq!(set.len(), 3);
            // Frames come back in configuration order
            for (i, frame) in set.frames.iter().enumerate() {
                assert_eq!(frame.source.index, i);
                assert_eq!(frame.source.label, source_label(i));
            }

            let set = acquirer.next(Duration::from_secs(2)).unwrap();
            assert_eq!(set.cycle, 1);
            acquirer.stop_all();
        }
    }

    #[test]
    fn single_source_works() {
        let mut acquirer = acquirer(1, RetrievalMode::Concurrent, true);
        acquirer.start_all().unwrap();
        let set = acquirer.next(Duration::from_secs(2)).unwrap();
        assert_eq!(set.len(), 1);
        acquirer.stop_all();
    }

    #[test]
    fn failed_cycle_names_sources_and_advances_cycle() {
        // Sources never started: every retrieval times out
        let mut acquirer = acquirer(2, RetrievalMode::Sequential, false);
        let err = acquirer.next(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.cycle, 0);
        assert_eq!(err.failures.len(), 2);
        assert!(matches!(
            &err.failures[0],
            CaptureError::AcquisitionTimeout { source, cycle: 0 } if source == "A"
        ));

        // The failed cycle consumed index 0
        let err = acquirer.next(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.cycle, 1);
    }

    #[test]
    fn no_partial_set_when_one_source_fails() {
        let mut acquirer = acquirer(3, RetrievalMode::Concurrent, true);
        acquirer.start_all().unwrap();
        // Stop one source mid-run; its pool drains and then times out
        acquirer.sources[1].stop_acquisition();
        // Drain anything still queued for source B
        while acquirer.sources[1].pool().len() > 0 {
            let _ = acquirer.sources[1].retrieve(Duration::from_millis(1), 0);
        }

        let err = acquirer.next(Duration::from_millis(200)).unwrap_err();
        let failing: Vec<_> = err
            .failures
            .iter()
            .filter_map(|f| f.source_label())
            .collect();
        assert!(failing.contains(&"B"));
        acquirer.stop_all();
    }
}
