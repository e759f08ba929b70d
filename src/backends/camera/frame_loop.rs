// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for per-source capture loops
//!
//! Every acquiring source runs one of these: a dedicated thread that polls
//! its device and feeds the source's frame pool, standing in for the
//! driver-owned acquisition thread of real camera stacks. The control loop
//! never blocks on the device directly; it only ever waits on the pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Handle to a capture loop running in a separate thread
pub struct CaptureLoop {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoop {
    /// Spawn a capture loop.
    ///
    /// `loop_fn` performs one iteration (typically: grab one frame, push it
    /// into the pool) and is called until it returns [`LoopAction::Stop`] or
    /// [`CaptureLoop::stop`] is called.
    pub fn spawn<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::Builder::new()
            .name(format!("capture-{}", name))
            .spawn(move || {
                debug!(name = %thread_name, "Capture loop thread started");
                while !stop.load(Ordering::SeqCst) {
                    if loop_fn() == LoopAction::Stop {
                        debug!(name = %thread_name, "Loop requested stop");
                        break;
                    }
                }
                debug!(name = %thread_name, "Capture loop thread exiting");
            })
            .expect("spawn capture loop thread");

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Signal the loop to stop and wait for the thread to finish.
    /// Idempotent: subsequent calls are no-ops.
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::warn!(name = %self.name, "Capture loop thread panicked");
            } else {
                info!(name = %self.name, "Capture loop stopped");
            }
        }
    }

    /// Whether the loop thread is still attached (not yet joined)
    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
