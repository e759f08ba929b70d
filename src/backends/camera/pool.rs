// SPDX-License-Identifier: GPL-3.0-only

//! Bounded latest-image frame pool
//!
//! Each source owns one pool. The capture thread pushes grab results in;
//! the acquisition loop pops them out with a deadline. When the pool is
//! saturated the oldest unconsumed frame is dropped so the device is never
//! blocked: freshness wins over completeness.

use super::types::CameraFrame;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::trace;

struct PoolState {
    queue: VecDeque<CameraFrame>,
    dropped: u64,
    closed: bool,
}

/// Bounded queue with latest-image overflow policy.
///
/// Thread-safe: the capture thread and the acquisition loop share it
/// through an `Arc`.
pub struct FramePool {
    state: Mutex<PoolState>,
    available: Condvar,
    capacity: usize,
}

impl FramePool {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be at least 1");
        Self {
            state: Mutex::new(PoolState {
                queue: VecDeque::with_capacity(capacity),
                dropped: 0,
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Push a grab result. Drops the oldest queued frame when full.
    ///
    /// Pushes into a closed pool are discarded; the capture thread may race
    /// the stop signal by one frame and that frame is simply dropped.
    pub fn push(&self, frame: CameraFrame) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        if state.queue.len() == self.capacity {
            state.queue.pop_front();
            state.dropped += 1;
            trace!(
                source = %frame.source,
                dropped = state.dropped,
                "Pool saturated, dropped oldest frame"
            );
        }
        state.queue.push_back(frame);
        self.available.notify_one();
    }

    /// Pop the oldest queued frame, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout or when the pool has been closed and drained.
    pub fn pop(&self, timeout: Duration) -> Option<CameraFrame> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(frame) = state.queue.pop_front() {
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (next, wait) = self.available.wait_timeout(state, remaining).unwrap();
            state = next;
            if wait.timed_out() && state.queue.is_empty() {
                return None;
            }
        }
    }

    /// Close the pool and wake any blocked `pop`.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.available.notify_all();
    }

    /// Frames currently queued (never exceeds capacity)
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames discarded under the latest-image policy
    pub fn dropped_frames(&self) -> u64 {
        self.state.lock().unwrap().dropped
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
