//! Bounded sample queue between the playback worker and the device callback.
//!
//! The worker pushes interleaved samples and blocks while the queue is full;
//! the callback pops without blocking and pads with silence on underrun.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Slice used when waiting so the stop flag is observed promptly
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// How a blocking push ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Every sample was queued
    Complete,
    /// The stop flag was raised first
    Interrupted,
    /// The queue was closed
    Closed,
    /// No space was freed for the whole stall timeout
    Stalled,
}

pub struct SampleFifo {
    channels: usize,
    capacity: usize,
    inner: Mutex<FifoInner>,
    cv: Condvar,
}

struct FifoInner {
    queue: VecDeque<f32>,
    closed: bool,
}

impl SampleFifo {
    /// `capacity` is counted in samples, rounded up to whole frames
    pub fn new(channels: usize, capacity: usize) -> Self {
        let channels = channels.max(1);
        let frames = (capacity + channels - 1) / channels;
        let capacity = frames.max(1) * channels;
        Self {
            channels,
            capacity,
            inner: Mutex::new(FifoInner {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Queue sized to hold `duration` of audio at `rate_hz`
    pub fn for_duration(rate_hz: u32, channels: usize, duration: Duration) -> Self {
        let frames = (rate_hz as f64 * duration.as_secs_f64()).ceil() as usize;
        Self::new(channels, frames.max(1) * channels.max(1))
    }

    fn lock(&self) -> MutexGuard<'_, FifoInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Reject further pushes and wake all waiters. Idempotent.
    pub fn close(&self) {
        self.lock().closed = true;
        self.cv.notify_all();
    }

    pub fn clear(&self) {
        self.lock().queue.clear();
        self.cv.notify_all();
    }

    /// Push all of `samples`, waiting for space. Gives up when `stop` is
    /// raised, the queue closes, or `stall_timeout` passes with no space freed.
    pub fn push_blocking(&self, samples: &[f32], stop: &AtomicBool, stall_timeout: Duration) -> PushOutcome {
        let mut offset = 0;
        let mut last_progress = Instant::now();
        let mut inner = self.lock();

        while offset < samples.len() {
            if inner.closed {
                return PushOutcome::Closed;
            }
            if stop.load(Ordering::Acquire) {
                return PushOutcome::Interrupted;
            }

            let space = self.capacity.saturating_sub(inner.queue.len());
            let remaining = samples.len() - offset;
            let take = if remaining < self.channels {
                remaining.min(space)
            } else {
                (space.min(remaining) / self.channels) * self.channels
            };
            if take > 0 {
                inner.queue.extend(&samples[offset..offset + take]);
                offset += take;
                last_progress = Instant::now();
                continue;
            }

            if last_progress.elapsed() >= stall_timeout {
                return PushOutcome::Stalled;
            }
            inner = match self.cv.wait_timeout(inner, WAIT_SLICE) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }

        PushOutcome::Complete
    }

    /// Pop up to `out.len()` samples without blocking; returns how many were written
    pub fn pop_into(&self, out: &mut [f32]) -> usize {
        let mut inner = self.lock();
        let n = out.len().min(inner.queue.len());
        for (slot, sample) in out.iter_mut().zip(inner.queue.drain(..n)) {
            *slot = sample;
        }
        drop(inner);
        if n > 0 {
            self.cv.notify_all();
        }
        n
    }

    /// Wait until the consumer has emptied the queue. Returns false if
    /// interrupted by `stop`, closed, or no progress was made for `stall_timeout`.
    pub fn wait_drained(&self, stop: &AtomicBool, stall_timeout: Duration) -> bool {
        let mut inner = self.lock();
        let mut last_len = inner.queue.len();
        let mut last_progress = Instant::now();

        while !inner.queue.is_empty() {
            if inner.closed || stop.load(Ordering::Acquire) {
                return false;
            }
            if inner.queue.len() < last_len {
                last_len = inner.queue.len();
                last_progress = Instant::now();
            } else if last_progress.elapsed() >= stall_timeout {
                return false;
            }
            inner = match self.cv.wait_timeout(inner, WAIT_SLICE) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}
