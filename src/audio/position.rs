use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::models::StreamFormat;

/// Playback position in source frames, tagged with the generation of the
/// worker allowed to advance it.
///
/// The device callback advances the counter as it consumes samples, so the
/// value never runs ahead of what has actually been heard. Once the owning
/// generation is detached (pause, stop, item switch) late callbacks from the
/// retiring stream are ignored.
#[derive(Debug, Clone)]
pub struct PositionCounter {
    inner: Arc<Mutex<PositionCounterInner>>,
}

#[derive(Debug)]
struct PositionCounterInner {
    /// Generation allowed to advance; 0 when detached
    generation: u64,
    frames: u64,
    /// Sub-frame carry from rate-converted advances
    remainder: f64,
    format: Option<StreamFormat>,
}

impl PositionCounter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PositionCounterInner {
                generation: 0,
                frames: 0,
                remainder: 0.0,
                format: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PositionCounterInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hand the counter to `generation`, starting at `start_frame`
    pub fn attach(&self, generation: u64, start_frame: u64, format: StreamFormat) {
        let mut inner = self.lock();
        inner.generation = generation;
        inner.frames = start_frame;
        inner.remainder = 0.0;
        inner.format = Some(format);
    }

    /// Advance by `source_frames` if `generation` still owns the counter.
    /// Fractional frames carry over to the next call.
    pub fn advance(&self, generation: u64, source_frames: f64) -> bool {
        let mut inner = self.lock();
        if generation == 0 || inner.generation != generation || source_frames <= 0.0 {
            return false;
        }
        let total = inner.remainder + source_frames;
        let whole = total.floor();
        inner.frames = inner.frames.saturating_add(whole as u64);
        inner.remainder = total - whole;
        true
    }

    /// Stop accepting advances and return the frozen frame count
    pub fn detach(&self) -> u64 {
        let mut inner = self.lock();
        inner.generation = 0;
        inner.remainder = 0.0;
        inner.frames
    }

    /// Detach and zero the counter
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.generation = 0;
        inner.frames = 0;
        inner.remainder = 0.0;
        inner.format = None;
    }

    pub fn frames(&self) -> u64 {
        self.lock().frames
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn format(&self) -> Option<StreamFormat> {
        self.lock().format
    }

    /// Current position as wall-clock time at the source rate
    pub fn position(&self) -> Duration {
        let inner = self.lock();
        match inner.format {
            Some(format) => format.frames_to_duration(inner.frames),
            None => Duration::ZERO,
        }
    }
}

impl Default for PositionCounter {
    fn default() -> Self {
        Self::new()
    }
}
