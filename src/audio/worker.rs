//! The playback worker: one thread per engine that decodes the current
//! stream and feeds the output sink until the stream ends, it is told to
//! stop, or something fails.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, trace, warn};

use crate::audio::engine::{Continuation, EngineShared};
use crate::audio::output::{AudioSink, SinkContext};
use crate::audio::source::AudioStream;
use crate::error::{OutputError, PlaybackError, TimeoutAnomaly};
use crate::logging::OperationTimer;
use crate::models::Item;

/// The stream a worker is decoding. Shared with the engine only so a
/// worker that ignores cancellation can still have its handle released.
pub(crate) type StreamSlot = Arc<Mutex<Option<Box<dyn AudioStream>>>>;

pub(crate) fn lock_slot(slot: &StreamSlot) -> MutexGuard<'_, Option<Box<dyn AudioStream>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Engine-side handle on the live worker
pub(crate) struct WorkerHandle {
    generation: u64,
    stop: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
    thread: Option<JoinHandle<()>>,
    stream: StreamSlot,
}

impl WorkerHandle {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Raise the stop flag and wait up to `timeout` for the thread to exit.
    /// On timeout the thread is abandoned, its stream is force-closed when
    /// possible and the anomaly is returned for reporting.
    pub(crate) fn retire(mut self, shared: &EngineShared, timeout: Duration, operation: &'static str) -> Option<TimeoutAnomaly> {
        self.stop.store(true, Ordering::Release);
        let timer = OperationTimer::new(format!("retire worker {} ({})", self.generation, operation));

        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    if thread.join().is_err() {
                        warn!("Playback worker {} panicked", self.generation);
                    }
                }
                timer.finish_with_threshold(timeout);
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                let waited = timer.finish();
                // Dropping the JoinHandle detaches the thread; it still exits
                // at its next stop check.
                self.thread.take();
                if let Ok(mut slot) = self.stream.try_lock() {
                    shared.source.close(slot.take());
                    debug!("Force-closed stream of unresponsive worker {}", self.generation);
                }
                Some(TimeoutAnomaly {
                    operation,
                    generation: self.generation,
                    waited,
                })
            }
        }
    }
}

/// Spawn the worker for `generation`. On failure the stream is closed
/// before the error is returned.
pub(crate) fn spawn(
    shared: Arc<EngineShared>,
    generation: u64,
    item: Arc<Item>,
    stream: Box<dyn AudioStream>,
    start_frame: u64,
) -> io::Result<WorkerHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let slot: StreamSlot = Arc::new(Mutex::new(Some(stream)));
    let (done_tx, done_rx) = mpsc::channel();

    let worker = Worker {
        shared: shared.clone(),
        generation,
        stop: stop.clone(),
        slot: slot.clone(),
        item,
        skip_frames: start_frame,
    };

    shared.worker_started();
    let spawned = thread::Builder::new()
        .name(format!("playback-{}", generation))
        .spawn(move || {
            let _exit = ExitGuard {
                shared: worker.shared.clone(),
                slot: worker.slot.clone(),
                done: done_tx,
            };
            raise_priority();
            worker.run();
        });

    match spawned {
        Ok(thread) => Ok(WorkerHandle {
            generation,
            stop,
            done: done_rx,
            thread: Some(thread),
            stream: slot,
        }),
        Err(e) => {
            shared.worker_exited();
            shared.source.close(lock_slot(&slot).take());
            Err(e)
        }
    }
}

#[cfg(target_os = "macos")]
fn raise_priority() {
    unsafe {
        let thread = libc::pthread_self();
        let mut policy: libc::c_int = 0;
        let mut param: libc::sched_param = std::mem::zeroed();
        if libc::pthread_getschedparam(thread, &mut policy, &mut param) == 0 {
            param.sched_priority = libc::sched_get_priority_max(policy);
            let _ = libc::pthread_setschedparam(thread, policy, &param);
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn raise_priority() {}

/// Releases everything the worker owns on every exit path, panics included
struct ExitGuard {
    shared: Arc<EngineShared>,
    slot: StreamSlot,
    done: mpsc::Sender<()>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let stream = lock_slot(&self.slot).take();
        self.shared.source.close(stream);
        self.shared.worker_exited();
        let _ = self.done.send(());
    }
}

struct Worker {
    shared: Arc<EngineShared>,
    generation: u64,
    stop: Arc<AtomicBool>,
    slot: StreamSlot,
    item: Arc<Item>,
    /// Frames still to discard before rendering (resume)
    skip_frames: u64,
}

enum Step {
    Continue,
    Exit,
}

impl Worker {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn run(mut self) {
        debug!("Worker {} started on '{}'", self.generation, self.item.display_name());
        let mut sink: Option<Box<dyn AudioSink>> = None;

        loop {
            if self.stopped() {
                trace!("Worker {} observed stop", self.generation);
                break;
            }
            match self.step(&mut sink) {
                Step::Continue => {}
                Step::Exit => break,
            }
        }

        // Sink goes first so the device stops before the stream is released
        drop(sink);
        debug!("Worker {} exiting", self.generation);
    }

    fn step(&mut self, sink: &mut Option<Box<dyn AudioSink>>) -> Step {
        let decoded = {
            let mut slot = lock_slot(&self.slot);
            match slot.as_mut() {
                Some(stream) => stream.next_buffer(),
                // Force-closed by the engine
                None => return Step::Exit,
            }
        };

        match decoded {
            Ok(Some(mut buffer)) => {
                if self.skip_frames > 0 {
                    if buffer.frames as u64 <= self.skip_frames {
                        self.skip_frames -= buffer.frames as u64;
                        return Step::Continue;
                    }
                    buffer.discard_front(self.skip_frames as usize);
                    self.skip_frames = 0;
                }

                let format = buffer.format();
                if sink.as_ref().map(|s| s.source_format() != format).unwrap_or(true) {
                    sink.take();
                    let context = SinkContext {
                        position: self.shared.position.clone(),
                        generation: self.generation,
                        volume: self.shared.volume.clone(),
                    };
                    match self.shared.output.open_sink(format, context) {
                        Ok(opened) => *sink = Some(opened),
                        Err(e) => return self.fail(PlaybackError::Output(e)),
                    }
                }

                let Some(active) = sink.as_mut() else {
                    return Step::Exit;
                };
                match active.render(&buffer, &self.stop) {
                    Ok(true) => Step::Continue,
                    Ok(false) if self.stopped() => Step::Exit,
                    Ok(false) => self.fail(PlaybackError::Output(OutputError::StreamError(
                        "output closed while rendering".to_string(),
                    ))),
                    Err(e) => self.fail(PlaybackError::Output(e)),
                }
            }
            Ok(None) => {
                if let Some(active) = sink.as_mut() {
                    if !active.drain(&self.stop) && self.stopped() {
                        return Step::Exit;
                    }
                }
                match self.shared.worker_finished(self.generation, &self.stop, &self.slot) {
                    Continuation::Next(item) => {
                        self.item = item;
                        self.skip_frames = 0;
                        Step::Continue
                    }
                    Continuation::Exit => Step::Exit,
                }
            }
            Err(e) if self.skip_frames > 0 => {
                warn!(
                    "Skip to resume point failed for '{}' ({}); restarting from the beginning",
                    self.item.display_name(),
                    e
                );
                self.skip_frames = 0;
                match self.shared.restart_stream(self.generation, &self.stop, &self.item, &self.slot) {
                    Ok(()) => Step::Continue,
                    Err(e) => self.fail(PlaybackError::Resource(e)),
                }
            }
            Err(e) => self.fail(PlaybackError::Decode(e)),
        }
    }

    fn fail(&self, error: PlaybackError) -> Step {
        self.shared.worker_failed(self.generation, &self.stop, &self.item, error);
        Step::Exit
    }
}
