use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::audio::output::{AudioOutput, Volume};
use crate::audio::position::PositionCounter;
use crate::audio::source::AudioSource;
use crate::audio::worker::{self, lock_slot, StreamSlot, WorkerHandle};
use crate::error::{PlaybackError, ResourceError};
use crate::logging::AudioLogger;
use crate::models::{Item, PlaybackState, PlayerStatus};

/// Receives engine notifications.
///
/// Both methods run while the engine's control lock is held, either on the
/// thread that issued a command or on the playback worker. Implementations
/// may call the engine's read-only queries but must hand control commands
/// off to another thread.
pub trait PlaybackListener: Send + Sync {
    fn on_state_changed(&self, state: &PlaybackState, position: Duration);

    /// A session ended because of an error rather than by finishing
    fn on_error(&self, _item: &Item, _error: &PlaybackError) {}
}

/// Listener that ignores everything
#[derive(Debug, Default)]
pub struct NoopListener;

impl PlaybackListener for NoopListener {
    fn on_state_changed(&self, _state: &PlaybackState, _position: Duration) {}
}

/// Chooses what to play after an item finishes naturally
pub trait AutoAdvance: Send + Sync {
    fn next(&self, current: &Item) -> Option<Arc<Item>>;
}

/// Timing and initial values for a `PlaybackEngine`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Longest pause/stop/switch waits for the worker to exit
    pub control_timeout: Duration,
    /// Longest `shutdown` waits for the worker to exit
    pub shutdown_timeout: Duration,
    pub initial_volume: f32,
    pub loop_enabled: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            control_timeout: Duration::from_millis(100),
            shutdown_timeout: Duration::from_secs(1),
            initial_volume: 1.0,
            loop_enabled: false,
        }
    }
}

/// What a worker does after its stream ends
pub(crate) enum Continuation {
    /// Keep going with the stream now in the slot
    Next(Arc<Item>),
    Exit,
}

struct ControlState {
    state: PlaybackState,
    worker: Option<WorkerHandle>,
    shut_down: bool,
}

/// State shared between the engine handle and its worker
pub(crate) struct EngineShared {
    control: Mutex<ControlState>,
    /// Copy of `ControlState::state` for queries that must not wait on commands
    snapshot: RwLock<PlaybackState>,
    pub(crate) source: Arc<dyn AudioSource>,
    pub(crate) output: Arc<dyn AudioOutput>,
    listener: Arc<dyn PlaybackListener>,
    auto_advance: RwLock<Option<Arc<dyn AutoAdvance>>>,
    looping: AtomicBool,
    next_generation: AtomicU64,
    pub(crate) position: PositionCounter,
    pub(crate) volume: Volume,
    settings: EngineSettings,
    logger: AudioLogger,
    live_workers: AtomicUsize,
}

/// Single-item player backed by at most one playback worker.
///
/// Commands are serialized by an internal lock. Every worker carries a
/// generation number; completion and error signals from a worker that is
/// no longer current are dropped.
pub struct PlaybackEngine {
    shared: Arc<EngineShared>,
}

impl PlaybackEngine {
    pub fn new(
        source: Arc<dyn AudioSource>,
        output: Arc<dyn AudioOutput>,
        listener: Arc<dyn PlaybackListener>,
        settings: EngineSettings,
    ) -> Self {
        Self::with_logger(source, output, listener, settings, AudioLogger::new())
    }

    /// Like `new`, recording playback events into `logger`
    pub fn with_logger(
        source: Arc<dyn AudioSource>,
        output: Arc<dyn AudioOutput>,
        listener: Arc<dyn PlaybackListener>,
        settings: EngineSettings,
        logger: AudioLogger,
    ) -> Self {
        info!("Playback engine created (output: {})", output.name());
        let shared = EngineShared {
            control: Mutex::new(ControlState {
                state: PlaybackState::Idle,
                worker: None,
                shut_down: false,
            }),
            snapshot: RwLock::new(PlaybackState::Idle),
            source,
            output,
            listener,
            auto_advance: RwLock::new(None),
            looping: AtomicBool::new(settings.loop_enabled),
            next_generation: AtomicU64::new(1),
            position: PositionCounter::new(),
            volume: Volume::new(settings.initial_volume),
            settings,
            logger,
            live_workers: AtomicUsize::new(0),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Start `item` from the beginning, replacing whatever was playing
    pub fn play(&self, item: Arc<Item>) -> Result<(), PlaybackError> {
        if item.path().as_os_str().is_empty() {
            return Err(PlaybackError::InvalidItem {
                reason: format!("'{}' has no resource path", item.display_name()),
            });
        }

        let shared = &self.shared;
        let mut ctl = shared.lock_control();
        if ctl.shut_down {
            return Err(PlaybackError::ShutDown);
        }

        let previous = ctl.state.item().cloned();
        let operation = if ctl.state.is_playing() { "switch" } else { "reap" };
        shared.retire_worker(&mut ctl, shared.settings.control_timeout, operation);
        shared.position.reset();

        let stream = match shared.source.open(item.path()) {
            Ok(stream) => stream,
            Err(e) => {
                shared.logger.log_resource_error(e.path(), &e.to_string());
                if ctl.state != PlaybackState::Idle {
                    shared.publish(&mut ctl, PlaybackState::Idle);
                }
                return Err(e.into());
            }
        };

        if previous.as_ref().map(|p| p.as_ref() != item.as_ref()).unwrap_or(false) {
            shared.logger.log_track_changed(previous.as_ref().map(|p| p.display_name()), item.display_name());
        }

        shared.start_worker(&mut ctl, item, stream, 0)
    }

    /// Freeze the position and retire the worker. No-op unless playing.
    pub fn pause(&self) {
        let shared = &self.shared;
        let mut ctl = shared.lock_control();
        let item = match &ctl.state {
            PlaybackState::Playing(item) => item.clone(),
            _ => return,
        };

        let generation = ctl.worker.as_ref().map(|w| w.generation()).unwrap_or(0);
        let frame = shared.position.detach();
        shared.retire_worker(&mut ctl, shared.settings.control_timeout, "pause");

        shared.logger.log_playback_paused(generation, shared.position.position());
        shared.publish(&mut ctl, PlaybackState::Paused { item, frame });
    }

    /// Continue a paused item from its saved frame. No-op unless paused.
    pub fn resume(&self) {
        let shared = &self.shared;
        let mut ctl = shared.lock_control();
        let (item, frame) = match &ctl.state {
            PlaybackState::Paused { item, frame } => (item.clone(), *frame),
            _ => return,
        };
        shared.retire_worker(&mut ctl, shared.settings.control_timeout, "reap");

        let stream = match shared.source.reopen(item.path()) {
            Ok(stream) => stream,
            Err(e) => {
                shared.logger.log_resource_error(e.path(), &e.to_string());
                shared.position.reset();
                shared.publish(&mut ctl, PlaybackState::Idle);
                shared.listener.on_error(&item, &PlaybackError::Resource(e));
                return;
            }
        };

        if let Err(e) = shared.start_worker(&mut ctl, item.clone(), stream, frame) {
            shared.listener.on_error(&item, &e);
        }
    }

    /// Halt playback and reset the position. No-op when already inactive.
    pub fn stop(&self) {
        let shared = &self.shared;
        let mut ctl = shared.lock_control();
        if ctl.state.is_inactive() {
            shared.retire_worker(&mut ctl, shared.settings.control_timeout, "reap");
            return;
        }

        shared.retire_worker(&mut ctl, shared.settings.control_timeout, "stop");
        shared.position.reset();
        shared.logger.log_playback_stopped("stop requested");
        shared.publish(&mut ctl, PlaybackState::Stopped);
    }

    /// Stop for good, waiting up to the shutdown timeout for the worker.
    /// Later `play` calls fail with `PlaybackError::ShutDown`.
    pub fn shutdown(&self) {
        let shared = &self.shared;
        let mut ctl = shared.lock_control();
        if ctl.shut_down {
            return;
        }
        ctl.shut_down = true;

        shared.retire_worker(&mut ctl, shared.settings.shutdown_timeout, "shutdown");
        shared.position.reset();
        if ctl.state != PlaybackState::Stopped {
            shared.publish(&mut ctl, PlaybackState::Stopped);
        }
        shared.logger.log_playback_stopped("engine shutdown");

        match shared.source.open_handles() {
            Some(0) | None => info!("Playback engine shut down"),
            Some(open) => warn!("Playback engine shut down with {} stream handle(s) still open", open),
        }
    }

    pub fn set_loop(&self, enabled: bool) {
        self.shared.looping.store(enabled, Ordering::Release);
        debug!("Loop {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_looping(&self) -> bool {
        self.shared.looping.load(Ordering::Acquire)
    }

    /// Install or remove the collaborator consulted on natural completion
    pub fn set_auto_advance(&self, provider: Option<Arc<dyn AutoAdvance>>) {
        *self
            .shared
            .auto_advance
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = provider;
    }

    pub fn has_auto_advance(&self) -> bool {
        self.shared.auto_advance_provider().is_some()
    }

    /// Set the output gain (clamped to 0.0..=1.0); returns the stored value
    pub fn set_volume(&self, volume: f32) -> f32 {
        self.shared.volume.set(volume)
    }

    pub fn volume(&self) -> f32 {
        self.shared.volume.get()
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.snapshot()
    }

    pub fn is_playing(&self) -> bool {
        self.state().is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    pub fn current_item(&self) -> Option<Arc<Item>> {
        self.state().item().cloned()
    }

    /// Position of the current item; zero when idle or stopped
    pub fn current_position(&self) -> Duration {
        match self.state() {
            PlaybackState::Playing(_) | PlaybackState::Paused { .. } => self.shared.position.position(),
            PlaybackState::Idle | PlaybackState::Stopped => Duration::ZERO,
        }
    }

    pub fn status(&self) -> PlayerStatus {
        PlayerStatus::new(&self.state(), self.current_position(), self.volume())
            .with_modes(self.is_looping(), self.has_auto_advance())
    }

    /// Playback threads currently alive, including any abandoned after a timeout
    pub fn active_workers(&self) -> usize {
        self.shared.live_workers.load(Ordering::Acquire)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.shared.settings
    }

    pub fn logger(&self) -> &AudioLogger {
        &self.shared.logger
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl EngineShared {
    fn lock_control(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Worker-side lock. Gives up once `stop` is raised so a command that
    /// holds the lock while joining the worker cannot deadlock with it.
    fn lock_control_for_worker(&self, stop: &AtomicBool) -> Option<MutexGuard<'_, ControlState>> {
        loop {
            if stop.load(Ordering::Acquire) {
                return None;
            }
            match self.control.try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => thread::sleep(Duration::from_millis(1)),
            }
        }
    }

    /// Lock for a signal from worker `generation`; `None` when it is stale
    fn lock_for_generation(&self, generation: u64, stop: &AtomicBool) -> Option<MutexGuard<'_, ControlState>> {
        let ctl = self.lock_control_for_worker(stop)?;
        let current = ctl.worker.as_ref().map(|w| w.generation());
        if current != Some(generation) || stop.load(Ordering::Acquire) {
            debug!("Ignoring signal from stale worker {} (current {:?})", generation, current);
            return None;
        }
        Some(ctl)
    }

    fn snapshot(&self) -> PlaybackState {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn auto_advance_provider(&self) -> Option<Arc<dyn AutoAdvance>> {
        self.auto_advance
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn publish(&self, ctl: &mut ControlState, state: PlaybackState) {
        ctl.state = state.clone();
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state.clone();

        let position = match state {
            PlaybackState::Playing(_) | PlaybackState::Paused { .. } => self.position.position(),
            PlaybackState::Idle | PlaybackState::Stopped => Duration::ZERO,
        };
        debug!("State -> {}", state);
        self.listener.on_state_changed(&state, position);
    }

    fn retire_worker(&self, ctl: &mut ControlState, timeout: Duration, operation: &'static str) {
        if let Some(handle) = ctl.worker.take() {
            if let Some(anomaly) = handle.retire(self, timeout, operation) {
                self.logger.log_timeout_anomaly(&anomaly);
            }
        }
    }

    fn start_worker(
        self: &Arc<Self>,
        ctl: &mut ControlState,
        item: Arc<Item>,
        stream: Box<dyn crate::audio::source::AudioStream>,
        start_frame: u64,
    ) -> Result<(), PlaybackError> {
        let generation = self.next_generation.fetch_add(1, Ordering::AcqRel);
        let format = stream.format();
        self.position.attach(generation, start_frame, format);

        match worker::spawn(self.clone(), generation, item.clone(), stream, start_frame) {
            Ok(handle) => {
                ctl.worker = Some(handle);
                if start_frame == 0 {
                    self.logger
                        .log_playback_started(generation, item.display_name(), &format.format_description());
                } else {
                    self.logger.log_playback_resumed(generation, self.position.position());
                }
                self.publish(ctl, PlaybackState::Playing(item));
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn playback worker: {}", e);
                self.position.reset();
                self.publish(ctl, PlaybackState::Idle);
                Err(PlaybackError::WorkerSpawn(e))
            }
        }
    }

    pub(crate) fn worker_started(&self) {
        self.live_workers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn worker_exited(&self) {
        self.live_workers.fetch_sub(1, Ordering::AcqRel);
    }

    /// End of stream for worker `generation`: loop, advance or go idle.
    /// A replacement stream is placed in `slot` before `Next` is returned.
    pub(crate) fn worker_finished(&self, generation: u64, stop: &AtomicBool, slot: &StreamSlot) -> Continuation {
        let Some(mut ctl) = self.lock_for_generation(generation, stop) else {
            return Continuation::Exit;
        };
        let Some(finished) = ctl.state.item().cloned() else {
            return Continuation::Exit;
        };

        self.source.close(lock_slot(slot).take());
        let played = self.position.position();
        self.logger
            .log_playback_completed(generation, finished.display_name(), played);

        let looping = self.looping.load(Ordering::Acquire);
        let next = if looping {
            Some(finished.clone())
        } else {
            self.auto_advance_provider().and_then(|provider| provider.next(&finished))
        };

        let Some(next) = next else {
            self.position.reset();
            self.publish(&mut ctl, PlaybackState::Idle);
            return Continuation::Exit;
        };

        let opened = if looping {
            self.source.reopen(next.path())
        } else {
            self.source.open(next.path())
        };
        match opened {
            Ok(stream) => {
                self.position.attach(generation, 0, stream.format());
                *lock_slot(slot) = Some(stream);
                if !looping {
                    self.logger
                        .log_track_changed(Some(finished.display_name()), next.display_name());
                }
                self.publish(&mut ctl, PlaybackState::Playing(next.clone()));
                Continuation::Next(next)
            }
            Err(e) => {
                self.logger.log_resource_error(e.path(), &e.to_string());
                self.position.reset();
                self.publish(&mut ctl, PlaybackState::Idle);
                self.listener.on_error(&next, &PlaybackError::Resource(e));
                Continuation::Exit
            }
        }
    }

    /// Worker `generation` hit an error it cannot recover from
    pub(crate) fn worker_failed(&self, generation: u64, stop: &AtomicBool, item: &Item, error: PlaybackError) {
        let Some(mut ctl) = self.lock_for_generation(generation, stop) else {
            debug!("Dropping error from retired worker {}: {}", generation, error);
            return;
        };

        match &error {
            PlaybackError::Output(e) => self.logger.log_output_error(generation, &e.to_string()),
            other => self
                .logger
                .log_decode_error(generation, item.display_name(), &other.to_string()),
        }

        self.position.reset();
        self.publish(&mut ctl, PlaybackState::Idle);
        self.listener.on_error(item, &error);
    }

    /// Replace the stream in `slot` with a fresh one at frame 0. Used when
    /// skipping to a resume point fails part way.
    pub(crate) fn restart_stream(
        &self,
        generation: u64,
        stop: &AtomicBool,
        item: &Item,
        slot: &StreamSlot,
    ) -> Result<(), ResourceError> {
        let Some(_ctl) = self.lock_for_generation(generation, stop) else {
            return Ok(());
        };

        self.source.close(lock_slot(slot).take());
        let stream = self.source.reopen(item.path())?;
        self.position.attach(generation, 0, stream.format());
        *lock_slot(slot) = Some(stream);
        Ok(())
    }
}
