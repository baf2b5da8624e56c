use chrono::{DateTime, Utc};
use log::{debug, error, info, trace, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::TimeoutAnomaly;

/// Playback event kept in the logger history
#[derive(Debug, Clone)]
pub struct AudioEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AudioEventType,
    pub generation: Option<u64>,
    pub duration: Option<Duration>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEventType {
    PlaybackStarted,
    PlaybackPaused,
    PlaybackResumed,
    PlaybackStopped,
    TrackChanged,
    PlaybackCompleted,
    DecodeError,
    ResourceError,
    OutputError,
    TimeoutAnomaly,
}

impl AudioEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEventType::PlaybackStarted => "PLAYBACK_STARTED",
            AudioEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            AudioEventType::PlaybackResumed => "PLAYBACK_RESUMED",
            AudioEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            AudioEventType::TrackChanged => "TRACK_CHANGED",
            AudioEventType::PlaybackCompleted => "PLAYBACK_COMPLETED",
            AudioEventType::DecodeError => "DECODE_ERROR",
            AudioEventType::ResourceError => "RESOURCE_ERROR",
            AudioEventType::OutputError => "OUTPUT_ERROR",
            AudioEventType::TimeoutAnomaly => "TIMEOUT_ANOMALY",
        }
    }
}

/// Logger for playback operations: forwards to `log` and keeps a bounded
/// event history so anomalies stay observable after the fact.
#[derive(Clone)]
pub struct AudioLogger {
    events: Arc<Mutex<VecDeque<AudioEvent>>>,
    max_events: usize,
}

impl AudioLogger {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: max_events.max(1),
        }
    }

    /// Initialize logging system with appropriate log level
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var("CLIP_PLAYER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let mut builder = env_logger::Builder::new();

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        builder.filter_level(parse_level(&log_level));
        builder.try_init()?;

        info!("clip-player logging initialized with level: {}", log_level);
        Ok(())
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<AudioEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log a playback event
    pub fn log_event(
        &self,
        event_type: AudioEventType,
        generation: Option<u64>,
        details: String,
        duration: Option<Duration>,
    ) {
        match event_type {
            AudioEventType::PlaybackStarted
            | AudioEventType::PlaybackPaused
            | AudioEventType::PlaybackResumed
            | AudioEventType::PlaybackStopped
            | AudioEventType::TrackChanged => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::PlaybackCompleted => {
                debug!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::ResourceError | AudioEventType::TimeoutAnomaly => {
                warn!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::DecodeError | AudioEventType::OutputError => {
                error!("[{}] {}", event_type.as_str(), details);
            }
        }

        let event = AudioEvent {
            timestamp: Utc::now(),
            event_type,
            generation,
            duration,
            details,
        };

        let mut events = self.history();
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    pub fn log_playback_started(&self, generation: u64, title: &str, format_info: &str) {
        self.log_event(
            AudioEventType::PlaybackStarted,
            Some(generation),
            format!("Started playing: {} ({})", title, format_info),
            None,
        );
    }

    pub fn log_playback_paused(&self, generation: u64, position: Duration) {
        self.log_event(
            AudioEventType::PlaybackPaused,
            Some(generation),
            format!("Playback paused at position: {:.2}s", position.as_secs_f64()),
            None,
        );
    }

    pub fn log_playback_resumed(&self, generation: u64, position: Duration) {
        self.log_event(
            AudioEventType::PlaybackResumed,
            Some(generation),
            format!("Playback resumed from position: {:.2}s", position.as_secs_f64()),
            None,
        );
    }

    pub fn log_playback_stopped(&self, reason: &str) {
        self.log_event(
            AudioEventType::PlaybackStopped,
            None,
            format!("Playback stopped: {}", reason),
            None,
        );
    }

    pub fn log_track_changed(&self, from_track: Option<&str>, to_track: &str) {
        let details = match from_track {
            Some(from) => format!("Track changed from '{}' to '{}'", from, to_track),
            None => format!("Track loaded: '{}'", to_track),
        };
        self.log_event(AudioEventType::TrackChanged, None, details, None);
    }

    pub fn log_playback_completed(&self, generation: u64, title: &str, played: Duration) {
        self.log_event(
            AudioEventType::PlaybackCompleted,
            Some(generation),
            format!("Finished '{}' after {:.2}s", title, played.as_secs_f64()),
            Some(played),
        );
    }

    pub fn log_decode_error(&self, generation: u64, title: &str, error: &str) {
        self.log_event(
            AudioEventType::DecodeError,
            Some(generation),
            format!("Decode error for '{}': {}", title, error),
            None,
        );
    }

    pub fn log_resource_error(&self, path: &str, error: &str) {
        self.log_event(
            AudioEventType::ResourceError,
            None,
            format!("Cannot open '{}': {}", path, error),
            None,
        );
    }

    pub fn log_output_error(&self, generation: u64, error: &str) {
        self.log_event(
            AudioEventType::OutputError,
            Some(generation),
            format!("Output error: {}", error),
            None,
        );
    }

    pub fn log_timeout_anomaly(&self, anomaly: &TimeoutAnomaly) {
        self.log_event(
            AudioEventType::TimeoutAnomaly,
            Some(anomaly.generation),
            anomaly.to_string(),
            Some(anomaly.waited),
        );
    }

    /// Get recent events for debugging
    pub fn get_recent_events(&self, count: usize) -> Vec<AudioEvent> {
        let events = self.history();
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    /// Clear event history
    pub fn clear_events(&self) {
        self.history().clear();
    }

    /// Get event statistics
    pub fn get_event_statistics(&self) -> EventStatistics {
        let events = self.history();
        let mut stats = EventStatistics::new();

        for event in events.iter() {
            match event.event_type {
                AudioEventType::PlaybackStarted | AudioEventType::PlaybackResumed => {
                    stats.sessions_started += 1
                }
                AudioEventType::PlaybackCompleted => stats.completions += 1,
                AudioEventType::DecodeError => stats.decode_errors += 1,
                AudioEventType::ResourceError => stats.resource_errors += 1,
                AudioEventType::OutputError => stats.output_errors += 1,
                AudioEventType::TimeoutAnomaly => stats.timeout_anomalies += 1,
                _ => {}
            }
        }

        stats.total_events = events.len();
        stats
    }
}

impl Default for AudioLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Statistics about logged events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStatistics {
    pub total_events: usize,
    pub sessions_started: usize,
    pub completions: usize,
    pub decode_errors: usize,
    pub resource_errors: usize,
    pub output_errors: usize,
    pub timeout_anomalies: usize,
}

impl EventStatistics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Timer utility for measuring operation durations
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish(self) -> Duration {
        let duration = self.elapsed();
        trace!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        duration
    }

    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            warn!(
                "Operation '{}' took {}ms (threshold: {}ms)",
                self.operation_name,
                duration.as_millis(),
                threshold.as_millis()
            );
        } else {
            debug!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        }
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_audio_logger_creation() {
        let logger = AudioLogger::new();
        assert_eq!(logger.max_events, 1000);
        assert!(logger.get_recent_events(10).is_empty());
    }

    #[test]
    fn test_log_event() {
        let logger = AudioLogger::new();

        logger.log_event(AudioEventType::PlaybackStarted, Some(3), "Test playback".to_string(), None);

        let events = logger.get_recent_events(1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details, "Test playback");
        assert_eq!(events[0].generation, Some(3));
        assert_eq!(events[0].event_type, AudioEventType::PlaybackStarted);
    }

    #[test]
    fn test_event_history_limit() {
        let logger = AudioLogger::with_capacity(3);

        for i in 0..5 {
            logger.log_event(AudioEventType::PlaybackStarted, None, format!("Event {}", i), None);
        }

        let events = logger.get_recent_events(10);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].details, "Event 2");
        assert_eq!(events[2].details, "Event 4");
    }

    #[test]
    fn test_event_statistics() {
        let logger = AudioLogger::new();

        logger.log_playback_started(1, "Song", "44100 Hz - 2 channels");
        logger.log_playback_resumed(2, Duration::from_secs(2));
        logger.log_decode_error(2, "Song", "bad frame");
        logger.log_resource_error("/missing.wav", "not found");
        logger.log_timeout_anomaly(&TimeoutAnomaly {
            operation: "stop",
            generation: 2,
            waited: Duration::from_millis(100),
        });

        let stats = logger.get_event_statistics();
        assert_eq!(stats.total_events, 5);
        assert_eq!(stats.sessions_started, 2);
        assert_eq!(stats.decode_errors, 1);
        assert_eq!(stats.resource_errors, 1);
        assert_eq!(stats.timeout_anomalies, 1);
        assert_eq!(stats.output_errors, 0);
    }

    #[test]
    fn test_timeout_anomaly_event_carries_wait() {
        let logger = AudioLogger::new();
        let anomaly = TimeoutAnomaly {
            operation: "shutdown",
            generation: 9,
            waited: Duration::from_secs(1),
        };
        logger.log_timeout_anomaly(&anomaly);

        let events = logger.get_recent_events(1);
        assert_eq!(events[0].event_type, AudioEventType::TimeoutAnomaly);
        assert_eq!(events[0].generation, Some(9));
        assert_eq!(events[0].duration, Some(Duration::from_secs(1)));
        assert!(events[0].details.contains("shutdown"));
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test_operation");
        thread::sleep(Duration::from_millis(10));
        let duration = timer.finish_with_threshold(Duration::from_secs(5));
        assert!(duration >= Duration::from_millis(10));
    }

    #[test]
    fn test_clear_events() {
        let logger = AudioLogger::new();

        logger.log_playback_stopped("user requested");
        logger.log_track_changed(None, "Song");
        assert_eq!(logger.get_recent_events(10).len(), 2);

        logger.clear_events();
        assert!(logger.get_recent_events(10).is_empty());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(parse_level("warn"), log::LevelFilter::Warn);
        assert_eq!(parse_level("nonsense"), log::LevelFilter::Info);
    }
}
