use std::time::Duration;
use thiserror::Error;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("CLI parse error: {0}")]
    Parse(#[from] crate::cli::ParseError),
}

impl PlayerError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Playback(err) => err.user_message(),
            PlayerError::File(err) => Self::format_file_error(err),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Queue(err) => err.user_message(),
            PlayerError::Parse(err) => format!("Command error: {}", err),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlayerError::Playback(err) => err.recovery_suggestions(),
            PlayerError::File(_) => vec![
                "Check that the path is correct".to_string(),
                "Check file permissions".to_string(),
            ],
            PlayerError::Config(err) => err.recovery_suggestions(),
            PlayerError::Queue(err) => err.recovery_suggestions(),
            PlayerError::Parse(_) => vec!["Type 'help' to see available commands".to_string()],
        }
    }

    /// Check if the player can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Playback(err) => err.is_recoverable(),
            PlayerError::File(_) => false,
            PlayerError::Config(err) => err.is_recoverable(),
            PlayerError::Queue(err) => err.is_recoverable(),
            PlayerError::Parse(_) => false, // Parse errors require correct input
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Playback(PlaybackError::Resource(_)) => ErrorSeverity::Warning,
            PlayerError::Playback(PlaybackError::InvalidItem { .. }) => ErrorSeverity::Warning,
            PlayerError::Playback(PlaybackError::ShutDown) => ErrorSeverity::Info,
            PlayerError::Playback(PlaybackError::Decode(_)) => ErrorSeverity::Error,
            PlayerError::Playback(_) => ErrorSeverity::Critical,
            PlayerError::File(_) => ErrorSeverity::Error,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::Queue(QueueError::EmptyQueue) => ErrorSeverity::Info,
            PlayerError::Queue(_) => ErrorSeverity::Warning,
            PlayerError::Parse(_) => ErrorSeverity::Info,
        }
    }

    fn format_file_error(err: &std::io::Error) -> String {
        match err.kind() {
            std::io::ErrorKind::NotFound => "File or directory not found".to_string(),
            std::io::ErrorKind::PermissionDenied => "Permission denied - cannot access file".to_string(),
            _ => format!("File system error: {}", err),
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Errors surfaced by the playback engine, either returned from `play`
/// or delivered to the listener from the worker.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Invalid item: {reason}")]
    InvalidItem { reason: String },

    #[error("Failed to spawn playback worker: {0}")]
    WorkerSpawn(std::io::Error),

    #[error("Player has been shut down")]
    ShutDown,
}

impl PlaybackError {
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::Resource(err) => err.user_message(),
            PlaybackError::Decode(err) => err.user_message(),
            PlaybackError::Output(err) => err.user_message(),
            PlaybackError::InvalidItem { reason } => format!("Cannot play this item: {}", reason),
            PlaybackError::WorkerSpawn(err) => {
                format!("Could not start the playback thread: {}", err)
            }
            PlaybackError::ShutDown => "The player is shutting down".to_string(),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlaybackError::Resource(_) => vec![
                "Check that the file still exists".to_string(),
                "Supported formats: FLAC, WAV, MP3, OGG/Vorbis, ALAC/AAC".to_string(),
            ],
            PlaybackError::Decode(_) => vec![
                "Try playing the file in another audio player to confirm corruption".to_string(),
                "Skip to the next track with 'next'".to_string(),
            ],
            PlaybackError::Output(_) => vec![
                "Check that your audio device is connected".to_string(),
                "Run with --null-output to play without a device".to_string(),
            ],
            PlaybackError::InvalidItem { .. } => vec!["Use 'list' to see available tracks".to_string()],
            PlaybackError::WorkerSpawn(_) => vec!["Restart the application".to_string()],
            PlaybackError::ShutDown => Vec::new(),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            PlaybackError::Resource(_) => true, // Another item can still be played
            PlaybackError::Decode(_) => true,
            PlaybackError::Output(err) => err.is_recoverable(),
            PlaybackError::InvalidItem { .. } => true,
            PlaybackError::WorkerSpawn(_) => false,
            PlaybackError::ShutDown => false,
        }
    }
}

/// Failures resolving an item's path to a decodable stream
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Resource not found: {path}")]
    NotFound { path: String },

    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a decodable audio resource: {path} ({reason})")]
    Undecodable { path: String, reason: String },
}

impl ResourceError {
    pub fn path(&self) -> &str {
        match self {
            ResourceError::NotFound { path }
            | ResourceError::Unreadable { path, .. }
            | ResourceError::Undecodable { path, .. } => path,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ResourceError::NotFound { path } => format!("Cannot find audio file: {}", path),
            ResourceError::Unreadable { path, source } => {
                format!("Cannot open '{}': {}", path, source)
            }
            ResourceError::Undecodable { path, .. } => {
                format!("File '{}' is not a supported audio format", path)
            }
        }
    }
}

/// Mid-stream decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Corrupted stream: {0}")]
    CorruptedStream(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream already closed")]
    StreamClosed,
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::CorruptedStream(msg) => {
                format!("Audio file appears to be corrupted or damaged: {}", msg)
            }
            DecodeError::DecodeFailed(msg) => format!("Failed to decode audio data: {}", msg),
            DecodeError::Io(err) => format!("Audio file could not be read: {}", err),
            DecodeError::StreamClosed => "Audio stream was closed during playback".to_string(),
        }
    }
}

/// Render side failures
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("No default output device available")]
    NoDefaultDevice,

    #[error("Unsupported output configuration: {0}")]
    UnsupportedConfig(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Output stalled for {waited:?}")]
    Stalled { waited: Duration },
}

impl OutputError {
    pub fn user_message(&self) -> String {
        match self {
            OutputError::NoDefaultDevice => "No audio output device is available".to_string(),
            OutputError::UnsupportedConfig(msg) => {
                format!("The audio device rejected the stream format: {}", msg)
            }
            OutputError::StreamError(msg) => format!("Audio playback interrupted: {}", msg),
            OutputError::Stalled { waited } => {
                format!("Audio device stopped consuming samples for {:.1}s", waited.as_secs_f64())
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            OutputError::NoDefaultDevice => false,
            OutputError::UnsupportedConfig(_) => false,
            OutputError::StreamError(_) => true,
            OutputError::Stalled { .. } => true,
        }
    }
}

/// A worker that ignored cooperative cancellation for longer than the
/// bounded wait. Logged and recorded, never returned to a caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Worker {generation} did not stop within {waited:?} during {operation}")]
pub struct TimeoutAnomaly {
    pub operation: &'static str,
    pub generation: u64,
    pub waited: Duration,
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
                "Try creating the directory manually: ~/.config/clip-player/".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Configuration will use default values".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        // Every configuration failure falls back to defaults
        true
    }
}

/// Playlist building and lookup errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("No playable files found in: {path}")]
    NoPlayableFiles { path: String },

    #[error("Queue is empty")]
    EmptyQueue,

    #[error("Invalid index: {index}")]
    InvalidIndex { index: usize },
}

impl QueueError {
    pub fn user_message(&self) -> String {
        match self {
            QueueError::FileNotFound { path } => {
                format!("Cannot find audio file: {}", path)
            }
            QueueError::NoPlayableFiles { path } => {
                format!("'{}' contains no supported audio files", path)
            }
            QueueError::EmptyQueue => {
                "No tracks loaded - pass some files on the command line".to_string()
            }
            QueueError::InvalidIndex { index } => {
                format!("Track number {} is not valid for current playlist", index + 1)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            QueueError::FileNotFound { .. } => vec![
                "Check that the file path is correct".to_string(),
                "Try using absolute paths instead of relative paths".to_string(),
            ],
            QueueError::NoPlayableFiles { .. } => vec![
                "Supported formats: FLAC, WAV, MP3, OGG/Vorbis, ALAC/AAC".to_string(),
            ],
            QueueError::EmptyQueue => vec!["Usage: clip-player <FILES or DIRECTORIES>".to_string()],
            QueueError::InvalidIndex { .. } => vec![
                "Use 'list' to see available tracks".to_string(),
                "Track numbers start from 1".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            QueueError::FileNotFound { .. } => false,
            QueueError::NoPlayableFiles { .. } => false,
            QueueError::EmptyQueue => false,
            QueueError::InvalidIndex { .. } => true, // Pick another index
        }
    }
}
