use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A playable unit: a title plus the path of its audio resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Item {
    pub title: String,
    pub path: PathBuf,
}

impl Item {
    pub fn new(title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
        }
    }

    /// Build an item titled after the file stem of `path`
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string();
        Self { title, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the display name for this item (title or filename)
    pub fn display_name(&self) -> &str {
        if self.title.trim().is_empty() {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
        } else {
            &self.title
        }
    }
}

/// Sample rate and channel layout of a decoded stream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn frames_to_duration(&self, frames: u64) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let secs = frames / self.sample_rate as u64;
        let rem = frames % self.sample_rate as u64;
        Duration::from_secs(secs) + Duration::from_nanos(rem * 1_000_000_000 / self.sample_rate as u64)
    }

    pub fn duration_to_frames(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.sample_rate as f64) as u64
    }

    /// Get a human-readable format description
    pub fn format_description(&self) -> String {
        format!(
            "{} Hz - {} channel{}",
            self.sample_rate,
            self.channels,
            if self.channels == 1 { "" } else { "s" }
        )
    }
}

/// Engine state. Exactly one is live at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing(Arc<Item>),
    Paused { item: Arc<Item>, frame: u64 },
    Stopped,
}

impl PlaybackState {
    /// Get a human-readable string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Playing(_) => "Playing",
            PlaybackState::Paused { .. } => "Paused",
            PlaybackState::Stopped => "Stopped",
        }
    }

    pub fn item(&self) -> Option<&Arc<Item>> {
        match self {
            PlaybackState::Playing(item) | PlaybackState::Paused { item, .. } => Some(item),
            PlaybackState::Idle | PlaybackState::Stopped => None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing(_))
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PlaybackState::Paused { .. })
    }

    /// Idle or Stopped
    pub fn is_inactive(&self) -> bool {
        matches!(self, PlaybackState::Idle | PlaybackState::Stopped)
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState::Idle
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.item() {
            Some(item) => write!(f, "{} ({})", self.as_str(), item.display_name()),
            None => write!(f, "{}", self.as_str()),
        }
    }
}

/// Point-in-time view of the player for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerStatus {
    pub state: String,
    pub item: Option<Item>,
    pub position: Duration,
    pub volume: f32,
    pub looping: bool,
    pub auto_advance: bool,
}

impl PlayerStatus {
    pub fn new(state: &PlaybackState, position: Duration, volume: f32) -> Self {
        Self {
            state: state.as_str().to_string(),
            item: state.item().map(|item| (**item).clone()),
            position,
            volume,
            looping: false,
            auto_advance: false,
        }
    }

    pub fn with_modes(mut self, looping: bool, auto_advance: bool) -> Self {
        self.looping = looping;
        self.auto_advance = auto_advance;
        self
    }

    pub fn is_playing(&self) -> bool {
        self.state == "Playing"
    }

    pub fn is_paused(&self) -> bool {
        self.state == "Paused"
    }

    /// Format position as MM:SS
    pub fn position_formatted(&self) -> String {
        let total_seconds = self.position.as_secs();
        format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
    }
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self::new(&PlaybackState::Idle, Duration::ZERO, 1.0)
    }
}

/// Interleaved f32 sample data
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    pub frames: usize,
}

impl AudioBuffer {
    pub fn new(channels: u16, sample_rate: u32, frames: usize) -> Self {
        Self {
            samples: vec![0.0; frames * channels as usize],
            channels,
            sample_rate,
            frames,
        }
    }

    pub fn from_interleaved(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let frames = if channels == 0 {
            0
        } else {
            samples.len() / channels as usize
        };
        Self {
            samples,
            channels,
            sample_rate,
            frames,
        }
    }

    /// Create an empty buffer
    pub fn empty() -> Self {
        Self {
            samples: Vec::new(),
            channels: 0,
            sample_rate: 0,
            frames: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn total_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn format(&self) -> StreamFormat {
        StreamFormat::new(self.sample_rate, self.channels)
    }

    pub fn duration(&self) -> Duration {
        self.format().frames_to_duration(self.frames as u64)
    }

    /// Drop the first `frames` frames, keeping the rest
    pub fn discard_front(&mut self, frames: usize) {
        let frames = frames.min(self.frames);
        self.samples.drain(..frames * self.channels as usize);
        self.frames -= frames;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_from_path_uses_file_stem() {
        let item = Item::from_path("/music/album/01 - Intro.flac");
        assert_eq!(item.title, "01 - Intro");
        assert_eq!(item.path(), Path::new("/music/album/01 - Intro.flac"));
    }

    #[test]
    fn test_item_display_name() {
        let item = Item::new("Song", "/test/song.flac");
        assert_eq!(item.display_name(), "Song");

        let untitled = Item::new("  ", "/test/song.flac");
        assert_eq!(untitled.display_name(), "song.flac");
    }

    #[test]
    fn test_stream_format_conversions() {
        let format = StreamFormat::new(44100, 2);
        assert_eq!(format.frames_to_duration(88200), Duration::from_secs(2));
        assert_eq!(format.frames_to_duration(22050), Duration::from_millis(500));
        assert_eq!(format.duration_to_frames(Duration::from_secs(3)), 132300);
        assert_eq!(StreamFormat::new(0, 2).frames_to_duration(100), Duration::ZERO);
        assert_eq!(format.format_description(), "44100 Hz - 2 channels");
        assert_eq!(StreamFormat::new(48000, 1).format_description(), "48000 Hz - 1 channel");
    }

    #[test]
    fn test_playback_state_accessors() {
        let item = Arc::new(Item::new("Song", "/test/song.wav"));

        let playing = PlaybackState::Playing(item.clone());
        assert!(playing.is_playing());
        assert!(!playing.is_inactive());
        assert_eq!(playing.item(), Some(&item));
        assert_eq!(playing.to_string(), "Playing (Song)");

        let paused = PlaybackState::Paused { item: item.clone(), frame: 44100 };
        assert!(paused.is_paused());
        assert_eq!(paused.as_str(), "Paused");

        assert!(PlaybackState::Idle.is_inactive());
        assert!(PlaybackState::Stopped.is_inactive());
        assert_eq!(PlaybackState::default(), PlaybackState::Idle);
        assert_eq!(PlaybackState::Stopped.to_string(), "Stopped");
    }

    #[test]
    fn test_player_status_serialization() {
        let item = Arc::new(Item::new("Song", "/test/song.wav"));
        let state = PlaybackState::Paused { item, frame: 10 };
        let status = PlayerStatus::new(&state, Duration::from_secs(65), 0.5).with_modes(true, false);

        assert!(status.is_paused());
        assert_eq!(status.position_formatted(), "01:05");

        let serialized = serde_json::to_string(&status).expect("Failed to serialize PlayerStatus");
        let deserialized: PlayerStatus =
            serde_json::from_str(&serialized).expect("Failed to deserialize PlayerStatus");
        assert_eq!(status, deserialized);
        assert!(deserialized.looping);
    }

    #[test]
    fn test_audio_buffer_discard_front() {
        let mut buffer = AudioBuffer::from_interleaved(vec![0.0, 0.1, 1.0, 1.1, 2.0, 2.1], 2, 48000);
        assert_eq!(buffer.frames, 3);

        buffer.discard_front(2);
        assert_eq!(buffer.frames, 1);
        assert_eq!(buffer.samples, vec![2.0, 2.1]);

        buffer.discard_front(5);
        assert!(buffer.is_empty());
        assert_eq!(buffer.total_samples(), 0);
    }

    #[test]
    fn test_audio_buffer_duration() {
        let buffer = AudioBuffer::new(2, 44100, 44100);
        assert!((buffer.duration().as_secs_f64() - 1.0).abs() < 0.001);
        assert_eq!(AudioBuffer::empty().duration(), Duration::ZERO);
    }
}
