use std::time::Duration;

use crate::error::{ErrorSeverity, PlayerError, PlaybackError, QueueError};
use crate::models::{PlaybackState, PlayerStatus};
use crate::queue::Playlist;

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Display the full player status box
    pub fn display_full_status(status: &PlayerStatus) {
        for line in Self::render_full_status(status) {
            println!("{}", line);
        }
    }

    /// Lines of the status box, without printing
    pub fn render_full_status(status: &PlayerStatus) -> Vec<String> {
        let mut lines = vec!["┌─ Player Status ─────────────────────────────────────────┐".to_string()];

        match &status.item {
            Some(item) => {
                lines.push(format!("│ Title: {}", Self::truncate(item.display_name(), 50)));
                lines.push(format!("│ Path: {}", Self::truncate(&item.path.display().to_string(), 51)));
                lines.push("│".to_string());
                lines.push(format!("│ Status: {}", status.state));
                lines.push(format!("│ Position: {}", Self::format_duration(status.position)));
            }
            None => {
                lines.push("│ Nothing loaded".to_string());
                lines.push(format!("│ Status: {}", status.state));
            }
        }

        lines.push("│".to_string());
        lines.push(format!(
            "│ Volume: {}%  Loop: {}  Auto-advance: {}",
            (status.volume * 100.0).round() as u8,
            Self::on_off(status.looping),
            Self::on_off(status.auto_advance)
        ));
        lines.push("└─────────────────────────────────────────────────────────┘".to_string());
        lines
    }

    /// One-line status
    pub fn compact_status(status: &PlayerStatus) -> String {
        match &status.item {
            Some(item) => format!(
                "{} | {} | {}",
                status.state,
                Self::truncate(item.display_name(), 40),
                Self::format_duration(status.position)
            ),
            None => format!("{} | Nothing loaded", status.state),
        }
    }

    /// One-line description of a state change notification
    pub fn describe_state(state: &PlaybackState, position: Duration) -> String {
        match state {
            PlaybackState::Playing(item) if position.is_zero() => format!("▶ Playing: {}", item.display_name()),
            PlaybackState::Playing(item) => format!(
                "▶ Playing: {} (from {})",
                item.display_name(),
                Self::format_duration(position)
            ),
            PlaybackState::Paused { item, .. } => format!(
                "⏸ Paused: {} at {}",
                item.display_name(),
                Self::format_duration(position)
            ),
            PlaybackState::Stopped => "⏹ Stopped".to_string(),
            PlaybackState::Idle => "Idle".to_string(),
        }
    }

    /// Numbered playlist, marking the current item
    /// One line per entry; `current` is the zero-based entry to mark
    pub fn render_playlist(playlist: &Playlist, current: Option<usize>) -> Vec<String> {
        if playlist.is_empty() {
            return vec!["Playlist is empty".to_string()];
        }
        playlist
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let marker = if current == Some(index) { "▶" } else { " " };
                format!("{} {:>3}. {}", marker, index + 1, Self::truncate(item.display_name(), 60))
            })
            .collect()
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &PlayerError) {
        for line in Self::render_error(error) {
            eprintln!("{}", line);
        }
    }

    pub fn render_error(error: &PlayerError) -> Vec<String> {
        let severity = error.severity();
        let icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        let mut lines = vec![format!(
            "┌─ {} {} ─────────────────────────────────────────────────┐",
            icon,
            severity.as_str()
        )];
        for line in Self::wrap_text(&error.user_message(), 55) {
            lines.push(format!("│ {}", line));
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            lines.push("│".to_string());
            lines.push("│ Suggestions:".to_string());
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    lines.push(format!("│   {}", line));
                }
            }
        }

        if let Some(context) = Self::error_context(error) {
            lines.push("│".to_string());
            lines.push(format!("│ {}", context));
        }
        lines.push("└─────────────────────────────────────────────────────────┘".to_string());
        lines
    }

    fn error_context(error: &PlayerError) -> Option<&'static str> {
        match error {
            PlayerError::Playback(PlaybackError::Resource(_)) => Some("Supported: FLAC, WAV, MP3, OGG/Vorbis, ALAC/AAC"),
            PlayerError::Playback(PlaybackError::Output(_)) => Some("Start with --null-output to play without a device"),
            PlayerError::Queue(QueueError::InvalidIndex { .. }) => Some("Use 'list' to see playlist numbers"),
            PlayerError::Config(_) => Some("Configuration will use default values"),
            _ => None,
        }
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.chars().count() + word.chars().count() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }
        lines
    }

    /// Format duration as MM:SS, or H:MM:SS past an hour
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Truncate to `max_len` characters, ending with "..." when cut
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        }
    }

    fn on_off(flag: bool) -> &'static str {
        if flag {
            "on"
        } else {
            "off"
        }
    }
}
