//! The control surface used by the front end.
//!
//! `Player` maps user-level actions (play entry N, next, toggle) onto
//! engine commands. Apart from remembering which playlist entry is
//! current, every call delegates synchronously to the `PlaybackEngine`.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::audio::engine::{AutoAdvance, PlaybackEngine};
use crate::error::{PlaybackError, PlayerError};
use crate::models::{Item, PlaybackState, PlayerStatus};
use crate::queue::{Playlist, PlaylistCursor};

pub struct Player {
    engine: PlaybackEngine,
    cursor: Arc<PlaylistCursor>,
}

impl Player {
    /// Wrap `engine`, using `playlist` for lookups and, when enabled, for
    /// advancing after an item finishes
    pub fn new(engine: PlaybackEngine, playlist: Playlist, auto_advance: bool) -> Self {
        let player = Self {
            engine,
            cursor: Arc::new(PlaylistCursor::new(Arc::new(playlist))),
        };
        player.set_auto_advance(auto_advance);
        player
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn playlist(&self) -> &Playlist {
        self.cursor.playlist()
    }

    /// Playlist entry (zero based) the player is on, if any
    pub fn current_index(&self) -> Option<usize> {
        self.cursor.index()
    }

    pub fn play(&self, item: Arc<Item>) -> Result<(), PlaybackError> {
        self.cursor.set(self.cursor.locate(&item));
        self.engine.play(item)
    }

    /// Play the playlist entry at `index` (zero based)
    pub fn play_index(&self, index: usize) -> Result<Arc<Item>, PlayerError> {
        let item = self.playlist().get(index)?;
        self.start_entry(index, item.clone())?;
        Ok(item)
    }

    /// Resume if `item` is the paused item, otherwise start it fresh
    pub fn play_or_resume(&self, item: Arc<Item>) -> Result<(), PlaybackError> {
        match self.engine.state() {
            PlaybackState::Paused { item: paused, .. } if paused == item => {
                self.engine.resume();
                Ok(())
            }
            PlaybackState::Playing(current) if current == item => Ok(()),
            _ => self.play(item),
        }
    }

    /// `play_or_resume` for the entry at `index`. Another entry holding the
    /// same item counts as a different entry and is started fresh.
    pub fn play_or_resume_index(&self, index: usize) -> Result<Arc<Item>, PlayerError> {
        let item = self.playlist().get(index)?;
        if self.cursor.index() == Some(index) {
            self.play_or_resume(item.clone())?;
        } else {
            self.start_entry(index, item.clone())?;
        }
        Ok(item)
    }

    // The cursor moves first: a short item may finish and advance it
    // before `play` returns
    fn start_entry(&self, index: usize, item: Arc<Item>) -> Result<(), PlaybackError> {
        self.cursor.set(Some(index));
        self.engine.play(item)
    }

    pub fn pause(&self) {
        self.engine.pause();
    }

    pub fn resume(&self) {
        self.engine.resume();
    }

    /// Pause when playing, resume when paused, otherwise nothing
    pub fn toggle(&self) {
        match self.engine.state() {
            PlaybackState::Playing(_) => self.engine.pause(),
            PlaybackState::Paused { .. } => self.engine.resume(),
            PlaybackState::Idle | PlaybackState::Stopped => debug!("Toggle ignored: nothing to pause or resume"),
        }
    }

    pub fn stop(&self) {
        self.engine.stop();
    }

    /// Play the entry after the current one. `Ok(None)` leaves playback
    /// untouched when there is no current item or it is the last entry.
    pub fn next(&self) -> Result<Option<Arc<Item>>, PlaybackError> {
        let Some(current) = self.engine.current_item() else {
            return Ok(None);
        };
        match self.cursor.peek_next(&current) {
            Some((index, next)) => {
                info!("Next: '{}'", next.display_name());
                self.start_entry(index, next.clone())?;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    /// Play the entry before the current one, same rules as `next`
    pub fn previous(&self) -> Result<Option<Arc<Item>>, PlaybackError> {
        let Some(current) = self.engine.current_item() else {
            return Ok(None);
        };
        match self.cursor.peek_previous(&current) {
            Some((index, previous)) => {
                info!("Previous: '{}'", previous.display_name());
                self.start_entry(index, previous.clone())?;
                Ok(Some(previous))
            }
            None => Ok(None),
        }
    }

    pub fn set_loop(&self, enabled: bool) {
        self.engine.set_loop(enabled);
    }

    pub fn is_looping(&self) -> bool {
        self.engine.is_looping()
    }

    pub fn set_auto_advance(&self, enabled: bool) {
        let provider = if enabled {
            Some(self.cursor.clone() as Arc<dyn AutoAdvance>)
        } else {
            None
        };
        self.engine.set_auto_advance(provider);
    }

    pub fn is_auto_advancing(&self) -> bool {
        self.engine.has_auto_advance()
    }

    pub fn set_volume(&self, volume: f32) -> f32 {
        self.engine.set_volume(volume)
    }

    pub fn volume(&self) -> f32 {
        self.engine.volume()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.engine.is_paused()
    }

    pub fn current_item(&self) -> Option<Arc<Item>> {
        self.engine.current_item()
    }

    pub fn current_position(&self) -> Duration {
        self.engine.current_position()
    }

    pub fn status(&self) -> PlayerStatus {
        self.engine.status()
    }

    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::engine::{EngineSettings, NoopListener};
    use crate::audio::output::NullOutput;
    use crate::audio::source::FileAudioSource;
    use crate::error::QueueError;

    fn player(playlist: Playlist) -> Player {
        let engine = PlaybackEngine::new(
            Arc::new(FileAudioSource::new()),
            Arc::new(NullOutput::new(true)),
            Arc::new(NoopListener),
            EngineSettings::default(),
        );
        Player::new(engine, playlist, true)
    }

    #[test]
    fn test_play_index_out_of_range() {
        let player = player(Playlist::from_items(vec![Item::new("One", "/music/one.flac")]));
        match player.play_index(3) {
            Err(PlayerError::Queue(QueueError::InvalidIndex { index })) => assert_eq!(index, 3),
            other => panic!("Expected InvalidIndex, got {:?}", other.map(|_| ())),
        }
        assert!(!player.is_playing());
    }

    #[test]
    fn test_navigation_without_current_item_is_noop() {
        let player = player(Playlist::from_items(vec![
            Item::new("One", "/music/one.flac"),
            Item::new("Two", "/music/two.flac"),
        ]));
        assert!(player.next().unwrap().is_none());
        assert!(player.previous().unwrap().is_none());
        assert_eq!(player.engine().state(), PlaybackState::Idle);
    }

    #[test]
    fn test_toggle_when_idle_does_nothing() {
        let player = player(Playlist::new());
        player.toggle();
        assert_eq!(player.engine().state(), PlaybackState::Idle);
    }

    #[test]
    fn test_auto_advance_switch() {
        let player = player(Playlist::new());
        assert!(player.is_auto_advancing());
        assert!(player.status().auto_advance);

        player.set_auto_advance(false);
        assert!(!player.is_auto_advancing());
        assert!(!player.engine().has_auto_advance());
        assert!(!player.status().auto_advance);

        // The engine holds the only copy of the setting
        player.set_auto_advance(true);
        player.engine().set_auto_advance(None);
        assert!(!player.is_auto_advancing());
        assert_eq!(player.is_auto_advancing(), player.status().auto_advance);
    }

    #[test]
    fn test_missing_file_reports_resource_error() {
        let player = player(Playlist::from_items(vec![Item::new("Ghost", "/definitely/not/here.flac")]));
        let result = player.play_index(0);
        assert!(matches!(
            result,
            Err(PlayerError::Playback(PlaybackError::Resource(_)))
        ));
        assert_eq!(player.engine().state(), PlaybackState::Idle);
    }
}
