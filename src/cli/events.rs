use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::audio::engine::PlaybackListener;
use crate::error::PlaybackError;
use crate::models::{Item, PlaybackState};

/// Engine notification forwarded to the command loop
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StateChanged { state: PlaybackState, position: Duration },
    Error { item: Item, message: String },
}

/// Forwards engine notifications into a tokio channel so the async command
/// loop prints them instead of the engine's threads
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: UnboundedSender<PlayerEvent>,
}

impl ChannelListener {
    pub fn channel() -> (Self, UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PlaybackListener for ChannelListener {
    fn on_state_changed(&self, state: &PlaybackState, position: Duration) {
        // The receiver is gone once the command loop has exited
        let _ = self.tx.send(PlayerEvent::StateChanged {
            state: state.clone(),
            position,
        });
    }

    fn on_error(&self, item: &Item, error: &PlaybackError) {
        let _ = self.tx.send(PlayerEvent::Error {
            item: item.clone(),
            message: error.user_message(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::engine::{EngineSettings, PlaybackEngine};
    use crate::audio::output::NullOutput;
    use crate::audio::source::FileAudioSource;
    use crate::error::DecodeError;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_events_reach_the_receiver() {
        let (listener, mut rx) = ChannelListener::channel();
        let item = Item::new("Song", "/music/song.flac");

        listener.on_state_changed(&PlaybackState::Playing(Arc::new(item.clone())), Duration::ZERO);
        listener.on_error(&item, &PlaybackError::Decode(DecodeError::DecodeFailed("bad frame".to_string())));

        match rx.recv().await {
            Some(PlayerEvent::StateChanged { state, position }) => {
                assert!(state.is_playing());
                assert_eq!(position, Duration::ZERO);
            }
            other => panic!("Expected StateChanged, got {:?}", other),
        }
        match rx.recv().await {
            Some(PlayerEvent::Error { item, message }) => {
                assert_eq!(item.title, "Song");
                assert!(!message.is_empty());
            }
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_is_harmless() {
        let (listener, rx) = ChannelListener::channel();
        drop(rx);
        listener.on_state_changed(&PlaybackState::Stopped, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_engine_shutdown_is_reported() {
        let (listener, mut rx) = ChannelListener::channel();
        let engine = PlaybackEngine::new(
            Arc::new(FileAudioSource::new()),
            Arc::new(NullOutput::default()),
            Arc::new(listener),
            EngineSettings::default(),
        );

        engine.shutdown();
        match rx.recv().await {
            Some(PlayerEvent::StateChanged { state, .. }) => assert_eq!(state, PlaybackState::Stopped),
            other => panic!("Expected StateChanged, got {:?}", other),
        }
    }
}
