//! Playback adapters: one uniform control surface over different players.
//!
//! Adapters push [`PlaybackEvent`]s into an unbounded channel; the lesson
//! session consumes them one at a time.

mod embedded;
mod media_element;

use tokio::sync::mpsc;

use crate::error::PlaybackError;

pub use embedded::{EMBED_POLL_INTERVAL_MS, EmbedApi, EmbeddedPlayerAdapter};
pub use media_element::MediaElementAdapter;

/// Coarse player state as reported by the underlying player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Unstarted,
    Buffering,
    Playing,
    Paused,
    Ended,
}

/// Notification from a player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    /// Metadata is available. Sent once per adapter.
    Ready { duration: f64 },
    /// The play-head moved, in seconds from the start.
    TimeUpdate(f64),
    StateChanged(PlayerState),
    Ended,
}

pub type EventSender = mpsc::UnboundedSender<PlaybackEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PlaybackEvent>;

#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Uniform control over a video player.
///
/// After `pause`, an adapter never resumes on its own; only `play` does.
pub trait PlaybackAdapter: Send {
    /// # Errors
    ///
    /// Returns `PlaybackError` if the player cannot start.
    fn play(&mut self) -> Result<(), PlaybackError>;

    /// # Errors
    ///
    /// Returns `PlaybackError` if the player cannot pause.
    fn pause(&mut self) -> Result<(), PlaybackError>;

    /// Move the play-head to `t` seconds.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidSeek` for negative or non-finite
    /// positions, or `PlaybackError::NotReady` before metadata loads.
    fn seek(&mut self, t: f64) -> Result<(), PlaybackError>;

    fn current_time(&self) -> f64;

    /// Total length in seconds, once known.
    fn duration(&self) -> Option<f64>;

    fn is_playing(&self) -> bool;
}

fn check_seek(t: f64) -> Result<f64, PlaybackError> {
    if t.is_finite() && t >= 0.0 {
        Ok(t)
    } else {
        Err(PlaybackError::InvalidSeek(t))
    }
}

fn send(events: &EventSender, event: PlaybackEvent) -> Result<(), PlaybackError> {
    events.send(event).map_err(|_| PlaybackError::Disconnected)
}
