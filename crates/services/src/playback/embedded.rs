use chrono::{DateTime, Duration, Utc};

use crate::error::PlaybackError;

use super::{EventSender, PlaybackAdapter, PlaybackEvent, PlayerState, check_seek, send};

/// Time updates from an embedded player are sampled at most this often.
pub const EMBED_POLL_INTERVAL_MS: i64 = 500;

/// Control surface of a third-party embedded player.
///
/// Such players expose no time-update stream, so the adapter samples them.
pub trait EmbedApi: Send {
    fn play_video(&mut self);
    fn pause_video(&mut self);
    fn seek_to(&mut self, seconds: f64);
    fn current_time(&self) -> f64;
    /// `0.0` until metadata has loaded.
    fn duration(&self) -> f64;
    fn player_state(&self) -> PlayerState;
}

/// Wraps an [`EmbedApi`] and turns polling into [`PlaybackEvent`]s.
#[derive(Debug)]
pub struct EmbeddedPlayerAdapter<E> {
    api: E,
    events: EventSender,
    ready: bool,
    last_state: PlayerState,
    last_sample_at: Option<DateTime<Utc>>,
    held_paused: bool,
}

impl<E: EmbedApi> EmbeddedPlayerAdapter<E> {
    #[must_use]
    pub fn new(api: E, events: EventSender) -> Self {
        Self {
            api,
            events,
            ready: false,
            last_state: PlayerState::Unstarted,
            last_sample_at: None,
            held_paused: false,
        }
    }

    #[must_use]
    pub fn api(&self) -> &E {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut E {
        &mut self.api
    }

    /// Sample the embedded player.
    ///
    /// Emits `Ready` once, state changes as they are seen, and a time update
    /// when [`EMBED_POLL_INTERVAL_MS`] has passed since the last one. A player
    /// that starts on its own after `pause` is paused again.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Disconnected` if the event stream is closed.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Result<(), PlaybackError> {
        if !self.ready {
            let duration = self.api.duration();
            if duration > 0.0 && duration.is_finite() {
                self.ready = true;
                send(&self.events, PlaybackEvent::Ready { duration })?;
            }
        }

        let mut state = self.api.player_state();
        if self.held_paused && state == PlayerState::Playing {
            tracing::debug!("embedded player resumed without play; pausing again");
            self.api.pause_video();
            state = self.api.player_state();
        }
        if state != self.last_state {
            self.last_state = state;
            send(&self.events, PlaybackEvent::StateChanged(state))?;
            if state == PlayerState::Ended {
                send(&self.events, PlaybackEvent::Ended)?;
            }
        }

        if state == PlayerState::Playing {
            let due = self.last_sample_at.is_none_or(|at| {
                now - at >= Duration::milliseconds(EMBED_POLL_INTERVAL_MS)
            });
            if due {
                self.last_sample_at = Some(now);
                send(&self.events, PlaybackEvent::TimeUpdate(self.api.current_time()))?;
            }
        }
        Ok(())
    }
}

impl<E: EmbedApi> PlaybackAdapter for EmbeddedPlayerAdapter<E> {
    fn play(&mut self) -> Result<(), PlaybackError> {
        self.held_paused = false;
        self.api.play_video();
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        self.held_paused = true;
        self.api.pause_video();
        Ok(())
    }

    fn seek(&mut self, t: f64) -> Result<(), PlaybackError> {
        if !self.ready {
            return Err(PlaybackError::NotReady);
        }
        self.api.seek_to(check_seek(t)?);
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.api.current_time()
    }

    fn duration(&self) -> Option<f64> {
        let duration = self.api.duration();
        (duration > 0.0).then_some(duration)
    }

    fn is_playing(&self) -> bool {
        self.api.player_state() == PlayerState::Playing
    }
}
