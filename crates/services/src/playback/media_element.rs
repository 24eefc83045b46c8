use crate::error::PlaybackError;

use super::{EventSender, PlaybackAdapter, PlaybackEvent, PlayerState, check_seek, send};

/// A locally driven media element.
///
/// Time only moves through [`MediaElementAdapter::advance`], which plays the
/// role of a frame tick: each call while playing emits one time update.
#[derive(Debug)]
pub struct MediaElementAdapter {
    events: EventSender,
    duration: f64,
    position: f64,
    state: PlayerState,
}

impl MediaElementAdapter {
    /// Load a media element of `duration` seconds and announce it.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NotReady` for a non-positive duration, or
    /// `PlaybackError::Disconnected` if nobody listens for events.
    pub fn load(duration: f64, events: EventSender) -> Result<Self, PlaybackError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(PlaybackError::NotReady);
        }
        send(&events, PlaybackEvent::Ready { duration })?;
        Ok(Self {
            events,
            duration,
            position: 0.0,
            state: PlayerState::Unstarted,
        })
    }

    #[must_use]
    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Move time forward by `dt` seconds if playing.
    ///
    /// Reaching the end clamps to the duration and emits the end events.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Disconnected` if the event stream is closed.
    pub fn advance(&mut self, dt: f64) -> Result<(), PlaybackError> {
        if self.state != PlayerState::Playing || !dt.is_finite() || dt <= 0.0 {
            return Ok(());
        }
        self.position = (self.position + dt).min(self.duration);
        send(&self.events, PlaybackEvent::TimeUpdate(self.position))?;

        if self.position >= self.duration {
            self.set_state(PlayerState::Ended)?;
            send(&self.events, PlaybackEvent::Ended)?;
        }
        Ok(())
    }

    fn set_state(&mut self, state: PlayerState) -> Result<(), PlaybackError> {
        if self.state == state {
            return Ok(());
        }
        self.state = state;
        send(&self.events, PlaybackEvent::StateChanged(state))
    }
}

impl PlaybackAdapter for MediaElementAdapter {
    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.position >= self.duration {
            return Ok(());
        }
        self.set_state(PlayerState::Playing)
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        match self.state {
            PlayerState::Ended => Ok(()),
            _ => self.set_state(PlayerState::Paused),
        }
    }

    fn seek(&mut self, t: f64) -> Result<(), PlaybackError> {
        self.position = check_seek(t)?.min(self.duration);
        if self.state == PlayerState::Ended && self.position < self.duration {
            self.set_state(PlayerState::Paused)?;
        }
        send(&self.events, PlaybackEvent::TimeUpdate(self.position))
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> Option<f64> {
        Some(self.duration)
    }

    fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{EventReceiver, event_channel};

    fn drain(rx: &mut EventReceiver) -> Vec<PlaybackEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn announces_duration_on_load() {
        let (tx, mut rx) = event_channel();
        let _player = MediaElementAdapter::load(240.0, tx).unwrap();
        assert_eq!(drain(&mut rx), vec![PlaybackEvent::Ready { duration: 240.0 }]);
    }

    #[test]
    fn advance_is_silent_until_played() {
        let (tx, mut rx) = event_channel();
        let mut player = MediaElementAdapter::load(10.0, tx).unwrap();
        drain(&mut rx);

        player.advance(1.0).unwrap();
        assert!(drain(&mut rx).is_empty());

        player.play().unwrap();
        player.advance(0.25).unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![
                PlaybackEvent::StateChanged(PlayerState::Playing),
                PlaybackEvent::TimeUpdate(0.25),
            ]
        );
    }

    #[test]
    fn stays_paused_after_pause() {
        let (tx, mut rx) = event_channel();
        let mut player = MediaElementAdapter::load(10.0, tx).unwrap();
        player.play().unwrap();
        player.pause().unwrap();
        drain(&mut rx);

        for _ in 0..5 {
            player.advance(1.0).unwrap();
        }
        assert!(!player.is_playing());
        assert_eq!(player.current_time(), 0.0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn clamps_at_the_end() {
        let (tx, mut rx) = event_channel();
        let mut player = MediaElementAdapter::load(2.0, tx).unwrap();
        player.play().unwrap();
        drain(&mut rx);

        player.advance(5.0).unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![
                PlaybackEvent::TimeUpdate(2.0),
                PlaybackEvent::StateChanged(PlayerState::Ended),
                PlaybackEvent::Ended,
            ]
        );
        assert!(!player.is_playing());
    }

    #[test]
    fn seek_validates_and_reports() {
        let (tx, mut rx) = event_channel();
        let mut player = MediaElementAdapter::load(10.0, tx).unwrap();
        drain(&mut rx);

        assert_eq!(player.seek(-1.0), Err(PlaybackError::InvalidSeek(-1.0)));
        player.seek(42.0).unwrap();
        assert_eq!(player.current_time(), 10.0);
        assert_eq!(drain(&mut rx), vec![PlaybackEvent::TimeUpdate(10.0)]);
    }

    #[test]
    fn closed_stream_is_reported() {
        let (tx, rx) = event_channel();
        let mut player = MediaElementAdapter::load(10.0, tx).unwrap();
        drop(rx);
        assert_eq!(player.play(), Err(PlaybackError::Disconnected));
    }
}
