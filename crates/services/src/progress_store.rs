use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lab_core::Clock;
use lab_core::model::{InteractionId, ProgressState, SecretId, StoryStepId, ViewMode};
use storage::repository::{ProgressRepository, StorageError};

/// Minimum wall-clock spacing between writes caused only by time updates.
pub const TIME_WRITE_INTERVAL_SECS: i64 = 2;

/// Result of a store mutation.
///
/// The in-memory change always applies; `persisted` reports whether the
/// durable write succeeded. A failed write is never rolled back.
#[derive(Debug)]
#[must_use]
pub struct Mutation<T> {
    pub value: T,
    pub persisted: Result<(), StorageError>,
}

impl<T> Mutation<T> {
    /// A value that needed no write, or whose write succeeded.
    pub fn clean(value: T) -> Self {
        Self {
            value,
            persisted: Ok(()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Mutation<U> {
        Mutation {
            value: f(self.value),
            persisted: self.persisted,
        }
    }

    /// Fold in another write result, keeping the first failure.
    pub fn absorb(&mut self, persisted: Result<(), StorageError>) {
        if self.persisted.is_ok() {
            self.persisted = persisted;
        }
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.persisted.is_ok()
    }

    /// Collapse into a `Result`, dropping the value on write failure.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the durable write failed.
    pub fn into_result(self) -> Result<T, StorageError> {
        self.persisted.map(|()| self.value)
    }
}

/// Owns a lesson session's progress and keeps durable storage in step.
///
/// One store per session, handed by reference to whoever mutates progress.
pub struct ProgressStore {
    key: String,
    state: ProgressState,
    repo: Arc<dyn ProgressRepository>,
    clock: Clock,
    last_write_at: Option<DateTime<Utc>>,
    time_dirty: bool,
}

impl ProgressStore {
    /// A store with fresh progress; nothing is read from storage.
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>, key: impl Into<String>, clock: Clock) -> Self {
        Self::with_state(repo, key.into(), clock, ProgressState::new())
    }

    /// Load persisted progress for `key`, falling back to defaults when
    /// nothing is stored or the read fails.
    pub async fn open(repo: Arc<dyn ProgressRepository>, key: impl Into<String>, clock: Clock) -> Self {
        let key = key.into();
        let state = match repo.load_progress(&key).await {
            Ok(Some(snapshot)) => ProgressState::from_snapshot(snapshot),
            Ok(None) => ProgressState::new(),
            Err(err) => {
                tracing::warn!(%err, key = %key, "failed to load progress; starting fresh");
                ProgressState::new()
            }
        };
        Self::with_state(repo, key, clock, state)
    }

    fn with_state(
        repo: Arc<dyn ProgressRepository>,
        key: String,
        clock: Clock,
        state: ProgressState,
    ) -> Self {
        Self {
            key,
            state,
            repo,
            clock,
            last_write_at: None,
            time_dirty: false,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Whether a time update is waiting for its durable write.
    #[must_use]
    pub fn has_pending_time(&self) -> bool {
        self.time_dirty
    }

    /// Record the play-head position.
    ///
    /// Durable writes for time alone are spaced by
    /// [`TIME_WRITE_INTERVAL_SECS`]; skipped writes stay pending until the
    /// next write of any kind or [`ProgressStore::flush`].
    pub async fn record_time(&mut self, t: f64) -> Mutation<()> {
        self.track_time(t);
        self.write_time_if_due().await
    }

    /// Update the in-memory play-head without touching storage.
    pub fn track_time(&mut self, t: f64) {
        self.state.record_time(t);
        self.time_dirty = true;
    }

    /// Write a pending time update if the debounce interval has passed.
    pub async fn write_time_if_due(&mut self) -> Mutation<()> {
        if !self.time_dirty {
            return Mutation::clean(());
        }
        let due = self.last_write_at.is_none_or(|at| {
            self.clock.since(at) >= Duration::seconds(TIME_WRITE_INTERVAL_SECS)
        });
        if !due {
            tracing::debug!(
                time = self.state.current_video_time(),
                "deferring time write"
            );
            return Mutation::clean(());
        }
        let persisted = self.persist().await;
        Mutation {
            value: (),
            persisted,
        }
    }

    /// Mark `id` completed and clear the active interaction.
    ///
    /// The value is `true` only for a first-time completion.
    pub async fn complete_interaction(&mut self, id: &InteractionId) -> Mutation<bool> {
        let first_time = self.state.complete_interaction(id);
        if first_time {
            tracing::info!(interaction = %id, "interaction completed");
        }
        let persisted = self.persist().await;
        Mutation {
            value: first_time,
            persisted,
        }
    }

    pub async fn unlock_story_step(&mut self, step: StoryStepId) -> Mutation<bool> {
        let unlocked = self.state.unlock_story_step(step);
        let persisted = self.persist().await;
        Mutation {
            value: unlocked,
            persisted,
        }
    }

    pub async fn unlock_secret(&mut self, secret: SecretId) -> Mutation<bool> {
        let unlocked = self.state.unlock_secret(secret);
        let persisted = self.persist().await;
        Mutation {
            value: unlocked,
            persisted,
        }
    }

    /// Count an attempt regardless of score; the value is the new attempt count.
    pub async fn log_quiz_attempt(&mut self, id: &InteractionId, score: u32) -> Mutation<u32> {
        let attempts = self.state.log_quiz_attempt(id);
        tracing::info!(interaction = %id, score, attempts, "quiz attempt logged");
        let persisted = self.persist().await;
        Mutation {
            value: attempts,
            persisted,
        }
    }

    pub async fn set_view_mode(&mut self, mode: ViewMode) -> Mutation<()> {
        self.state.set_view_mode(mode);
        let persisted = self.persist().await;
        Mutation {
            value: (),
            persisted,
        }
    }

    /// Transient; never written to storage.
    pub fn set_playing(&mut self, playing: bool) {
        self.state.set_playing(playing);
    }

    /// Transient; never written to storage.
    pub fn set_active_interaction(&mut self, id: Option<InteractionId>) {
        self.state.set_active_interaction(id);
    }

    /// Write any pending time update now.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the durable write fails.
    pub async fn flush(&mut self) -> Result<(), StorageError> {
        if !self.time_dirty {
            return Ok(());
        }
        self.persist().await
    }

    async fn persist(&mut self) -> Result<(), StorageError> {
        let snapshot = self.state.snapshot();
        match self.repo.save_progress(&self.key, &snapshot).await {
            Ok(()) => {
                self.last_write_at = Some(self.clock.now());
                self.time_dirty = false;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, key = %self.key, "failed to persist progress");
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("last_write_at", &self.last_write_at)
            .field("time_dirty", &self.time_dirty)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
