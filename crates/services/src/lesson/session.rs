use std::sync::Arc;

use lab_core::model::{
    InteractionId, LessonConfig, LessonDefinition, ProgressState, Response, ResponseError,
    SecretId, StoryStepId, ViewMode,
};
use lab_core::{CheckpointRegistry, Clock, TimelineCommand, TimelineController, TimelinePhase};
use storage::repository::ProgressRepository;

use super::progress::LessonProgress;
use crate::error::{LessonError, ResolverError};
use crate::playback::{EventReceiver, PlaybackAdapter, PlaybackEvent, PlayerState};
use crate::progress_store::{Mutation, ProgressStore};
use crate::resolver::{ActiveInteraction, AttemptOutcome, Closed, InteractionResolver};

/// What a handled playback event meant for the learner.
#[derive(Debug, Clone, PartialEq)]
pub enum LessonEvent {
    /// The player loaded; `resumed_at` is set when playback jumped to the
    /// saved position.
    Ready {
        duration: f64,
        resumed_at: Option<f64>,
    },
    /// Playback paused and the interaction is waiting for the learner.
    Activated(InteractionId),
    /// A log-only checkpoint passed.
    Reached(InteractionId),
    /// The interaction completed and playback continued.
    Resumed(InteractionId),
    Ended,
}

impl LessonEvent {
    /// Whether the session is waiting on the learner or the video is over.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, LessonEvent::Activated(_) | LessonEvent::Ended)
    }
}

/// Orchestrates one learner's pass through a video lesson.
///
/// Owns the player, the timeline state machine, the interaction resolver and
/// the progress store. Events are handled one at a time; each is fully
/// applied before the next is looked at.
pub struct LessonSession<P> {
    lesson: LessonConfig,
    registry: Arc<CheckpointRegistry>,
    timeline: TimelineController,
    resolver: InteractionResolver,
    store: ProgressStore,
    player: P,
}

impl<P: PlaybackAdapter> LessonSession<P> {
    /// Validate the lesson and restore saved progress for `key`.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Config` or `LessonError::Registry` when the
    /// lesson is misconfigured. Storage read failures are not errors; the
    /// session starts fresh instead.
    pub async fn open(
        definition: &LessonDefinition,
        repo: Arc<dyn ProgressRepository>,
        key: impl Into<String>,
        clock: Clock,
        player: P,
    ) -> Result<Self, LessonError> {
        definition.lesson.validate()?;
        let registry = Arc::new(definition.registry()?);
        let store = ProgressStore::open(repo, key, clock).await;
        tracing::info!(
            lesson = %definition.lesson.lesson_id,
            checkpoints = registry.len(),
            completed = store.state().completed_interactions().len(),
            resume_at = store.state().current_video_time(),
            "lesson session opened"
        );

        Ok(Self {
            lesson: definition.lesson.clone(),
            timeline: TimelineController::new(Arc::clone(&registry)),
            resolver: InteractionResolver::new(Arc::clone(&registry)),
            registry,
            store,
            player,
        })
    }

    #[must_use]
    pub fn lesson(&self) -> &LessonConfig {
        &self.lesson
    }

    #[must_use]
    pub fn registry(&self) -> &CheckpointRegistry {
        &self.registry
    }

    #[must_use]
    pub fn state(&self) -> &ProgressState {
        self.store.state()
    }

    #[must_use]
    pub fn phase(&self) -> &TimelinePhase {
        self.timeline.phase()
    }

    #[must_use]
    pub fn active(&self) -> Option<&ActiveInteraction> {
        self.resolver.active()
    }

    #[must_use]
    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    #[must_use]
    pub fn progress(&self) -> LessonProgress {
        LessonProgress::compute(&self.registry, self.store.state(), self.lesson.duration_secs)
    }

    // ─── EVENTS ────────────────────────────────────────────────────────────────

    /// Apply one playback event.
    ///
    /// Write failures do not stop the lesson; they come back in
    /// [`Mutation::persisted`] next to the events.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Playback` if the player rejects a command.
    pub async fn handle(
        &mut self,
        event: PlaybackEvent,
    ) -> Result<Mutation<Vec<LessonEvent>>, LessonError> {
        match event {
            PlaybackEvent::Ready { duration } => {
                let saved = self.store.state().current_video_time();
                let resumed_at = if saved > 0.0 && saved < duration {
                    self.player.seek(saved)?;
                    tracing::info!(time = saved, "resuming at saved position");
                    Some(saved)
                } else {
                    None
                };
                Ok(Mutation::clean(vec![LessonEvent::Ready {
                    duration,
                    resumed_at,
                }]))
            }
            PlaybackEvent::TimeUpdate(t) => self.on_time(t).await,
            PlaybackEvent::StateChanged(state) => {
                self.store.set_playing(state == PlayerState::Playing);
                Ok(Mutation::clean(Vec::new()))
            }
            PlaybackEvent::Ended => {
                self.store.set_playing(false);
                let persisted = self.store.flush().await;
                tracing::info!(lesson = %self.lesson.lesson_id, "video ended");
                Ok(Mutation {
                    value: vec![LessonEvent::Ended],
                    persisted,
                })
            }
        }
    }

    /// Handle events until one needs the learner, the video ends, or the
    /// stream closes.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`LessonSession::handle`]; the first
    /// write failure is kept in [`Mutation::persisted`].
    pub async fn run(
        &mut self,
        events: &mut EventReceiver,
    ) -> Result<Mutation<Vec<LessonEvent>>, LessonError> {
        let mut out = Mutation::clean(Vec::new());
        while let Some(event) = events.recv().await {
            let handled = self.handle(event).await?;
            let blocking = handled.value.iter().any(LessonEvent::is_blocking);
            out.value.extend(handled.value);
            out.absorb(handled.persisted);
            if blocking {
                break;
            }
        }
        Ok(out)
    }

    /// Handle every event already queued without waiting for more.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`LessonSession::handle`]; the first
    /// write failure is kept in [`Mutation::persisted`].
    pub async fn pump(
        &mut self,
        events: &mut EventReceiver,
    ) -> Result<Mutation<Vec<LessonEvent>>, LessonError> {
        let mut out = Mutation::clean(Vec::new());
        while let Ok(event) = events.try_recv() {
            let handled = self.handle(event).await?;
            out.value.extend(handled.value);
            out.absorb(handled.persisted);
        }
        Ok(out)
    }

    async fn on_time(&mut self, t: f64) -> Result<Mutation<Vec<LessonEvent>>, LessonError> {
        if self.timeline.is_locked() {
            return Ok(Mutation::clean(Vec::new()));
        }
        self.store.track_time(t);

        let mut events = Vec::new();
        for command in self.timeline.observe(t, self.store.state()) {
            self.apply(command, &mut events)?;
        }
        // The transition is already applied; a slow store only delays the write.
        let written = self.store.write_time_if_due().await;
        Ok(written.map(|()| events))
    }

    fn apply(
        &mut self,
        command: TimelineCommand,
        events: &mut Vec<LessonEvent>,
    ) -> Result<(), LessonError> {
        match command {
            TimelineCommand::Pause => {
                self.player.pause()?;
                self.store.set_playing(false);
            }
            TimelineCommand::Activate(id) => match self.resolver.activate(&id).map(|_| ()) {
                Ok(()) => {
                    self.store.set_active_interaction(Some(id.clone()));
                    events.push(LessonEvent::Activated(id));
                }
                Err(err) => {
                    tracing::warn!(%err, interaction = %id, "cannot show interaction; resuming");
                    let resume = self.timeline.complete(&id)?;
                    self.apply(resume, events)?;
                }
            },
            TimelineCommand::Resume => {
                self.store.set_playing(true);
                self.player.play()?;
            }
            TimelineCommand::Reached(id) => events.push(LessonEvent::Reached(id)),
        }
        Ok(())
    }

    // ─── LEARNER ACTIONS ───────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `LessonError::Locked` while an interaction blocks playback.
    pub fn play(&mut self) -> Result<(), LessonError> {
        self.ensure_unlocked()?;
        self.player.play()?;
        self.store.set_playing(true);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `LessonError::Playback` if the player cannot pause.
    pub fn pause(&mut self) -> Result<(), LessonError> {
        self.player.pause()?;
        self.store.set_playing(false);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `LessonError::Locked` while an interaction blocks playback, or
    /// `LessonError::Playback` for an invalid position.
    pub fn seek(&mut self, t: f64) -> Result<(), LessonError> {
        self.ensure_unlocked()?;
        self.player.seek(t)?;
        Ok(())
    }

    /// # Errors
    ///
    /// See [`InteractionResolver::select_option`].
    pub fn select_option(&mut self, option_id: &str) -> Result<(), LessonError> {
        Ok(self.resolver.select_option(option_id)?)
    }

    /// # Errors
    ///
    /// See [`InteractionResolver::place`].
    pub fn place(&mut self, item_id: &str, target_id: &str) -> Result<(), LessonError> {
        Ok(self.resolver.place(item_id, target_id)?)
    }

    /// # Errors
    ///
    /// See [`InteractionResolver::unplace`].
    pub fn unplace(&mut self, target_id: &str) -> Result<Option<String>, LessonError> {
        Ok(self.resolver.unplace(target_id)?)
    }

    /// Grade a response for the active interaction.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Resolver` when nothing is active, the interaction
    /// was already answered, or the response is invalid.
    pub async fn submit(
        &mut self,
        response: &Response,
    ) -> Result<Mutation<AttemptOutcome>, LessonError> {
        let id = self
            .timeline
            .active_interaction()
            .cloned()
            .ok_or(ResolverError::NotActive)?;
        Ok(self.resolver.submit(&mut self.store, &id, response).await?)
    }

    /// Grade whatever the learner has selected or placed so far.
    ///
    /// # Errors
    ///
    /// As [`LessonSession::submit`]; an empty draft is an incomplete response.
    pub async fn submit_draft(&mut self) -> Result<Mutation<AttemptOutcome>, LessonError> {
        let active = self.resolver.active().ok_or(ResolverError::NotActive)?;
        let response = active.draft_response().ok_or_else(|| {
            ResolverError::InvalidResponse(ResponseError::Incomplete {
                placed: 0,
                required: active.definition().required_placements(),
            })
        })?;
        self.submit(&response).await
    }

    /// Close the answered interaction and resume playback.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Resolver` if nothing was answered, or
    /// `LessonError::Playback` if the player cannot resume.
    pub async fn acknowledge(&mut self) -> Result<Mutation<LessonEvent>, LessonError> {
        let closed = self.resolver.acknowledge(&mut self.store).await?;
        self.resume_after(closed)
    }

    /// Skip an optional interaction and resume playback.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Resolver` when the interaction is mandatory.
    pub async fn dismiss(&mut self) -> Result<Mutation<LessonEvent>, LessonError> {
        let closed = self.resolver.dismiss(&mut self.store).await?;
        self.resume_after(closed)
    }

    fn resume_after(&mut self, closed: Mutation<Closed>) -> Result<Mutation<LessonEvent>, LessonError> {
        let Mutation {
            value: closed,
            persisted,
        } = closed;
        let command = self.timeline.complete(&closed.interaction_id)?;
        let mut events = Vec::new();
        self.apply(command, &mut events)?;
        tracing::info!(
            interaction = %closed.interaction_id,
            first_completion = closed.first_completion,
            "playback resumed"
        );
        Ok(Mutation {
            value: LessonEvent::Resumed(closed.interaction_id),
            persisted,
        })
    }

    // ─── PROGRESS ──────────────────────────────────────────────────────────────

    /// Unlock story step `step`; steps open in order.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::StoryStepLocked` unless `step` is the first
    /// step or follows an unlocked one.
    pub async fn unlock_story_step(
        &mut self,
        step: StoryStepId,
    ) -> Result<Mutation<bool>, LessonError> {
        if step < StoryStepId::FIRST {
            return Err(LessonError::StoryStepLocked {
                step,
                requires: StoryStepId::FIRST,
            });
        }
        if let Some(previous) = step.previous() {
            if !self.store.state().is_story_step_unlocked(previous) {
                return Err(LessonError::StoryStepLocked {
                    step,
                    requires: previous,
                });
            }
        }
        Ok(self.store.unlock_story_step(step).await)
    }

    pub async fn unlock_secret(&mut self, secret: SecretId) -> Mutation<bool> {
        self.store.unlock_secret(secret).await
    }

    pub async fn set_view_mode(&mut self, mode: ViewMode) -> Mutation<()> {
        self.store.set_view_mode(mode).await
    }

    /// Write any pending time update.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Storage` if the write fails.
    pub async fn flush(&mut self) -> Result<(), LessonError> {
        Ok(self.store.flush().await?)
    }

    fn ensure_unlocked(&self) -> Result<(), LessonError> {
        match self.timeline.active_interaction() {
            Some(id) => Err(LessonError::Locked(id.clone())),
            None => Ok(()),
        }
    }
}
