use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::model::{Checkpoint, InteractionId, ProgressState};
use crate::registry::{CheckpointRegistry, in_window};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimelineError {
    #[error("no interaction is active")]
    NotLocked,

    #[error("interaction {active} is active, not {completed}")]
    UnexpectedCompletion {
        active: InteractionId,
        completed: InteractionId,
    },
}

//
// ─── STATE MACHINE ─────────────────────────────────────────────────────────────
//

/// Controller state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimelinePhase {
    /// Watching time; no interaction is active.
    #[default]
    Idle,
    /// Playback paused until the interaction completes.
    Locked(InteractionId),
}

/// Side effects requested by the controller, in the order they must run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineCommand {
    Pause,
    Activate(InteractionId),
    Resume,
    /// A log-only checkpoint was passed.
    Reached(InteractionId),
}

/// Decides when the play-head hits a checkpoint and when playback may resume.
///
/// Time updates must be fed one at a time; each call fully applies its
/// transition before returning, so two updates can never both observe `Idle`
/// and both trigger.
#[derive(Debug, Clone)]
pub struct TimelineController {
    registry: Arc<CheckpointRegistry>,
    phase: TimelinePhase,
    last_triggered_second: Option<i64>,
    /// Log-only checkpoints already announced in this session.
    announced: BTreeSet<InteractionId>,
}

impl TimelineController {
    #[must_use]
    pub fn new(registry: Arc<CheckpointRegistry>) -> Self {
        Self {
            registry,
            phase: TimelinePhase::Idle,
            last_triggered_second: None,
            announced: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &CheckpointRegistry {
        &self.registry
    }

    #[must_use]
    pub fn phase(&self) -> &TimelinePhase {
        &self.phase
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self.phase, TimelinePhase::Locked(_))
    }

    #[must_use]
    pub fn active_interaction(&self) -> Option<&InteractionId> {
        match &self.phase {
            TimelinePhase::Locked(id) => Some(id),
            TimelinePhase::Idle => None,
        }
    }

    /// Feed one time update.
    ///
    /// Returns the commands to run; empty when nothing fires. Updates that
    /// arrive while locked are ignored.
    pub fn observe(&mut self, t: f64, progress: &ProgressState) -> Vec<TimelineCommand> {
        if self.is_locked() {
            return Vec::new();
        }
        if !t.is_finite() {
            tracing::warn!(time = t, "ignoring non-finite time update");
            return Vec::new();
        }

        let Some(checkpoint) = self
            .registry
            .ordered()
            .iter()
            .find(|c| in_window(c, t) && !self.is_settled(c, progress))
        else {
            return Vec::new();
        };

        let id = checkpoint.interaction_id.clone();
        if !checkpoint.pauses() {
            // Announced once; never touches the pause guard.
            self.announced.insert(id.clone());
            tracing::info!(interaction = %id, time = t, "checkpoint reached");
            return vec![TimelineCommand::Reached(id)];
        }

        #[allow(clippy::cast_possible_truncation)]
        let second = t.floor() as i64;
        if self.last_triggered_second == Some(second) {
            return Vec::new();
        }
        self.last_triggered_second = Some(second);

        if self.registry.lookup(&id).is_none() {
            tracing::warn!(
                interaction = %id,
                time = t,
                "checkpoint has no interaction definition; staying idle"
            );
            return Vec::new();
        }

        tracing::info!(
            interaction = %id,
            trigger_time = checkpoint.trigger_time,
            time = t,
            "triggering interaction"
        );
        self.phase = TimelinePhase::Locked(id.clone());
        vec![TimelineCommand::Pause, TimelineCommand::Activate(id)]
    }

    fn is_settled(&self, checkpoint: &Checkpoint, progress: &ProgressState) -> bool {
        if checkpoint.pauses() {
            progress.is_completed(&checkpoint.interaction_id)
        } else {
            self.announced.contains(&checkpoint.interaction_id)
        }
    }

    /// Leave `Locked` once the active interaction is completed.
    ///
    /// # Errors
    ///
    /// Returns `TimelineError::NotLocked` when idle, or
    /// `TimelineError::UnexpectedCompletion` when `id` is not the active one.
    pub fn complete(&mut self, id: &InteractionId) -> Result<TimelineCommand, TimelineError> {
        match &self.phase {
            TimelinePhase::Idle => Err(TimelineError::NotLocked),
            TimelinePhase::Locked(active) if active != id => {
                Err(TimelineError::UnexpectedCompletion {
                    active: active.clone(),
                    completed: id.clone(),
                })
            }
            TimelinePhase::Locked(_) => {
                self.phase = TimelinePhase::Idle;
                Ok(TimelineCommand::Resume)
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
