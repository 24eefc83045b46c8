use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::ids::{InteractionId, ParseIdError, SecretId, StoryStepId};

//
// ─── VIEW MODE ─────────────────────────────────────────────────────────────────
//

/// Visualization layer preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewMode {
    /// What the human eye would see.
    #[default]
    #[serde(rename = "human", alias = "optical")]
    Optical,
    /// Thermal / multi-band satellite layers.
    #[serde(rename = "satellite", alias = "spectral")]
    Spectral,
}

impl ViewMode {
    /// Stable persisted name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Optical => "human",
            ViewMode::Spectral => "satellite",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "optical" => Ok(ViewMode::Optical),
            "satellite" | "spectral" => Ok(ViewMode::Spectral),
            _ => Err(ParseIdError::new("ViewMode")),
        }
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// The durable subset of a lesson session's progress.
///
/// Transient fields (active interaction, playing flag) are deliberately absent
/// so a reload can never come back mid-interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub current_video_time: f64,
    pub completed_interactions: BTreeSet<InteractionId>,
    pub quiz_attempts: BTreeMap<InteractionId, u32>,
    pub unlocked_secrets: BTreeSet<SecretId>,
    pub unlocked_story_steps: BTreeSet<StoryStepId>,
    pub view_mode: ViewMode,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            current_video_time: 0.0,
            completed_interactions: BTreeSet::new(),
            quiz_attempts: BTreeMap::new(),
            unlocked_secrets: BTreeSet::new(),
            unlocked_story_steps: BTreeSet::from([StoryStepId::FIRST]),
            view_mode: ViewMode::default(),
        }
    }
}

//
// ─── PROGRESS STATE ────────────────────────────────────────────────────────────
//

/// Full progress of a lesson session: durable fields plus transient flags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressState {
    durable: ProgressSnapshot,
    active_interaction: Option<InteractionId>,
    is_playing: bool,
}

impl ProgressState {
    /// Fresh state with seeded defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate from a persisted snapshot.
    ///
    /// Transient fields always reset, the first story step stays unlocked and
    /// a non-finite or negative time falls back to 0.
    #[must_use]
    pub fn from_snapshot(mut snapshot: ProgressSnapshot) -> Self {
        snapshot.unlocked_story_steps.insert(StoryStepId::FIRST);
        snapshot.current_video_time = sanitize_time(snapshot.current_video_time);
        Self {
            durable: snapshot,
            active_interaction: None,
            is_playing: false,
        }
    }

    /// Copy of the durable subset.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.durable.clone()
    }

    #[must_use]
    pub fn current_video_time(&self) -> f64 {
        self.durable.current_video_time
    }

    #[must_use]
    pub fn completed_interactions(&self) -> &BTreeSet<InteractionId> {
        &self.durable.completed_interactions
    }

    #[must_use]
    pub fn is_completed(&self, id: &InteractionId) -> bool {
        self.durable.completed_interactions.contains(id)
    }

    #[must_use]
    pub fn quiz_attempts(&self) -> &BTreeMap<InteractionId, u32> {
        &self.durable.quiz_attempts
    }

    #[must_use]
    pub fn attempts(&self, id: &InteractionId) -> u32 {
        self.durable.quiz_attempts.get(id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn unlocked_story_steps(&self) -> &BTreeSet<StoryStepId> {
        &self.durable.unlocked_story_steps
    }

    #[must_use]
    pub fn is_story_step_unlocked(&self, step: StoryStepId) -> bool {
        self.durable.unlocked_story_steps.contains(&step)
    }

    #[must_use]
    pub fn unlocked_secrets(&self) -> &BTreeSet<SecretId> {
        &self.durable.unlocked_secrets
    }

    #[must_use]
    pub fn view_mode(&self) -> ViewMode {
        self.durable.view_mode
    }

    #[must_use]
    pub fn active_interaction(&self) -> Option<&InteractionId> {
        self.active_interaction.as_ref()
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn record_time(&mut self, t: f64) {
        self.durable.current_video_time = sanitize_time(t);
    }

    /// Mark an interaction done and clear the active one.
    ///
    /// Returns `true` only the first time `id` is completed.
    pub fn complete_interaction(&mut self, id: &InteractionId) -> bool {
        self.active_interaction = None;
        self.durable.completed_interactions.insert(id.clone())
    }

    /// Returns `true` if the step was newly unlocked.
    pub fn unlock_story_step(&mut self, step: StoryStepId) -> bool {
        self.durable.unlocked_story_steps.insert(step)
    }

    /// Returns `true` if the secret was newly unlocked.
    pub fn unlock_secret(&mut self, secret: SecretId) -> bool {
        self.durable.unlocked_secrets.insert(secret)
    }

    /// Count one more attempt for `id` and return the new total.
    pub fn log_quiz_attempt(&mut self, id: &InteractionId) -> u32 {
        let count = self.durable.quiz_attempts.entry(id.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.durable.view_mode = mode;
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
    }

    pub fn set_active_interaction(&mut self, id: Option<InteractionId>) {
        self.active_interaction = id;
    }
}

fn sanitize_time(t: f64) -> f64 {
    if t.is_finite() && t > 0.0 { t } else { 0.0 }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> InteractionId {
        InteractionId::new(raw).unwrap()
    }

    #[test]
    fn new_state_is_seeded() {
        let state = ProgressState::new();
        assert!(state.is_story_step_unlocked(StoryStepId::FIRST));
        assert_eq!(state.unlocked_story_steps().len(), 1);
        assert_eq!(state.view_mode(), ViewMode::Optical);
        assert!(state.active_interaction().is_none());
        assert!(!state.is_playing());
    }

    #[test]
    fn complete_interaction_is_idempotent() {
        let mut state = ProgressState::new();
        state.set_active_interaction(Some(id("q1")));
        assert!(state.complete_interaction(&id("q1")));
        let once = state.clone();

        state.set_active_interaction(Some(id("q1")));
        assert!(!state.complete_interaction(&id("q1")));
        assert_eq!(state, once);
        assert!(state.active_interaction().is_none());
    }

    #[test]
    fn attempts_increment_per_call() {
        let mut state = ProgressState::new();
        assert_eq!(state.log_quiz_attempt(&id("q1")), 1);
        assert_eq!(state.log_quiz_attempt(&id("q1")), 2);
        assert_eq!(state.attempts(&id("q1")), 2);
        assert_eq!(state.attempts(&id("q2")), 0);
    }

    #[test]
    fn from_snapshot_resets_transient_fields() {
        let mut state = ProgressState::new();
        state.set_playing(true);
        state.set_active_interaction(Some(id("q1")));
        state.record_time(42.5);

        let restored = ProgressState::from_snapshot(state.snapshot());
        assert!(!restored.is_playing());
        assert!(restored.active_interaction().is_none());
        assert_eq!(restored.current_video_time(), 42.5);
    }

    #[test]
    fn from_snapshot_keeps_first_step_and_sanitizes_time() {
        let snapshot = ProgressSnapshot {
            current_video_time: f64::NAN,
            unlocked_story_steps: BTreeSet::from([StoryStepId::new(3)]),
            ..ProgressSnapshot::default()
        };
        let state = ProgressState::from_snapshot(snapshot);
        assert_eq!(state.current_video_time(), 0.0);
        assert!(state.is_story_step_unlocked(StoryStepId::FIRST));
        assert!(state.is_story_step_unlocked(StoryStepId::new(3)));
    }

    #[test]
    fn view_mode_names() {
        assert_eq!("satellite".parse::<ViewMode>().unwrap(), ViewMode::Spectral);
        assert_eq!("Optical".parse::<ViewMode>().unwrap(), ViewMode::Optical);
        assert!("radar".parse::<ViewMode>().is_err());
        assert_eq!(serde_json::to_string(&ViewMode::Spectral).unwrap(), "\"satellite\"");
        let parsed: ViewMode = serde_json::from_str("\"spectral\"").unwrap();
        assert_eq!(parsed, ViewMode::Spectral);
    }
}
