use lab_core::CheckpointRegistry;
use lab_core::model::{ProgressState, ViewMode};

/// Aggregated view of lesson progress, useful for UI.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonProgress {
    /// Pausing checkpoints whose interaction is completed.
    pub completed: usize,
    /// Pausing checkpoints in the lesson.
    pub total: usize,
    pub percentage: f64,
    /// Attempts logged across all interactions.
    pub attempts: u32,
    pub story_steps: usize,
    pub secrets: usize,
    pub view_mode: ViewMode,
    pub current_time: f64,
    pub duration: f64,
}

impl LessonProgress {
    #[must_use]
    pub fn compute(registry: &CheckpointRegistry, state: &ProgressState, duration: f64) -> Self {
        let pausing = registry.ordered().iter().filter(|c| c.pauses());
        let (total, completed) = pausing.fold((0, 0), |(total, completed), c| {
            let done = usize::from(state.is_completed(&c.interaction_id));
            (total + 1, completed + done)
        });
        #[allow(clippy::cast_precision_loss)]
        let percentage = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };

        Self {
            completed,
            total,
            percentage,
            attempts: state.quiz_attempts().values().sum(),
            story_steps: state.unlocked_story_steps().len(),
            secrets: state.unlocked_secrets().len(),
            view_mode: state.view_mode(),
            current_time: state.current_video_time(),
            duration,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_core::model::{InteractionId, LessonDefinition, SecretId};

    #[test]
    fn counts_completed_checkpoints() {
        let lesson = LessonDefinition::earth_observation_101().unwrap();
        let registry = lesson.registry().unwrap();
        let mut state = ProgressState::new();
        state.complete_interaction(&InteractionId::new("orbit_identification_1").unwrap());
        state.log_quiz_attempt(&InteractionId::new("orbit_identification_1").unwrap());
        state.log_quiz_attempt(&InteractionId::new("final_scenario_4").unwrap());
        state.unlock_secret(SecretId::new(3));
        state.record_time(31.0);

        let progress = LessonProgress::compute(&registry, &state, lesson.lesson.duration_secs);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.percentage, 25.0);
        assert_eq!(progress.attempts, 2);
        assert_eq!(progress.story_steps, 1);
        assert_eq!(progress.secrets, 1);
        assert_eq!(progress.current_time, 31.0);
        assert_eq!(progress.duration, 240.0);
        assert!(!progress.is_complete());
    }

    #[test]
    fn empty_lesson_is_zero_percent() {
        let registry = CheckpointRegistry::new(Vec::new(), Vec::new()).unwrap();
        let progress = LessonProgress::compute(&registry, &ProgressState::new(), 60.0);
        assert_eq!(progress.percentage, 0.0);
        assert!(!progress.is_complete());
    }
}
