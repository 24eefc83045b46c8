use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::model::{Checkpoint, DefinitionError, InteractionDefinition, InteractionId};

/// Half-width of the band around a checkpoint's trigger time, in seconds.
pub const TRIGGER_TOLERANCE_SECS: f64 = 0.5;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("checkpoint {id} has invalid trigger time {time}")]
    InvalidTriggerTime { id: InteractionId, time: f64 },

    #[error("interaction {id} is used by more than one checkpoint")]
    DuplicateCheckpoint { id: InteractionId },

    #[error("interaction {id} is defined more than once")]
    DuplicateDefinition { id: InteractionId },

    #[error("trigger windows of {first} and {second} overlap ({gap}s apart)")]
    OverlappingWindows {
        first: InteractionId,
        second: InteractionId,
        gap: f64,
    },

    #[error("checkpoint {id} has no interaction definition")]
    MissingDefinition { id: InteractionId },

    #[error(transparent)]
    InvalidDefinition(#[from] DefinitionError),
}

/// Immutable, validated timeline of checkpoints plus the interaction catalog.
///
/// Construction guarantees: checkpoints are sorted by trigger time, their
/// trigger windows never overlap, each interaction id is used once, and every
/// checkpoint resolves to a definition.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRegistry {
    checkpoints: Vec<Checkpoint>,
    catalog: BTreeMap<InteractionId, InteractionDefinition>,
}

impl CheckpointRegistry {
    /// Validate and build a registry.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if the configuration is inconsistent.
    pub fn new(
        mut checkpoints: Vec<Checkpoint>,
        definitions: Vec<InteractionDefinition>,
    ) -> Result<Self, RegistryError> {
        let mut catalog = BTreeMap::new();
        for definition in definitions {
            definition.validate()?;
            let correct = definition.correct_option_count();
            if let Some(count) = correct.filter(|count| *count != 1) {
                tracing::warn!(
                    interaction = %definition.id,
                    correct_options = count,
                    "choice interaction does not have exactly one correct option"
                );
            }
            let id = definition.id.clone();
            if catalog.insert(id.clone(), definition).is_some() {
                return Err(RegistryError::DuplicateDefinition { id });
            }
        }

        let mut seen = BTreeSet::new();
        for checkpoint in &checkpoints {
            let time = checkpoint.trigger_time;
            if !time.is_finite() || time < 0.0 {
                return Err(RegistryError::InvalidTriggerTime {
                    id: checkpoint.interaction_id.clone(),
                    time,
                });
            }
            if !seen.insert(checkpoint.interaction_id.clone()) {
                return Err(RegistryError::DuplicateCheckpoint {
                    id: checkpoint.interaction_id.clone(),
                });
            }
            if !catalog.contains_key(&checkpoint.interaction_id) {
                return Err(RegistryError::MissingDefinition {
                    id: checkpoint.interaction_id.clone(),
                });
            }
        }

        checkpoints.sort_by(|a, b| a.trigger_time.total_cmp(&b.trigger_time));
        for pair in checkpoints.windows(2) {
            let gap = pair[1].trigger_time - pair[0].trigger_time;
            if gap < 2.0 * TRIGGER_TOLERANCE_SECS {
                return Err(RegistryError::OverlappingWindows {
                    first: pair[0].interaction_id.clone(),
                    second: pair[1].interaction_id.clone(),
                    gap,
                });
            }
        }

        Ok(Self {
            checkpoints,
            catalog,
        })
    }

    /// Build without validation. Only used to exercise desynchronized registries.
    #[cfg(test)]
    pub(crate) fn from_parts_unchecked(
        checkpoints: Vec<Checkpoint>,
        definitions: Vec<InteractionDefinition>,
    ) -> Self {
        Self {
            checkpoints,
            catalog: definitions
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect(),
        }
    }

    #[must_use]
    pub fn lookup(&self, id: &InteractionId) -> Option<&InteractionDefinition> {
        self.catalog.get(id)
    }

    /// Checkpoints ascending by trigger time.
    #[must_use]
    pub fn ordered(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    #[must_use]
    pub fn checkpoint(&self, id: &InteractionId) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| c.interaction_id == *id)
    }

    /// First checkpoint whose trigger window contains `t`.
    #[must_use]
    pub fn checkpoint_at(&self, t: f64) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| in_window(c, t))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &InteractionDefinition> {
        self.catalog.values()
    }

    /// Number of checkpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}

/// Whether `t` lies strictly inside the checkpoint's trigger window.
#[must_use]
pub fn in_window(checkpoint: &Checkpoint, t: f64) -> bool {
    (t - checkpoint.trigger_time).abs() < TRIGGER_TOLERANCE_SECS
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChoiceOption, DefinitionError, DragItem, DragTarget, InteractionKind};

    fn id(raw: &str) -> InteractionId {
        InteractionId::new(raw).unwrap()
    }

    fn definition(raw: &str) -> InteractionDefinition {
        InteractionDefinition {
            id: id(raw),
            question: format!("{raw}?"),
            explanation: String::new(),
            points: 100,
            kind: InteractionKind::Choice {
                options: vec![ChoiceOption {
                    id: "yes".into(),
                    label: "Yes".into(),
                    is_correct: true,
                }],
            },
        }
    }

    #[test]
    fn sorts_checkpoints_by_time() {
        let registry = CheckpointRegistry::new(
            vec![Checkpoint::pause(60.0, id("q2")), Checkpoint::pause(30.0, id("q1"))],
            vec![definition("q1"), definition("q2")],
        )
        .unwrap();
        let times: Vec<f64> = registry.ordered().iter().map(|c| c.trigger_time).collect();
        assert_eq!(times, vec![30.0, 60.0]);
        assert!(registry.lookup(&id("q1")).is_some());
        assert!(registry.lookup(&id("nope")).is_none());
    }

    #[test]
    fn rejects_duplicate_checkpoint_ids() {
        let err = CheckpointRegistry::new(
            vec![Checkpoint::pause(10.0, id("q1")), Checkpoint::pause(20.0, id("q1"))],
            vec![definition("q1")],
        )
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateCheckpoint { id: id("q1") });
    }

    #[test]
    fn rejects_duplicate_definitions() {
        let err = CheckpointRegistry::new(Vec::new(), vec![definition("q1"), definition("q1")])
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateDefinition { id: id("q1") });
    }

    #[test]
    fn rejects_overlapping_windows() {
        let err = CheckpointRegistry::new(
            vec![Checkpoint::pause(30.0, id("q1")), Checkpoint::pause(30.6, id("q2"))],
            vec![definition("q1"), definition("q2")],
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::OverlappingWindows { .. }));
    }

    #[test]
    fn accepts_windows_that_just_touch() {
        let registry = CheckpointRegistry::new(
            vec![Checkpoint::pause(30.0, id("q1")), Checkpoint::pause(31.0, id("q2"))],
            vec![definition("q1"), definition("q2")],
        )
        .unwrap();
        assert_eq!(registry.checkpoint_at(30.5), None);
        assert_eq!(
            registry.checkpoint_at(30.6).map(|c| c.interaction_id.as_str()),
            Some("q2")
        );
    }

    #[test]
    fn rejects_dangling_interaction() {
        let err = CheckpointRegistry::new(vec![Checkpoint::pause(5.0, id("ghost"))], Vec::new())
            .unwrap_err();
        assert_eq!(err, RegistryError::MissingDefinition { id: id("ghost") });
    }

    #[test]
    fn rejects_negative_or_nan_time() {
        let err = CheckpointRegistry::new(
            vec![Checkpoint::pause(-1.0, id("q1"))],
            vec![definition("q1")],
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTriggerTime { .. }));

        let err = CheckpointRegistry::new(
            vec![Checkpoint::pause(f64::NAN, id("q1"))],
            vec![definition("q1")],
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTriggerTime { .. }));
    }

    #[test]
    fn rejects_drag_match_that_can_never_be_filled() {
        let unfillable = InteractionDefinition {
            id: id("dm"),
            question: "Match".into(),
            explanation: String::new(),
            points: 150,
            kind: InteractionKind::DragMatch {
                items: vec![DragItem {
                    id: "i1".into(),
                    label: "I1".into(),
                    target_id: "t1".into(),
                }],
                targets: vec![
                    DragTarget {
                        id: "t1".into(),
                        label: "T1".into(),
                    },
                    DragTarget {
                        id: "t2".into(),
                        label: "T2".into(),
                    },
                ],
            },
        };
        let err = CheckpointRegistry::new(vec![Checkpoint::pause(10.0, id("dm"))], vec![unfillable])
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::InvalidDefinition(DefinitionError::TooFewItems {
                id: id("dm"),
                items: 1,
                targets: 2,
            })
        );
    }

    #[test]
    fn window_is_exclusive_at_the_edge() {
        let cp = Checkpoint::pause(30.0, id("q1"));
        assert!(in_window(&cp, 29.51));
        assert!(in_window(&cp, 30.49));
        assert!(!in_window(&cp, 30.5));
        assert!(!in_window(&cp, 29.5));
    }
}
