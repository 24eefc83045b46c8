use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::InteractionId;

//
// ─── DEFINITIONS ───────────────────────────────────────────────────────────────
//

/// One answer option of a single-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
    #[serde(alias = "valid")]
    pub is_correct: bool,
}

/// A draggable item and the target it belongs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragItem {
    pub id: String,
    pub label: String,
    #[serde(alias = "matchesTargetId")]
    pub target_id: String,
}

/// A drop zone for drag-match interactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragTarget {
    pub id: String,
    pub label: String,
}

/// The interaction variant, resolved once when the catalog is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionKind {
    Choice {
        options: Vec<ChoiceOption>,
    },
    #[serde(rename = "drag_drop", alias = "drag_match")]
    DragMatch {
        #[serde(rename = "dragItems")]
        items: Vec<DragItem>,
        #[serde(rename = "dragTargets")]
        targets: Vec<DragTarget>,
    },
}

/// A quiz or challenge shown at a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionDefinition {
    pub id: InteractionId,
    pub question: String,
    #[serde(default)]
    pub explanation: String,
    /// Reward for a correct answer.
    #[serde(default)]
    pub points: u32,
    #[serde(flatten)]
    pub kind: InteractionKind,
}

/// A player's answer to an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The chosen option id.
    Choice(String),
    /// Placements keyed by target id, valued by the placed item id.
    DragMatch(BTreeMap<String, String>),
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DefinitionError {
    #[error("interaction {id} has no options")]
    NoOptions { id: InteractionId },

    #[error("interaction {id} needs at least one item and one target")]
    NoDragElements { id: InteractionId },

    #[error("interaction {id} has duplicate element id {element}")]
    DuplicateElement { id: InteractionId, element: String },

    #[error("interaction {id} has a blank element id")]
    BlankElement { id: InteractionId },

    #[error("interaction {id} has {targets} targets but only {items} items to fill them")]
    TooFewItems {
        id: InteractionId,
        items: usize,
        targets: usize,
    },

    #[error("item {item} of interaction {id} points at unknown target {target}")]
    UnknownItemTarget {
        id: InteractionId,
        item: String,
        target: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResponseError {
    #[error("response type does not match the interaction")]
    KindMismatch,

    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("unknown drop target: {0}")]
    UnknownTarget(String),

    #[error("unknown drag item: {0}")]
    UnknownItem(String),

    #[error("item {0} is placed on more than one target")]
    DuplicateItem(String),

    #[error("only {placed} of {required} targets are filled")]
    Incomplete { placed: usize, required: usize },
}

//
// ─── GRADING ───────────────────────────────────────────────────────────────────
//

impl InteractionDefinition {
    /// Check structural consistency of the definition.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError` when options/items/targets are missing,
    /// duplicated or dangling.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        match &self.kind {
            InteractionKind::Choice { options } => {
                if options.is_empty() {
                    return Err(DefinitionError::NoOptions {
                        id: self.id.clone(),
                    });
                }
                self.ensure_unique(options.iter().map(|o| o.id.as_str()))
            }
            InteractionKind::DragMatch { items, targets } => {
                if items.is_empty() || targets.is_empty() {
                    return Err(DefinitionError::NoDragElements {
                        id: self.id.clone(),
                    });
                }
                self.ensure_unique(items.iter().map(|i| i.id.as_str()))?;
                self.ensure_unique(targets.iter().map(|t| t.id.as_str()))?;
                // Every target must be fillable with a distinct item.
                if targets.len() > items.len() {
                    return Err(DefinitionError::TooFewItems {
                        id: self.id.clone(),
                        items: items.len(),
                        targets: targets.len(),
                    });
                }

                let target_ids: BTreeSet<&str> = targets.iter().map(|t| t.id.as_str()).collect();
                for item in items {
                    if !target_ids.contains(item.target_id.as_str()) {
                        return Err(DefinitionError::UnknownItemTarget {
                            id: self.id.clone(),
                            item: item.id.clone(),
                            target: item.target_id.clone(),
                        });
                    }
                }
                Ok(())
            }
        }
    }

    fn ensure_unique<'a>(&self, ids: impl Iterator<Item = &'a str>) -> Result<(), DefinitionError> {
        let mut seen = BTreeSet::new();
        for element in ids {
            if element.trim().is_empty() {
                return Err(DefinitionError::BlankElement {
                    id: self.id.clone(),
                });
            }
            if !seen.insert(element) {
                return Err(DefinitionError::DuplicateElement {
                    id: self.id.clone(),
                    element: element.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Number of options flagged correct; only meaningful for choices.
    #[must_use]
    pub fn correct_option_count(&self) -> Option<usize> {
        match &self.kind {
            InteractionKind::Choice { options } => {
                Some(options.iter().filter(|o| o.is_correct).count())
            }
            InteractionKind::DragMatch { .. } => None,
        }
    }

    /// Number of targets a drag-match response must fill.
    #[must_use]
    pub fn required_placements(&self) -> usize {
        match &self.kind {
            InteractionKind::Choice { .. } => 1,
            InteractionKind::DragMatch { targets, .. } => targets.len(),
        }
    }

    #[must_use]
    pub fn is_drag_match(&self) -> bool {
        matches!(self.kind, InteractionKind::DragMatch { .. })
    }

    /// Decide whether a response is correct.
    ///
    /// Invalid responses are rejected here, before anything is scored.
    ///
    /// # Errors
    ///
    /// Returns `ResponseError` if the response does not fit the interaction,
    /// references unknown elements, or leaves drag targets unfilled.
    pub fn grade(&self, response: &Response) -> Result<bool, ResponseError> {
        match (&self.kind, response) {
            (InteractionKind::Choice { options }, Response::Choice(chosen)) => options
                .iter()
                .find(|o| o.id == *chosen)
                .map(|o| o.is_correct)
                .ok_or_else(|| ResponseError::UnknownOption(chosen.clone())),
            (InteractionKind::DragMatch { items, targets }, Response::DragMatch(placements)) => {
                grade_drag_match(items, targets, placements)
            }
            _ => Err(ResponseError::KindMismatch),
        }
    }

    /// Points awarded for a graded response.
    #[must_use]
    pub fn score(&self, correct: bool) -> u32 {
        if correct { self.points } else { 0 }
    }
}

fn grade_drag_match(
    items: &[DragItem],
    targets: &[DragTarget],
    placements: &BTreeMap<String, String>,
) -> Result<bool, ResponseError> {
    if placements.len() < targets.len() {
        return Err(ResponseError::Incomplete {
            placed: placements.len(),
            required: targets.len(),
        });
    }

    let mut used = BTreeSet::new();
    for (target, item) in placements {
        if !targets.iter().any(|t| t.id == *target) {
            return Err(ResponseError::UnknownTarget(target.clone()));
        }
        if !items.iter().any(|i| i.id == *item) {
            return Err(ResponseError::UnknownItem(item.clone()));
        }
        if !used.insert(item.as_str()) {
            return Err(ResponseError::DuplicateItem(item.clone()));
        }
    }

    Ok(items
        .iter()
        .all(|item| placements.get(&item.target_id) == Some(&item.id)))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
