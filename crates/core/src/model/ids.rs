use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for an interaction (quiz or challenge) in a lesson.
///
/// Interaction ids are free-form strings from the lesson configuration, but
/// must not be blank.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InteractionId(String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InteractionIdError {
    #[error("interaction id cannot be empty")]
    Empty,
}

impl InteractionId {
    /// Creates a new `InteractionId`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `InteractionIdError::Empty` if the id is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, InteractionIdError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(InteractionIdError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InteractionId {
    type Error = InteractionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InteractionId> for String {
    fn from(id: InteractionId) -> Self {
        id.0
    }
}

/// Identifier for a narrative step in story mode.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryStepId(u32);

impl StoryStepId {
    /// The first story step, unlocked for every new session.
    pub const FIRST: Self = Self(1);

    /// Creates a new `StoryStepId`
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the step that must be unlocked before this one, if any.
    #[must_use]
    pub fn previous(&self) -> Option<Self> {
        if self.0 <= Self::FIRST.0 {
            None
        } else {
            Some(Self(self.0 - 1))
        }
    }
}

/// Identifier for a "scientist secret" card.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretId(u32);

impl SecretId {
    /// Creates a new `SecretId`
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InteractionId({})", self.0)
    }
}

impl fmt::Debug for StoryStepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoryStepId({})", self.0)
    }
}

impl fmt::Debug for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StoryStepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl ParseIdError {
    pub(crate) fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
        }
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for InteractionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InteractionId::new(s).map_err(|_| ParseIdError {
            kind: "InteractionId".to_string(),
        })
    }
}

impl FromStr for StoryStepId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(StoryStepId::new)
            .map_err(|_| ParseIdError {
                kind: "StoryStepId".to_string(),
            })
    }
}

impl FromStr for SecretId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(SecretId::new)
            .map_err(|_| ParseIdError {
                kind: "SecretId".to_string(),
            })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_id_trims_whitespace() {
        let id = InteractionId::new("  orbit_identification_1 ").unwrap();
        assert_eq!(id.as_str(), "orbit_identification_1");
        assert_eq!(id.to_string(), "orbit_identification_1");
    }

    #[test]
    fn interaction_id_rejects_blank() {
        assert_eq!(InteractionId::new("   "), Err(InteractionIdError::Empty));
        assert!("".parse::<InteractionId>().is_err());
    }

    #[test]
    fn interaction_id_deserialize_validates() {
        let ok: InteractionId = serde_json::from_str("\"q1\"").unwrap();
        assert_eq!(ok.as_str(), "q1");
        assert!(serde_json::from_str::<InteractionId>("\" \"").is_err());
    }

    #[test]
    fn story_step_previous() {
        assert_eq!(StoryStepId::FIRST.previous(), None);
        assert_eq!(StoryStepId::new(3).previous(), Some(StoryStepId::new(2)));
        assert_eq!(StoryStepId::new(0).previous(), None);
    }

    #[test]
    fn test_story_step_from_str() {
        let id: StoryStepId = "4".parse().unwrap();
        assert_eq!(id, StoryStepId::new(4));
        assert!("four".parse::<StoryStepId>().is_err());
    }

    #[test]
    fn test_secret_id_display() {
        let id = SecretId::new(7);
        assert_eq!(id.to_string(), "7");
        let parsed: SecretId = "7".parse().unwrap();
        assert_eq!(parsed, id);
    }
}
