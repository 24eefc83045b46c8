use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::InteractionId;
use crate::model::interaction::InteractionDefinition;
use crate::registry::{CheckpointRegistry, RegistryError};

const EARTH_OBSERVATION_101: &str = include_str!("../../data/earth-obs-101.json");

//
// ─── CHECKPOINTS ───────────────────────────────────────────────────────────────
//

/// What reaching a checkpoint does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointAction {
    /// Pause playback and block on the interaction.
    #[default]
    Pause,
    /// Only note that the play-head passed this point.
    Log,
}

/// A configured point in the lesson timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Seconds from the start of the video.
    #[serde(rename = "time")]
    pub trigger_time: f64,
    #[serde(default)]
    pub action: CheckpointAction,
    pub interaction_id: InteractionId,
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,
}

fn default_mandatory() -> bool {
    true
}

impl Checkpoint {
    #[must_use]
    pub fn pause(trigger_time: f64, interaction_id: InteractionId) -> Self {
        Self {
            trigger_time,
            action: CheckpointAction::Pause,
            interaction_id,
            mandatory: true,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    #[must_use]
    pub fn log_only(mut self) -> Self {
        self.action = CheckpointAction::Log;
        self
    }

    #[must_use]
    pub fn pauses(&self) -> bool {
        self.action == CheckpointAction::Pause
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LessonConfigError {
    #[error("invalid lesson document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid video source {raw}: {source}")]
    VideoSrc {
        raw: String,
        #[source]
        source: url::ParseError,
    },

    #[error("lesson duration must be positive and finite, got {0}")]
    Duration(f64),

    #[error("lesson id cannot be empty")]
    EmptyLessonId,
}

/// Metadata of a video lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonConfig {
    pub lesson_id: String,
    pub title: String,
    pub video_src: String,
    /// Nominal video length in seconds.
    #[serde(rename = "duration")]
    pub duration_secs: f64,
    #[serde(default)]
    pub poster_image: Option<String>,
}

impl LessonConfig {
    /// # Errors
    ///
    /// Returns `LessonConfigError` if the id is blank, the video source is
    /// not an absolute URL, or the duration is not positive.
    pub fn validate(&self) -> Result<(), LessonConfigError> {
        if self.lesson_id.trim().is_empty() {
            return Err(LessonConfigError::EmptyLessonId);
        }
        Url::parse(&self.video_src).map_err(|source| LessonConfigError::VideoSrc {
            raw: self.video_src.clone(),
            source,
        })?;
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(LessonConfigError::Duration(self.duration_secs));
        }
        Ok(())
    }
}

/// A complete lesson: metadata, checkpoint timeline and interaction catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonDefinition {
    pub lesson: LessonConfig,
    pub timeline: Vec<Checkpoint>,
    pub interactions: Vec<InteractionDefinition>,
}

impl LessonDefinition {
    /// Parse and validate a lesson document.
    ///
    /// Only the lesson metadata is checked here; the timeline and catalog are
    /// checked by [`LessonDefinition::registry`].
    ///
    /// # Errors
    ///
    /// Returns `LessonConfigError` on malformed JSON or invalid metadata.
    pub fn from_json(raw: &str) -> Result<Self, LessonConfigError> {
        let definition: Self = serde_json::from_str(raw)?;
        definition.lesson.validate()?;
        Ok(definition)
    }

    /// The built-in "Earth Observation Fundamentals" lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonConfigError` if the bundled document is invalid.
    pub fn earth_observation_101() -> Result<Self, LessonConfigError> {
        Self::from_json(EARTH_OBSERVATION_101)
    }

    /// Build the validated registry for this lesson.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` for duplicate ids, overlapping trigger windows
    /// or checkpoints without a matching definition.
    pub fn registry(&self) -> Result<CheckpointRegistry, RegistryError> {
        CheckpointRegistry::new(self.timeline.clone(), self.interactions.clone())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
