//! Flat key-value document holding the persisted subset of lesson progress.
//!
//! Encoding always writes every persisted field. Decoding is tolerant: each
//! field is read on its own and falls back to its default when absent or
//! malformed, so a damaged record never fails a load.

use std::collections::{BTreeMap, BTreeSet};

use lab_core::model::{InteractionId, ProgressSnapshot, SecretId, StoryStepId, ViewMode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::repository::StorageError;

pub const CURRENT_VIDEO_TIME: &str = "currentVideoTime";
pub const COMPLETED_INTERACTIONS: &str = "completedInteractions";
pub const QUIZ_ATTEMPTS: &str = "quizAttempts";
pub const UNLOCKED_SECRETS: &str = "unlockedSecrets";
pub const UNLOCKED_STORY_STEPS: &str = "unlockedStorySteps";
pub const VIEW_MODE: &str = "viewMode";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressDocument<'a> {
    current_video_time: f64,
    completed_interactions: &'a BTreeSet<InteractionId>,
    quiz_attempts: &'a BTreeMap<InteractionId, u32>,
    unlocked_secrets: &'a BTreeSet<SecretId>,
    unlocked_story_steps: &'a BTreeSet<StoryStepId>,
    view_mode: ViewMode,
}

/// Serialize the persisted fields to a JSON object string.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the time is not representable in JSON.
pub fn encode(snapshot: &ProgressSnapshot) -> Result<String, StorageError> {
    if !snapshot.current_video_time.is_finite() {
        return Err(StorageError::Serialization(format!(
            "{CURRENT_VIDEO_TIME} must be finite, got {}",
            snapshot.current_video_time
        )));
    }
    let document = ProgressDocument {
        current_video_time: snapshot.current_video_time,
        completed_interactions: &snapshot.completed_interactions,
        quiz_attempts: &snapshot.quiz_attempts,
        unlocked_secrets: &snapshot.unlocked_secrets,
        unlocked_story_steps: &snapshot.unlocked_story_steps,
        view_mode: snapshot.view_mode,
    };
    serde_json::to_string(&document).map_err(|err| StorageError::Serialization(err.to_string()))
}

/// Read a stored document, defaulting whatever is missing or malformed.
#[must_use]
pub fn decode(raw: &str) -> ProgressSnapshot {
    let mut snapshot = ProgressSnapshot::default();
    let map = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            tracing::debug!("progress document is not an object; using defaults");
            return snapshot;
        }
        Err(err) => {
            tracing::debug!(%err, "progress document is not valid JSON; using defaults");
            return snapshot;
        }
    };

    if let Some(time) = field::<f64>(&map, CURRENT_VIDEO_TIME) {
        snapshot.current_video_time = time;
    }
    if let Some(ids) = field::<Vec<InteractionId>>(&map, COMPLETED_INTERACTIONS) {
        snapshot.completed_interactions = ids.into_iter().collect();
    }
    if let Some(attempts) = field::<BTreeMap<InteractionId, u32>>(&map, QUIZ_ATTEMPTS) {
        snapshot.quiz_attempts = attempts;
    }
    if let Some(secrets) = field::<Vec<SecretId>>(&map, UNLOCKED_SECRETS) {
        snapshot.unlocked_secrets = secrets.into_iter().collect();
    }
    if let Some(steps) = field::<Vec<StoryStepId>>(&map, UNLOCKED_STORY_STEPS) {
        snapshot.unlocked_story_steps = steps.into_iter().collect();
    }
    if let Some(mode) = field::<ViewMode>(&map, VIEW_MODE) {
        snapshot.view_mode = mode;
    }
    snapshot
}

fn field<T: DeserializeOwned>(map: &Map<String, Value>, key: &'static str) -> Option<T> {
    let value = map.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::debug!(field = key, %err, "malformed progress field; using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> InteractionId {
        InteractionId::new(raw).unwrap()
    }

    #[test]
    fn encodes_exactly_the_persisted_keys() {
        let raw = encode(&ProgressSnapshot::default()).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        let mut keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                COMPLETED_INTERACTIONS,
                CURRENT_VIDEO_TIME,
                QUIZ_ATTEMPTS,
                UNLOCKED_SECRETS,
                UNLOCKED_STORY_STEPS,
                VIEW_MODE,
            ]
        );
    }

    #[test]
    fn round_trips_values() {
        let mut snapshot = ProgressSnapshot::default();
        snapshot.current_video_time = 61.25;
        snapshot.completed_interactions = BTreeSet::from([id("a"), id("b")]);
        snapshot.quiz_attempts = BTreeMap::from([(id("a"), 2)]);
        snapshot.unlocked_secrets = BTreeSet::from([SecretId::new(2)]);
        snapshot.unlocked_story_steps =
            BTreeSet::from([StoryStepId::new(1), StoryStepId::new(2), StoryStepId::new(3)]);
        snapshot.view_mode = ViewMode::Spectral;

        let raw = encode(&snapshot).unwrap();
        assert!(raw.contains("\"viewMode\":\"satellite\""));
        assert_eq!(decode(&raw), snapshot);
    }

    #[test]
    fn malformed_fields_fall_back_individually() {
        let raw = r#"{
            "currentVideoTime": "soon",
            "completedInteractions": ["a", "b"],
            "quizAttempts": {"a": -3},
            "unlockedStorySteps": [1, 2],
            "viewMode": "infrared"
        }"#;
        let snapshot = decode(raw);
        assert_eq!(snapshot.current_video_time, 0.0);
        assert_eq!(snapshot.completed_interactions, BTreeSet::from([id("a"), id("b")]));
        assert!(snapshot.quiz_attempts.is_empty());
        assert!(snapshot.unlocked_secrets.is_empty());
        assert_eq!(snapshot.unlocked_story_steps.len(), 2);
        assert_eq!(snapshot.view_mode, ViewMode::Optical);
    }

    #[test]
    fn non_object_documents_decode_to_defaults() {
        assert_eq!(decode("[1, 2, 3]"), ProgressSnapshot::default());
        assert_eq!(decode("not json"), ProgressSnapshot::default());
    }

    #[test]
    fn rejects_non_finite_time() {
        let snapshot = ProgressSnapshot {
            current_video_time: f64::INFINITY,
            ..ProgressSnapshot::default()
        };
        assert!(matches!(encode(&snapshot), Err(StorageError::Serialization(_))));
    }
}
