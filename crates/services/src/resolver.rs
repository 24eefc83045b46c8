use std::collections::BTreeMap;
use std::sync::Arc;

use lab_core::CheckpointRegistry;
use lab_core::model::{
    DragItem, InteractionDefinition, InteractionId, InteractionKind, Response, ResponseError,
};

use crate::error::ResolverError;
use crate::progress_store::{Mutation, ProgressStore};

/// Graded result of a submitted response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub interaction_id: InteractionId,
    pub correct: bool,
    pub score: u32,
    /// Attempts logged for this interaction, including this one.
    pub attempts: u32,
    pub explanation: String,
}

/// How an active interaction was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closed {
    pub interaction_id: InteractionId,
    /// `false` when the interaction had already been completed before.
    pub first_completion: bool,
}

/// Draft state of the interaction currently on screen.
#[derive(Debug, Clone)]
pub struct ActiveInteraction {
    definition: InteractionDefinition,
    mandatory: bool,
    selected_option: Option<String>,
    /// target id -> item id
    placements: BTreeMap<String, String>,
    outcome: Option<AttemptOutcome>,
}

impl ActiveInteraction {
    #[must_use]
    pub fn definition(&self) -> &InteractionDefinition {
        &self.definition
    }

    #[must_use]
    pub fn id(&self) -> &InteractionId {
        &self.definition.id
    }

    #[must_use]
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    #[must_use]
    pub fn selected_option(&self) -> Option<&str> {
        self.selected_option.as_deref()
    }

    #[must_use]
    pub fn placements(&self) -> &BTreeMap<String, String> {
        &self.placements
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&AttemptOutcome> {
        self.outcome.as_ref()
    }

    /// Build a response from the current draft, if one is complete enough
    /// to submit.
    #[must_use]
    pub fn draft_response(&self) -> Option<Response> {
        match &self.definition.kind {
            InteractionKind::Choice { .. } => self.selected_option.clone().map(Response::Choice),
            InteractionKind::DragMatch { .. } if self.placements.is_empty() => None,
            InteractionKind::DragMatch { .. } => Some(Response::DragMatch(self.placements.clone())),
        }
    }
}

/// Presents the active interaction, grades its response, and reports
/// completion to the progress store.
pub struct InteractionResolver {
    registry: Arc<CheckpointRegistry>,
    active: Option<ActiveInteraction>,
}

impl InteractionResolver {
    #[must_use]
    pub fn new(registry: Arc<CheckpointRegistry>) -> Self {
        Self {
            registry,
            active: None,
        }
    }

    #[must_use]
    pub fn active(&self) -> Option<&ActiveInteraction> {
        self.active.as_ref()
    }

    /// Show interaction `id` with a fresh draft.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::UnknownInteraction` when the catalog has no
    /// definition for `id`.
    pub fn activate(&mut self, id: &InteractionId) -> Result<&ActiveInteraction, ResolverError> {
        let definition = self
            .registry
            .lookup(id)
            .cloned()
            .ok_or_else(|| ResolverError::UnknownInteraction(id.clone()))?;
        let mandatory = self.registry.checkpoint(id).is_none_or(|c| c.mandatory);
        tracing::debug!(interaction = %id, mandatory, "interaction shown");

        let active = self.active.insert(ActiveInteraction {
            definition,
            mandatory,
            selected_option: None,
            placements: BTreeMap::new(),
            outcome: None,
        });
        Ok(&*active)
    }

    /// Choose an option of the active choice interaction.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is active, the interaction was answered,
    /// or the option does not exist.
    pub fn select_option(&mut self, option_id: &str) -> Result<(), ResolverError> {
        let active = self.unanswered_mut()?;
        let InteractionKind::Choice { options } = &active.definition.kind else {
            return Err(ResponseError::KindMismatch.into());
        };
        if !options.iter().any(|o| o.id == option_id) {
            return Err(ResponseError::UnknownOption(option_id.to_owned()).into());
        }
        active.selected_option = Some(option_id.to_owned());
        Ok(())
    }

    /// Drop `item_id` on `target_id`.
    ///
    /// An item sits on at most one target: placing it again moves it, and
    /// whatever occupied the target goes back to the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is active, the interaction was answered,
    /// or the item or target does not exist.
    pub fn place(&mut self, item_id: &str, target_id: &str) -> Result<(), ResolverError> {
        let active = self.unanswered_mut()?;
        let InteractionKind::DragMatch { items, targets } = &active.definition.kind else {
            return Err(ResponseError::KindMismatch.into());
        };
        if !items.iter().any(|i| i.id == item_id) {
            return Err(ResponseError::UnknownItem(item_id.to_owned()).into());
        }
        if !targets.iter().any(|t| t.id == target_id) {
            return Err(ResponseError::UnknownTarget(target_id.to_owned()).into());
        }
        active.placements.retain(|_, placed| placed.as_str() != item_id);
        active
            .placements
            .insert(target_id.to_owned(), item_id.to_owned());
        Ok(())
    }

    /// Clear `target_id`, returning the item that was on it.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is active or the interaction was answered.
    pub fn unplace(&mut self, target_id: &str) -> Result<Option<String>, ResolverError> {
        let active = self.unanswered_mut()?;
        Ok(active.placements.remove(target_id))
    }

    /// Drag items not yet placed on any target.
    #[must_use]
    pub fn unplaced_items(&self) -> Vec<&DragItem> {
        let Some(active) = &self.active else {
            return Vec::new();
        };
        let InteractionKind::DragMatch { items, .. } = &active.definition.kind else {
            return Vec::new();
        };
        items
            .iter()
            .filter(|item| !active.placements.values().any(|placed| *placed == item.id))
            .collect()
    }

    /// Grade `response` for the active interaction and log the attempt.
    ///
    /// Each activation accepts one graded response. Invalid responses are
    /// rejected without logging an attempt. A failed write of the attempt
    /// comes back in [`Mutation::persisted`].
    ///
    /// # Errors
    ///
    /// Returns `ResolverError` if `id` is not the active interaction, it was
    /// already answered, or the response is invalid.
    pub async fn submit(
        &mut self,
        store: &mut ProgressStore,
        id: &InteractionId,
        response: &Response,
    ) -> Result<Mutation<AttemptOutcome>, ResolverError> {
        let active = self.active.as_mut().ok_or(ResolverError::NotActive)?;
        if active.definition.id != *id {
            return Err(ResolverError::WrongInteraction {
                active: active.definition.id.clone(),
                requested: id.clone(),
            });
        }
        if active.outcome.is_some() {
            return Err(ResolverError::AlreadyAnswered(id.clone()));
        }

        let correct = active.definition.grade(response)?;
        let score = active.definition.score(correct);
        let logged = store.log_quiz_attempt(id, score).await;

        let outcome = AttemptOutcome {
            interaction_id: id.clone(),
            correct,
            score,
            attempts: logged.value,
            explanation: active.definition.explanation.clone(),
        };
        active.outcome = Some(outcome.clone());
        Ok(Mutation {
            value: outcome,
            persisted: logged.persisted,
        })
    }

    /// Close an answered interaction and mark it completed.
    ///
    /// Completion does not depend on correctness.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::NotActive` or `ResolverError::NotAnswered`.
    pub async fn acknowledge(
        &mut self,
        store: &mut ProgressStore,
    ) -> Result<Mutation<Closed>, ResolverError> {
        let active = self.active.as_ref().ok_or(ResolverError::NotActive)?;
        if active.outcome.is_none() {
            return Err(ResolverError::NotAnswered(active.definition.id.clone()));
        }
        self.close(store).await
    }

    /// Close an optional interaction without answering it.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::NotActive`, or `ResolverError::Mandatory` when
    /// the checkpoint must be answered.
    pub async fn dismiss(
        &mut self,
        store: &mut ProgressStore,
    ) -> Result<Mutation<Closed>, ResolverError> {
        let active = self.active.as_ref().ok_or(ResolverError::NotActive)?;
        if active.mandatory {
            return Err(ResolverError::Mandatory(active.definition.id.clone()));
        }
        tracing::info!(interaction = %active.definition.id, "optional interaction dismissed");
        self.close(store).await
    }

    async fn close(&mut self, store: &mut ProgressStore) -> Result<Mutation<Closed>, ResolverError> {
        let active = self.active.take().ok_or(ResolverError::NotActive)?;
        let id = active.definition.id;
        let completed = store.complete_interaction(&id).await;
        Ok(completed.map(|first_completion| Closed {
            interaction_id: id,
            first_completion,
        }))
    }

    fn unanswered_mut(&mut self) -> Result<&mut ActiveInteraction, ResolverError> {
        let active = self.active.as_mut().ok_or(ResolverError::NotActive)?;
        if active.outcome.is_some() {
            return Err(ResolverError::AlreadyAnswered(active.definition.id.clone()));
        }
        Ok(active)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use lab_core::model::LessonDefinition;
    use lab_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn id(raw: &str) -> InteractionId {
        InteractionId::new(raw).unwrap()
    }

    fn setup() -> (InteractionResolver, ProgressStore) {
        let lesson = LessonDefinition::earth_observation_101().unwrap();
        let registry = Arc::new(lesson.registry().unwrap());
        let store = ProgressStore::new(Arc::new(InMemoryRepository::new()), "k", fixed_clock());
        (InteractionResolver::new(registry), store)
    }

    #[tokio::test]
    async fn correct_choice_scores_points_and_completes_on_acknowledge() {
        let (mut resolver, mut store) = setup();
        let q = id("orbit_identification_1");
        resolver.activate(&q).unwrap();
        resolver.select_option("geo").unwrap();
        let response = resolver.active().unwrap().draft_response().unwrap();

        let outcome = resolver.submit(&mut store, &q, &response).await.unwrap();
        assert!(outcome.is_persisted());
        let outcome = outcome.value;
        assert!(outcome.correct);
        assert_eq!(outcome.score, 100);
        assert_eq!(outcome.attempts, 1);
        assert!(!store.state().is_completed(&q));

        let closed = resolver.acknowledge(&mut store).await.unwrap();
        assert!(closed.is_persisted());
        assert!(closed.value.first_completion);
        assert!(store.state().is_completed(&q));
        assert!(resolver.active().is_none());
    }

    #[tokio::test]
    async fn wrong_answer_still_completes() {
        let (mut resolver, mut store) = setup();
        let q = id("orbit_identification_1");
        resolver.activate(&q).unwrap();

        let outcome = resolver
            .submit(&mut store, &q, &Response::Choice("leo".into()))
            .await
            .unwrap()
            .value;
        assert!(!outcome.correct);
        assert_eq!(outcome.score, 0);

        resolver.acknowledge(&mut store).await.unwrap();
        assert!(store.state().is_completed(&q));
        assert_eq!(store.state().attempts(&q), 1);
    }

    #[tokio::test]
    async fn second_submit_is_rejected() {
        let (mut resolver, mut store) = setup();
        let q = id("orbit_identification_1");
        resolver.activate(&q).unwrap();
        let answer = Response::Choice("geo".into());
        resolver
            .submit(&mut store, &q, &answer)
            .await
            .unwrap()
            .into_result()
            .unwrap();

        let err = resolver.submit(&mut store, &q, &answer).await.unwrap_err();
        assert_eq!(err, ResolverError::AlreadyAnswered(q.clone()));
        assert_eq!(store.state().attempts(&q), 1);
    }

    #[tokio::test]
    async fn partial_drag_match_logs_no_attempt() {
        let (mut resolver, mut store) = setup();
        let q = id("data_type_matching_2");
        resolver.activate(&q).unwrap();
        resolver.place("temp_data", "weather_sat").unwrap();
        resolver.place("veg_index", "eo_sat").unwrap();
        assert_eq!(resolver.unplaced_items().len(), 1);

        let draft = resolver.active().unwrap().draft_response().unwrap();
        let err = resolver.submit(&mut store, &q, &draft).await.unwrap_err();
        assert_eq!(
            err,
            ResolverError::InvalidResponse(ResponseError::Incomplete {
                placed: 2,
                required: 3
            })
        );
        assert_eq!(store.state().attempts(&q), 0);

        resolver.place("voice_comm", "comm_sat").unwrap();
        let draft = resolver.active().unwrap().draft_response().unwrap();
        let outcome = resolver.submit(&mut store, &q, &draft).await.unwrap().value;
        assert!(outcome.correct);
        assert_eq!(outcome.score, 150);
    }

    #[test]
    fn placing_an_item_again_moves_it() {
        let (mut resolver, _store) = setup();
        resolver.activate(&id("data_type_matching_2")).unwrap();
        resolver.place("temp_data", "eo_sat").unwrap();
        resolver.place("temp_data", "weather_sat").unwrap();

        let placements = resolver.active().unwrap().placements();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements.get("weather_sat").map(String::as_str), Some("temp_data"));

        assert_eq!(
            resolver.unplace("weather_sat").unwrap().as_deref(),
            Some("temp_data")
        );
        assert_eq!(resolver.unplaced_items().len(), 3);
    }

    #[test]
    fn draft_helpers_reject_the_wrong_kind() {
        let (mut resolver, _store) = setup();
        resolver.activate(&id("orbit_identification_1")).unwrap();
        assert_eq!(
            resolver.place("temp_data", "eo_sat").unwrap_err(),
            ResolverError::InvalidResponse(ResponseError::KindMismatch)
        );
        assert_eq!(
            resolver.select_option("mars").unwrap_err(),
            ResolverError::InvalidResponse(ResponseError::UnknownOption("mars".into()))
        );
    }

    #[tokio::test]
    async fn mandatory_interactions_cannot_be_dismissed() {
        let (mut resolver, mut store) = setup();
        resolver.activate(&id("final_scenario_4")).unwrap();
        let err = resolver.dismiss(&mut store).await.unwrap_err();
        assert_eq!(err, ResolverError::Mandatory(id("final_scenario_4")));
        assert!(resolver.active().is_some());
    }

    #[tokio::test]
    async fn optional_interaction_can_be_dismissed_without_an_attempt() {
        let mut lesson = LessonDefinition::earth_observation_101().unwrap();
        lesson.timeline[0] = lesson.timeline[0].clone().optional();
        let registry = Arc::new(lesson.registry().unwrap());
        let mut resolver = InteractionResolver::new(registry);
        let mut store =
            ProgressStore::new(Arc::new(InMemoryRepository::new()), "k", fixed_clock());

        let q = lesson.timeline[0].interaction_id.clone();
        resolver.activate(&q).unwrap();
        let closed = resolver.dismiss(&mut store).await.unwrap().value;
        assert_eq!(closed.interaction_id, q);
        assert!(store.state().is_completed(&q));
        assert_eq!(store.state().attempts(&q), 0);
    }

    #[tokio::test]
    async fn acknowledge_requires_an_answer() {
        let (mut resolver, mut store) = setup();
        assert_eq!(
            resolver.acknowledge(&mut store).await.unwrap_err(),
            ResolverError::NotActive
        );
        resolver.activate(&id("final_scenario_4")).unwrap();
        assert_eq!(
            resolver.acknowledge(&mut store).await.unwrap_err(),
            ResolverError::NotAnswered(id("final_scenario_4"))
        );
    }

    #[test]
    fn unknown_interaction_cannot_be_activated() {
        let (mut resolver, _store) = setup();
        assert_eq!(
            resolver.activate(&id("ghost")).unwrap_err(),
            ResolverError::UnknownInteraction(id("ghost"))
        );
    }
}
