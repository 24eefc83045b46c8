//! Shared error types for the services crate.

use thiserror::Error;

use lab_core::model::{InteractionId, LessonConfigError, ResponseError, StoryStepId};
use lab_core::registry::RegistryError;
use lab_core::timeline::TimelineError;
use storage::repository::StorageError;

/// Errors emitted by playback adapters.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("cannot seek to {0}")]
    InvalidSeek(f64),
    #[error("player metadata is not loaded yet")]
    NotReady,
    #[error("playback event stream is closed")]
    Disconnected,
}

/// Errors emitted by `InteractionResolver`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolverError {
    #[error("no definition for interaction {0}")]
    UnknownInteraction(InteractionId),
    #[error("no interaction is active")]
    NotActive,
    #[error("interaction {active} is active, not {requested}")]
    WrongInteraction {
        active: InteractionId,
        requested: InteractionId,
    },
    #[error("interaction {0} was already answered")]
    AlreadyAnswered(InteractionId),
    #[error("interaction {0} has not been answered yet")]
    NotAnswered(InteractionId),
    #[error("interaction {0} is mandatory and cannot be dismissed")]
    Mandatory(InteractionId),
    #[error(transparent)]
    InvalidResponse(#[from] ResponseError),
}

/// Errors emitted by `LessonSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LessonError {
    #[error("playback is locked by interaction {0}")]
    Locked(InteractionId),
    #[error("story step {step} requires step {requires} first")]
    StoryStepLocked {
        step: StoryStepId,
        requires: StoryStepId,
    },
    #[error(transparent)]
    Config(#[from] LessonConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
