#![forbid(unsafe_code)]

pub mod error;
pub mod lesson;
pub mod playback;
pub mod progress_store;
pub mod resolver;

pub use lab_core::Clock;

pub use error::{LessonError, PlaybackError, ResolverError};
pub use lesson::{LessonEvent, LessonProgress, LessonSession};
pub use playback::{
    EmbedApi, EmbeddedPlayerAdapter, MediaElementAdapter, PlaybackAdapter, PlaybackEvent,
    PlayerState, event_channel,
};
pub use progress_store::{Mutation, ProgressStore};
pub use resolver::{ActiveInteraction, AttemptOutcome, Closed, InteractionResolver};
