mod ids;
mod interaction;
mod lesson;
mod progress;

pub use ids::{InteractionId, InteractionIdError, ParseIdError, SecretId, StoryStepId};
pub use interaction::{
    ChoiceOption, DefinitionError, DragItem, DragTarget, InteractionDefinition, InteractionKind,
    Response, ResponseError,
};
pub use lesson::{Checkpoint, CheckpointAction, LessonConfig, LessonConfigError, LessonDefinition};
pub use progress::{ProgressSnapshot, ProgressState, ViewMode};
