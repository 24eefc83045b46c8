mod progress;
mod session;

pub use progress::LessonProgress;
pub use session::{LessonEvent, LessonSession};
