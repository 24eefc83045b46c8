#![forbid(unsafe_code)]

pub mod model;
pub mod registry;
pub mod time;
pub mod timeline;

pub use registry::{CheckpointRegistry, RegistryError, TRIGGER_TOLERANCE_SECS};
pub use time::Clock;
pub use timeline::{TimelineCommand, TimelineController, TimelineError, TimelinePhase};
