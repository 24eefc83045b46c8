#![forbid(unsafe_code)]

pub mod document;
pub mod repository;
pub mod sqlite;

pub use repository::{
    DEFAULT_SESSION_KEY, InMemoryRepository, ProgressRepository, Storage, StorageError,
};
