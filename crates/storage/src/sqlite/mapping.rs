use lab_core::model::ProgressSnapshot;
use sqlx::Row;

use crate::document;
use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn map_progress_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProgressSnapshot, StorageError> {
    let raw: String = row.try_get("value").map_err(ser)?;
    Ok(document::decode(&raw))
}
