//! Sample table setup, run after every successful connect.

use crate::config::SAMPLE_TABLE;

use super::{Session, StoreError};

/// Outcome of [`ensure_sample_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    Existing,
    Created,
    /// The table was missing and `create table` failed; logged, not fatal
    CreateFailed,
}

/// Create the sample table unless it already exists.
///
/// Safe to call on every reconnect. An error from the existence check is
/// returned as [`StoreError::SchemaCheck`] and is fatal to the process.
pub async fn ensure_sample_table(session: &mut dyn Session) -> Result<SchemaStatus, StoreError> {
    let exists = session
        .table_exists(SAMPLE_TABLE)
        .await
        .map_err(|e| StoreError::SchemaCheck(e.to_string()))?;

    if exists {
        tracing::info!(table = SAMPLE_TABLE, "Table exists");
        return Ok(SchemaStatus::Existing);
    }

    tracing::info!(table = SAMPLE_TABLE, "Setting up schema");
    match session.create_sample_table().await {
        Ok(()) => Ok(SchemaStatus::Created),
        Err(e) => {
            tracing::warn!(table = SAMPLE_TABLE, error = %e, "Failed to create sample table");
            Ok(SchemaStatus::CreateFailed)
        }
    }
}
