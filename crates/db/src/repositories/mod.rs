use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use tripflow_core::domain::record::RecordId;
use tripflow_core::store::StoreError;

pub mod directory;
pub mod workflow_record;

pub use directory::SqlDirectory;
pub use workflow_record::SqlWorkflowRecordStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("record `{record_id}` update rejected: {detail}")]
    Conflict { record_id: RecordId, detail: String },
    #[error("workflow record `{0}` was not found")]
    RecordNotFound(RecordId),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict { record_id, detail } => {
                StoreError::Conflict { record_id, detail }
            }
            RepositoryError::RecordNotFound(id) => StoreError::record_not_found(&id),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Fixed-width UTC timestamps, so text order in SQLite is time order.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_timestamp(
    column: &str,
    value: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{value}`: {error}")))
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}
