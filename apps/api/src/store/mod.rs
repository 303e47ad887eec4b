//! Record store access for application forms.
//!
//! `AppState` holds an `Arc<dyn FormStore>`, chosen at startup via `STORE_BACKEND`.
//! Each operation touches exactly one record; there are no cross-record
//! transactions and concurrent updates to one record are last-write-wins.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::form::{FormData, FormRecord, FormSummary};

pub mod memory;
pub mod postgres;

pub use memory::MemoryFormStore;
pub use postgres::PgFormStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write. `field` is the JSON field name.
    #[error("Duplicate value for {field}")]
    Duplicate { field: String },

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Stored record {id} could not be decoded: {reason}")]
    Corrupt { id: Uuid, reason: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate {
                    field: duplicate_field(db_err.constraint()).to_string(),
                };
            }
        }
        StoreError::Database(err)
    }
}

/// Client field guarded by a unique constraint. Unnamed constraints are the
/// full-name one, the only unique column besides the key.
fn duplicate_field(constraint: Option<&str>) -> &str {
    match constraint {
        Some(postgres::FULL_NAME_CONSTRAINT) | None => "fullName",
        Some(other) => other,
    }
}

/// The record store. Implement this to swap persistence without touching handlers.
#[async_trait]
pub trait FormStore: Send + Sync {
    /// Persists a new record; the store assigns its id and timestamps.
    async fn insert(&self, data: &FormData) -> Result<FormRecord, StoreError>;

    /// All records in the reduced list projection, newest first.
    async fn list(&self) -> Result<Vec<FormSummary>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FormRecord>, StoreError>;

    /// Replaces a record's data. `None` when the record no longer exists.
    async fn update(&self, id: Uuid, data: &FormData) -> Result<Option<FormRecord>, StoreError>;

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Removes a record, returning whether anything was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}
