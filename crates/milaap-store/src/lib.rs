//! milaap-store — Persistence for person records and their face descriptors.
//!
//! The daemon talks to a [`DescriptorStore`] trait object; the SQLite backend
//! is the production store and the in-memory backend serves tests and
//! embedded use. Both preserve insertion order in listings, which the
//! matcher's stable tie-break depends on.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use milaap_core::{FaceDescriptor, PersonRecord, PersonStatus};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(Uuid),
    /// The conditional status update lost a race: the stored status no
    /// longer matches what the caller read.
    #[error("record {id} status changed concurrently (now {actual})")]
    Conflict { id: Uuid, actual: PersonStatus },
    #[error("invalid stored value: {0}")]
    InvalidValue(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
}

/// Persistence contract consumed by the matching core and lifecycle manager.
///
/// Listings return rows in insertion order. Rows whose stored descriptor no
/// longer decodes are excluded from listings (logged, never fatal); a record
/// without a usable descriptor cannot participate in matching.
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    /// All (id, descriptor) pairs, optionally filtered by status.
    async fn list_descriptors(
        &self,
        status: Option<PersonStatus>,
    ) -> Result<Vec<(Uuid, FaceDescriptor)>, StoreError>;

    /// Full candidate records, optionally filtered by status. This is the
    /// single bounded fetch the match path performs per request.
    async fn list_records(
        &self,
        status: Option<PersonStatus>,
    ) -> Result<Vec<PersonRecord>, StoreError>;

    async fn get_record(&self, id: Uuid) -> Result<PersonRecord, StoreError>;

    async fn upsert_record(&self, record: PersonRecord) -> Result<PersonRecord, StoreError>;

    /// Conditionally move `id` from `expected` to `target`, optionally
    /// updating `current_location`, and bump `updated_at`.
    ///
    /// Fails with [`StoreError::Conflict`] when the stored status is no
    /// longer `expected`. This is the commit point of the exactly-once
    /// transition guarantee; on any failure the row is left untouched.
    async fn update_status(
        &self,
        id: Uuid,
        expected: PersonStatus,
        target: PersonStatus,
        location: Option<String>,
    ) -> Result<PersonRecord, StoreError>;
}
