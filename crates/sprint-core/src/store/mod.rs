//! Document store adapter.
//!
//! The upsert workflow only needs point reads, inserts, and full
//! replacements keyed by partition key; the query endpoint adds a scoped
//! listing. `RedbStore` persists to a single file, `MemoryStore` keeps
//! everything in process.

pub mod memory;
pub mod redb_store;

use std::time::Instant;

use thiserror::Error;

use crate::entity::SprintPlanningEntity;

pub use self::memory::MemoryStore;
pub use self::redb_store::RedbStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no document with id '{0}'")]
    NotFound(String),

    #[error("a document with id '{0}' already exists")]
    Conflict(String),

    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A store result together with the cost the store reported for producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse<T> {
    pub resource: T,
    /// Operation cost in milliseconds of store time. Reported for logging only.
    pub request_charge: f64,
}

impl<T> StoreResponse<T> {
    pub(crate) fn timed(resource: T, started: Instant) -> Self {
        Self {
            resource,
            request_charge: started.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

/// Capability set the workflow and query endpoint rely on.
///
/// The partition key of every document equals its id; a lookup under any
/// other partition key misses.
pub trait DocumentStore: Send + Sync {
    /// Point lookup. `NotFound` when absent.
    fn read(&self, id: &str, partition_key: &str)
        -> StoreResult<StoreResponse<SprintPlanningEntity>>;

    /// Insert a new document. `Conflict` when the id already exists.
    fn create(
        &self,
        entity: &SprintPlanningEntity,
    ) -> StoreResult<StoreResponse<SprintPlanningEntity>>;

    /// Overwrite the whole document at `id`. `NotFound` when absent.
    fn replace(
        &self,
        entity: &SprintPlanningEntity,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<StoreResponse<SprintPlanningEntity>>;

    /// Every document in the employer/team/sprint scope, ordered by id.
    fn query_scope(
        &self,
        employer: &str,
        team: &str,
        sprint_id: &str,
    ) -> StoreResult<StoreResponse<Vec<SprintPlanningEntity>>>;
}

pub(crate) fn check_replace_target(
    entity: &SprintPlanningEntity,
    id: &str,
    partition_key: &str,
) -> StoreResult<()> {
    if partition_key != id {
        return Err(StoreError::NotFound(id.to_string()));
    }
    if entity.id != id {
        return Err(StoreError::Backend(format!(
            "document id '{}' does not match target id '{id}'",
            entity.id
        )));
    }
    Ok(())
}
