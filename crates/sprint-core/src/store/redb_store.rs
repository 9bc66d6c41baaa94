//! Persistent document storage using redb.
//!
//! # Table design
//!
//! `DOCUMENTS` maps `id -> JSON entity`. `SCOPES` is a secondary index whose
//! key is
//! ```text
//! [ len(employer): u32 BE | employer | len(team): u32 BE | team |
//!   len(sprintId): u32 BE | sprintId | id ]
//! ```
//! with an empty value. Length prefixes make the three-field scope an
//! unambiguous byte prefix, so a scope query is one range scan
//! `prefix..scope_upper_bound(prefix)`.

use std::path::Path;
use std::time::Instant;

use redb::{Database, ReadableTable, TableDefinition};

use super::{check_replace_target, DocumentStore, StoreError, StoreResponse, StoreResult};
use crate::entity::SprintPlanningEntity;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");
const SCOPES: TableDefinition<&[u8], ()> = TableDefinition::new("scopes");

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn push_field(key: &mut Vec<u8>, field: &str) {
    key.extend_from_slice(&(field.len() as u32).to_be_bytes());
    key.extend_from_slice(field.as_bytes());
}

fn scope_prefix(employer: &str, team: &str, sprint_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(12 + employer.len() + team.len() + sprint_id.len());
    push_field(&mut key, employer);
    push_field(&mut key, team);
    push_field(&mut key, sprint_id);
    key
}

fn scope_key(entity: &SprintPlanningEntity) -> Vec<u8> {
    let mut key = scope_prefix(&entity.employer, &entity.team, &entity.sprint_id);
    key.extend_from_slice(entity.id.as_bytes());
    key
}

/// Exclusive upper bound for a scope scan.
///
/// Ids are UTF-8 and UTF-8 never contains `0xff`, so every key in the scope
/// sorts below `prefix ++ [0xff]`.
fn scope_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.push(0xff);
    key
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn decode(bytes: &[u8]) -> StoreResult<SprintPlanningEntity> {
    serde_json::from_slice(bytes).map_err(backend)
}

fn encode(entity: &SprintPlanningEntity) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(entity).map_err(backend)
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

/// File-backed [`DocumentStore`].
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the redb database at `path`.
    ///
    /// Creates both tables if they don't already exist.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(backend)?;
            }
        }
        let db = Database::create(path).map_err(backend)?;
        let wt = db.begin_write().map_err(backend)?;
        wt.open_table(DOCUMENTS).map_err(backend)?;
        wt.open_table(SCOPES).map_err(backend)?;
        wt.commit().map_err(backend)?;
        Ok(Self { db })
    }
}

impl DocumentStore for RedbStore {
    fn read(
        &self,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<StoreResponse<SprintPlanningEntity>> {
        let started = Instant::now();
        if partition_key != id {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let rt = self.db.begin_read().map_err(backend)?;
        let table = rt.open_table(DOCUMENTS).map_err(backend)?;
        let entity = match table.get(id).map_err(backend)? {
            Some(v) => decode(v.value())?,
            None => return Err(StoreError::NotFound(id.to_string())),
        };
        Ok(StoreResponse::timed(entity, started))
    }

    fn create(
        &self,
        entity: &SprintPlanningEntity,
    ) -> StoreResult<StoreResponse<SprintPlanningEntity>> {
        let started = Instant::now();
        let value = encode(entity)?;
        let wt = self.db.begin_write().map_err(backend)?;
        {
            let mut docs = wt.open_table(DOCUMENTS).map_err(backend)?;
            // Existence is re-checked inside the write transaction so a
            // concurrent create for the same id loses with Conflict.
            if docs.get(entity.id.as_str()).map_err(backend)?.is_some() {
                return Err(StoreError::Conflict(entity.id.clone()));
            }
            docs.insert(entity.id.as_str(), value.as_slice())
                .map_err(backend)?;

            let mut scopes = wt.open_table(SCOPES).map_err(backend)?;
            scopes
                .insert(scope_key(entity).as_slice(), ())
                .map_err(backend)?;
        }
        wt.commit().map_err(backend)?;
        Ok(StoreResponse::timed(entity.clone(), started))
    }

    fn replace(
        &self,
        entity: &SprintPlanningEntity,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<StoreResponse<SprintPlanningEntity>> {
        let started = Instant::now();
        check_replace_target(entity, id, partition_key)?;
        let value = encode(entity)?;
        let wt = self.db.begin_write().map_err(backend)?;
        {
            let mut docs = wt.open_table(DOCUMENTS).map_err(backend)?;
            let previous = match docs.get(id).map_err(backend)? {
                Some(v) => decode(v.value())?,
                None => return Err(StoreError::NotFound(id.to_string())),
            };
            docs.insert(id, value.as_slice()).map_err(backend)?;

            // Under the concat id scheme two different scopes can share an id,
            // so the index entry moves with the document.
            let old_key = scope_key(&previous);
            let new_key = scope_key(entity);
            if old_key != new_key {
                let mut scopes = wt.open_table(SCOPES).map_err(backend)?;
                scopes.remove(old_key.as_slice()).map_err(backend)?;
                scopes.insert(new_key.as_slice(), ()).map_err(backend)?;
            }
        }
        wt.commit().map_err(backend)?;
        Ok(StoreResponse::timed(entity.clone(), started))
    }

    fn query_scope(
        &self,
        employer: &str,
        team: &str,
        sprint_id: &str,
    ) -> StoreResult<StoreResponse<Vec<SprintPlanningEntity>>> {
        let started = Instant::now();
        let prefix = scope_prefix(employer, team, sprint_id);
        let upper = scope_upper_bound(&prefix);

        let rt = self.db.begin_read().map_err(backend)?;
        let scopes = rt.open_table(SCOPES).map_err(backend)?;
        let docs = rt.open_table(DOCUMENTS).map_err(backend)?;

        let mut result = Vec::new();
        for entry in scopes
            .range(prefix.as_slice()..upper.as_slice())
            .map_err(backend)?
        {
            let (k, _) = entry.map_err(backend)?;
            let id = std::str::from_utf8(&k.value()[prefix.len()..]).map_err(backend)?;
            match docs.get(id).map_err(backend)? {
                Some(v) => result.push(decode(v.value())?),
                None => tracing::warn!(id, "scope index entry without document"),
            }
        }
        Ok(StoreResponse::timed(result, started))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
