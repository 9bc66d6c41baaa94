use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Instant;

use super::{check_replace_target, DocumentStore, StoreError, StoreResponse, StoreResult};
use crate::entity::SprintPlanningEntity;

/// In-process [`DocumentStore`]. Used when no database path is configured.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, SprintPlanningEntity>>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("memory store lock poisoned".into())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryStore {
    fn read(
        &self,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<StoreResponse<SprintPlanningEntity>> {
        let started = Instant::now();
        if partition_key != id {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let docs = self.docs.read().map_err(poisoned)?;
        let entity = docs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(StoreResponse::timed(entity, started))
    }

    fn create(
        &self,
        entity: &SprintPlanningEntity,
    ) -> StoreResult<StoreResponse<SprintPlanningEntity>> {
        let started = Instant::now();
        let mut docs = self.docs.write().map_err(poisoned)?;
        if docs.contains_key(&entity.id) {
            return Err(StoreError::Conflict(entity.id.clone()));
        }
        docs.insert(entity.id.clone(), entity.clone());
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
        let mut docs = self.docs.write().map_err(poisoned)?;
        match docs.get_mut(id) {
            Some(slot) => *slot = entity.clone(),
            None => return Err(StoreError::NotFound(id.to_string())),
        }
        Ok(StoreResponse::timed(entity.clone(), started))
    }

    fn query_scope(
        &self,
        employer: &str,
        team: &str,
        sprint_id: &str,
    ) -> StoreResult<StoreResponse<Vec<SprintPlanningEntity>>> {
        let started = Instant::now();
        let docs = self.docs.read().map_err(poisoned)?;
        let found = docs
            .values()
            .filter(|e| e.in_scope(employer, team, sprint_id))
            .cloned()
            .collect();
        Ok(StoreResponse::timed(found, started))
    }
}
