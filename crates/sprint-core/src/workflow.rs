//! Upsert-and-broadcast: the write path shared by both write endpoints.
//!
//! `Validate -> Resolve -> Commit`:
//! 1. a request with a blank required field is skipped without touching the
//!    store or the hub;
//! 2. the id is derived and read back; a failed read of any kind means
//!    "absent" and leads to `create`, a successful read leads to `replace`;
//! 3. the written entity is published as `sprintPlanningTeamData`.
//!
//! The read and the write are separate store calls, so two writers racing on
//! the same tuple can interleave. The last write wins; a lost create race
//! surfaces as `Conflict`.

use crate::entity::{IdScheme, SprintPlanRequest, SprintPlanningEntity, WritePath};
use crate::error::Result;
use crate::hub::{Broadcaster, TEAM_DATA_EVENT};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// A required field was blank; nothing was written or published.
    Skipped { missing: &'static str },
    /// The entity was persisted and published.
    Written {
        entity: SprintPlanningEntity,
        created: bool,
    },
}

pub fn upsert(
    store: &dyn DocumentStore,
    broadcaster: &dyn Broadcaster,
    scheme: IdScheme,
    path: WritePath,
    request: SprintPlanRequest,
) -> Result<UpsertOutcome> {
    // Validate
    if let Some(missing) = request.missing_field() {
        tracing::info!(path = path.as_str(), missing, "skipping write with blank field");
        return Ok(UpsertOutcome::Skipped { missing });
    }
    let entity = request.into_entity(path, scheme)?;
    let id = entity.id.as_str();

    // Resolve
    let created = match store.read(id, id) {
        Ok(_) => {
            let resp = store.replace(&entity, id, id)?;
            tracing::info!(id, charge = resp.request_charge, "replace cost");
            false
        }
        Err(e) => {
            if !matches!(e, StoreError::NotFound(_)) {
                tracing::warn!(id, error = %e, "read failed; treating document as absent");
            }
            let resp = store.create(&entity)?;
            tracing::info!(id, charge = resp.request_charge, "create cost");
            true
        }
    };

    // Commit
    broadcaster.publish(TEAM_DATA_EVENT, vec![entity.clone()])?;
    tracing::info!(id = %entity.id, path = path.as_str(), created, "item upserted");
    Ok(UpsertOutcome::Written { entity, created })
}

/// All records in an employer/team/sprint scope.
pub fn scope_records(
    store: &dyn DocumentStore,
    employer: &str,
    team: &str,
    sprint_id: &str,
) -> Result<Vec<SprintPlanningEntity>> {
    let resp = store.query_scope(employer, team, sprint_id)?;
    tracing::info!(
        employer,
        team,
        sprint_id,
        found = resp.resource.len(),
        charge = resp.request_charge,
        "scope query cost"
    );
    Ok(resp.resource)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
