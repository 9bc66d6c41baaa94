use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use sprint_core::entity::{SprintPlanRequest, WritePath};
use sprint_core::workflow::{self, UpsertOutcome};

use crate::error::AppError;
use crate::state::AppState;

/// POST /createSprintPlanTeamMember — upsert a member; `points` is cleared.
pub async fn create_sprint_plan_team_member(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Response, AppError> {
    write(app, WritePath::TeamMember, body).await
}

/// POST /createSprintPlan — upsert a member's estimate including `points`.
pub async fn create_sprint_plan(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Response, AppError> {
    write(app, WritePath::SprintPlan, body).await
}

async fn write(app: AppState, path: WritePath, body: Bytes) -> Result<Response, AppError> {
    // Parsed here rather than by the `Json` extractor so a malformed body is
    // reported like any other failure.
    let request: SprintPlanRequest = serde_json::from_slice(&body)?;
    let strict = app.strict_validation;

    let outcome = tokio::task::spawn_blocking(move || {
        workflow::upsert(
            app.store.as_ref(),
            app.hub.as_ref(),
            app.id_scheme,
            path,
            request,
        )
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    match outcome {
        UpsertOutcome::Skipped { missing } if strict => Err(AppError::missing_field(missing)),
        UpsertOutcome::Skipped { .. } => Ok(StatusCode::OK.into_response()),
        UpsertOutcome::Written { entity, .. } => Ok(Json(entity).into_response()),
    }
}

/// GET /getSprintPlanningData/:employer/:team/:sprintId — every member in the
/// sprint; 404 when there are none.
pub async fn get_sprint_planning_data(
    State(app): State<AppState>,
    Path((employer, team, sprint_id)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let records = tokio::task::spawn_blocking(move || {
        workflow::scope_records(app.store.as_ref(), &employer, &team, &sprint_id)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    if records.is_empty() {
        tracing::info!("could not find sprint planning data");
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    Ok(Json(records).into_response())
}
