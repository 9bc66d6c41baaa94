use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use sprint_core::hub::{Broadcaster, ConnectionInfo};

use crate::error::AppError;
use crate::state::AppState;

pub const CLIENT_ID_HEADER: &str = "x-client-id";

#[derive(Debug, Default, Deserialize)]
pub struct NegotiateQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// GET|POST /negotiate — hub URL and access token for the caller.
pub async fn negotiate(
    State(app): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NegotiateQuery>,
) -> Result<Json<ConnectionInfo>, AppError> {
    let client_id = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(query.user_id);
    let info = app.hub.negotiate(client_id.as_deref())?;
    Ok(Json(info))
}
