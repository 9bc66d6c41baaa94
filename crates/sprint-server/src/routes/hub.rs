use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HubQuery {
    pub access_token: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// GET /hub/:hub — SSE stream of published events for a negotiated client.
///
/// Each event is named after its target and carries the JSON arguments array.
pub async fn subscribe(
    State(app): State<AppState>,
    Path(hub): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HubQuery>,
) -> Result<impl IntoResponse, AppError> {
    if hub != app.hub.name() {
        return Err(AppError::not_found(format!("unknown hub '{hub}'")));
    }
    let token = bearer_token(&headers)
        .or(query.access_token)
        .ok_or_else(|| AppError::unauthorized("missing access token"))?;
    let claims = app.hub.verify(&token)?;
    tracing::info!(client = %claims.sub, hub = %hub, "hub subscriber connected");

    let rx = app.hub.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("hub subscriber dropped messages: {e}");
                return None;
            }
        };
        Event::default()
            .event(msg.target.as_str())
            .json_data(&msg.arguments)
            .ok()
            .map(Ok::<Event, Infallible>)
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
