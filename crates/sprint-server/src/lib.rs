pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use sprint_core::config::ServerConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Hub
        .route(
            "/negotiate",
            get(routes::negotiate::negotiate).post(routes::negotiate::negotiate),
        )
        .route("/hub/{hub}", get(routes::hub::subscribe))
        // Writes
        .route(
            "/createSprintPlanTeamMember",
            post(routes::sprint_plans::create_sprint_plan_team_member),
        )
        .route(
            "/createSprintPlan",
            post(routes::sprint_plans::create_sprint_plan),
        )
        // Reads
        .route(
            "/getSprintPlanningData/{employer}/{team}/{sprintId}",
            get(routes::sprint_plans::get_sprint_planning_data),
        )
        .route("/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the server on a pre-bound listener.
///
/// The caller binds the `TcpListener` so it can read the actual port before
/// starting (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on(
    mut config: ServerConfig,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    config.port = actual_port;
    let app_state = state::AppState::new(&config)?;
    let app = build_router(app_state);

    tracing::info!(
        "sprint planning server listening on http://localhost:{actual_port} (hub at {})",
        config.resolved_public_url()
    );

    axum::serve(listener, app).await?;
    Ok(())
}
