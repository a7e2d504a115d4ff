pub mod access;
pub mod alerts;
pub mod auth;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod events;
pub mod mirrors;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod snapshot;
pub mod state;
pub mod sync;
pub mod telemetry;
pub mod tenants;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub fn build_app(state: SharedState) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
