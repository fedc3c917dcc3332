//! Authoritative realtime server for mousetrap, a multi-room hidden-card
//! party game. Clients connect over a WebSocket plus a small HTTP surface;
//! the server owns all state and rules, and clients are untrusted views.

use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod broadcast;
pub mod config;
pub mod http;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod telemetry;
pub mod util;
pub mod ws;

use http::routes::AppState;
use registry::Registry;

/// Build the full application router over a registry.
pub fn router(registry: Arc<Registry>) -> Router {
    let state = AppState { registry };
    Router::new()
        .route("/healthz", get(http::routes::healthz))
        .route("/rooms", post(http::routes::create_room))
        .route("/rooms/join", post(http::routes::join_room))
        .route("/ws", get(ws::connection::ws_handler))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
