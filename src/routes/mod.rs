//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the websocket session endpoints and the small REST
//! surface for room lookup and allocation under a single Axum router.

pub mod rooms;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/ws/{room_code}", get(ws::handle_room_ws))
        .route("/api/rooms", post(rooms::create_room))
        .route("/api/rooms/{room_code}", get(rooms::get_room))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
