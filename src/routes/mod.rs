//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the REST command surface and the websocket gateway
//! under a single Axum router. Both paths call the same session store, so a
//! REST mutation reaches websocket subscribers exactly like a websocket one.

pub mod sessions;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/session", post(sessions::create_session))
        .route(
            "/api/session/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/api/session/{id}/join", post(sessions::join_session))
        .route("/api/session/{id}/rejoin", post(sessions::rejoin_session))
        .route("/api/session/{id}/complete", post(sessions::complete_session))
        .route("/api/session/{id}/tags", post(sessions::add_tag))
        .route("/api/session/{id}/tags/{tag_id}/vote", post(sessions::vote))
        .route("/api/classify", post(sessions::classify))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
