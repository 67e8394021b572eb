//! Axum router configuration with middleware.
//!
//! Chat routes are under `/api/v1/`; `/health` sits at the root.
//! Middleware: CORS, request tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/chats",
            post(handlers::chat::create_chat).get(handlers::chat::list_chats),
        )
        .route("/chats/{id}", get(handlers::chat::get_chat))
        .route("/chats/{id}/messages", post(handlers::chat::send_message))
        .route("/chats/{id}/retry", post(handlers::chat::retry_reply));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::health::health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
