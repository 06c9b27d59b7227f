//! Router configuration for the HTTP and WebSocket API.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_room, delete_room, get_me, get_room, list_messages, list_rooms, mark_read, rename_room,
    search_users, send_message, AppState,
};
use super::middleware::{authenticate, create_cors_layer, SharedAuthenticator};
use super::ws::chat_ws_handler;

/// Create the main API router.
///
/// Every `/api` route requires a session token, either as a bearer header or
/// as a `token` query parameter (the latter for WebSocket upgrades).
pub fn create_router(
    app_state: Arc<AppState>,
    authenticator: SharedAuthenticator,
    cors_origins: &[String],
) -> Router {
    let room_routes = Router::new()
        .route("/", get(list_rooms).post(create_room))
        .route("/:id", get(get_room).patch(rename_room).delete(delete_room))
        .route("/:id/messages", get(list_messages).post(send_message));

    let api_routes = Router::new()
        .route("/me", get(get_me))
        .route("/users", get(search_users))
        .nest("/rooms", room_routes)
        .route("/messages/:id/read", post(mark_read))
        .route("/ws", get(chat_ws_handler));

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(move |req, next| {
                    let authenticator = authenticator.clone();
                    authenticate(authenticator, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
