//! Message handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::web::dto::{
    ApiResponse, HistoryQuery, MessageResponse, SendMessageRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /api/rooms/:id/messages - Newest-first history page.
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(room_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<MessageResponse>>>, ApiError> {
    let messages = state
        .chat
        .get_history(auth.user_id(), room_id, query.limit, query.offset)
        .await?;
    Ok(Json(ApiResponse::new(
        messages.into_iter().map(MessageResponse::from).collect(),
    )))
}

/// POST /api/rooms/:id/messages - Send a message.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(room_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let message = state
        .chat
        .send_message(auth.user_id(), room_id, &req.content)
        .await?;
    Ok(Json(ApiResponse::new(message.into())))
}

/// POST /api/messages/:id/read - Acknowledge a message.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(message_id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let message = state.chat.mark_read(auth.user_id(), message_id).await?;
    Ok(Json(ApiResponse::new(message.into())))
}
