//! Room handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::web::dto::{
    ApiResponse, CreateRoomRequest, DeleteResponse, RenameRoomRequest, RoomResponse,
    ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /api/rooms - Rooms of the caller, most recent activity first.
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<RoomResponse>>>, ApiError> {
    let rooms = state.chat.list_rooms(auth.user_id()).await?;
    Ok(Json(ApiResponse::new(
        rooms.into_iter().map(RoomResponse::from).collect(),
    )))
}

/// POST /api/rooms - Create a room.
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateRoomRequest>,
) -> Result<Json<ApiResponse<RoomResponse>>, ApiError> {
    let room = state
        .chat
        .create_room(auth.user_id(), &req.name, &req.participant_ids)
        .await?;
    Ok(Json(ApiResponse::new(room.into())))
}

/// GET /api/rooms/:id - Room details.
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(room_id): Path<i64>,
) -> Result<Json<ApiResponse<RoomResponse>>, ApiError> {
    let room = state.chat.get_room(auth.user_id(), room_id).await?;
    Ok(Json(ApiResponse::new(room.into())))
}

/// PATCH /api/rooms/:id - Rename a room.
pub async fn rename_room(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(room_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<RenameRoomRequest>,
) -> Result<Json<ApiResponse<RoomResponse>>, ApiError> {
    let room = state
        .chat
        .rename_room(auth.user_id(), room_id, &req.name)
        .await?;
    Ok(Json(ApiResponse::new(room.into())))
}

/// DELETE /api/rooms/:id - Delete a room and close its live subscriptions.
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(room_id): Path<i64>,
) -> Result<Json<ApiResponse<DeleteResponse>>, ApiError> {
    let deleted = state.chat.delete_room(auth.user_id(), room_id).await?;
    Ok(Json(ApiResponse::new(DeleteResponse { deleted })))
}
