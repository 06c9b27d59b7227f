//! User handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::web::dto::{ApiResponse, UserResponse, UserSearchQuery};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /api/me - The authenticated user.
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.chat.me(auth.user_id()).await?;
    Ok(Json(ApiResponse::new(user.into())))
}

/// GET /api/users?q= - Search users to add to a room.
pub async fn search_users(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let users = state.chat.search_users(&query.q, query.limit).await?;
    Ok(Json(ApiResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
    )))
}
