//! Request DTOs for the HTTP API.

use serde::Deserialize;
use validator::Validate;

use super::validation::non_blank_text;

/// Create room request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    /// Room name.
    #[validate(
        length(min = 1, max = 100, message = "Must be 1-100 characters"),
        custom(function = "non_blank_text")
    )]
    pub name: String,
    /// Other participants; the caller is always added.
    #[serde(default)]
    #[validate(length(max = 500, message = "Too many participants"))]
    pub participant_ids: Vec<i64>,
}

/// Rename room request.
#[derive(Debug, Deserialize, Validate)]
pub struct RenameRoomRequest {
    /// New room name.
    #[validate(
        length(min = 1, max = 100, message = "Must be 1-100 characters"),
        custom(function = "non_blank_text")
    )]
    pub name: String,
}

/// Send message request.
///
/// The length limit is configurable and enforced by the chat service.
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    /// Message body.
    #[validate(custom(function = "non_blank_text"))]
    pub content: String,
}

/// History paging query.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Page size (clamped server-side).
    pub limit: Option<u32>,
    /// Number of newest messages to skip.
    #[serde(default)]
    pub offset: u32,
}

/// User search query.
#[derive(Debug, Default, Deserialize)]
pub struct UserSearchQuery {
    /// Search term matched against username and email.
    #[serde(default)]
    pub q: String,
    /// Maximum number of results.
    pub limit: Option<u32>,
}
