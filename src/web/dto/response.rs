//! Response DTOs for the HTTP and WebSocket APIs.

use serde::{Deserialize, Serialize};

use crate::chat::{Message, Room, RoomSummary};
use crate::datetime::to_db_timestamp;
use crate::db::User;

/// Generic API response wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// User information in responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    /// User ID.
    pub id: i64,
    /// Username.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Email address.
    pub email: String,
    /// Profile picture reference.
    pub profile_picture: Option<String>,
    /// Account creation time (RFC 3339).
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            email: user.email,
            profile_picture: user.profile_picture,
            created_at: to_db_timestamp(&user.created_at),
        }
    }
}

/// Room in responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomResponse {
    /// Room ID.
    pub id: i64,
    /// Room name.
    pub name: String,
    /// Participant user IDs, ascending.
    pub participant_ids: Vec<i64>,
    /// Most recent message ID.
    pub last_message_id: Option<i64>,
    /// Position of the most recent message (0 when empty).
    pub last_position: i64,
    /// Creation time (RFC 3339).
    pub created_at: String,
    /// Time of the most recent message, or creation time (RFC 3339).
    pub last_activity_at: String,
    /// Unacknowledged messages for the caller (room listings only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<i64>,
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            id: room.id,
            name: room.name,
            participant_ids: room.participants.into_iter().collect(),
            last_message_id: room.last_message_id,
            last_position: room.last_position,
            created_at: to_db_timestamp(&room.created_at),
            last_activity_at: to_db_timestamp(&room.last_activity_at),
            unread_count: None,
        }
    }
}

impl From<RoomSummary> for RoomResponse {
    fn from(summary: RoomSummary) -> Self {
        Self {
            unread_count: Some(summary.unread_count),
            ..RoomResponse::from(summary.room)
        }
    }
}

/// Message in responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message ID.
    pub id: i64,
    /// Room ID.
    pub room_id: i64,
    /// Sender user ID.
    pub sender_id: i64,
    /// Message body.
    pub content: String,
    /// Append time (RFC 3339).
    pub sent_at: String,
    /// Per-room position.
    pub position: i64,
    /// Users who acknowledged the message, ascending.
    pub read_by: Vec<i64>,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            sent_at: to_db_timestamp(&message.sent_at),
            position: message.position,
            read_by: message.read_by.iter().copied().collect(),
        }
    }
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        MessageResponse::from(&message)
    }
}

/// Room deletion result.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Whether the room was deleted.
    pub deleted: bool,
}
