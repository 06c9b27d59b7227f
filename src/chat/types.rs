//! Chat records shared by the registry, log and hub.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::datetime::parse_db_timestamp;

/// A chat room with a fixed participant set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Room ID.
    pub id: i64,
    /// Display name (never empty).
    pub name: String,
    /// Participant user IDs. Always contains the creator.
    pub participants: BTreeSet<i64>,
    /// Most recent message, if any.
    pub last_message_id: Option<i64>,
    /// Position of the most recent message (0 for an empty room).
    pub last_position: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Time of the most recent message, or creation time.
    pub last_activity_at: DateTime<Utc>,
}

impl Room {
    /// Check if a user is a participant.
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.participants.contains(&user_id)
    }
}

/// Room row without its participant set.
#[derive(sqlx::FromRow)]
pub(crate) struct RoomRow {
    pub(crate) id: i64,
    name: String,
    last_message_id: Option<i64>,
    last_position: i64,
    created_at: String,
    last_activity_at: String,
}

impl RoomRow {
    pub(crate) fn into_room(self, participants: BTreeSet<i64>) -> Room {
        Room {
            id: self.id,
            name: self.name,
            participants,
            last_message_id: self.last_message_id,
            last_position: self.last_position,
            created_at: parse_db_timestamp(&self.created_at),
            last_activity_at: parse_db_timestamp(&self.last_activity_at),
        }
    }
}

/// A room as listed for one user.
#[derive(Debug, Clone)]
pub struct RoomSummary {
    /// The room.
    pub room: Room,
    /// Messages in the room the user has not acknowledged.
    pub unread_count: i64,
}

/// An appended chat message. Content and position never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message ID.
    pub id: i64,
    /// Room the message belongs to.
    pub room_id: i64,
    /// Sender user ID.
    pub sender_id: i64,
    /// Message body.
    pub content: String,
    /// Time of append.
    pub sent_at: DateTime<Utc>,
    /// Per-room sequence number, starting at 1 with no gaps.
    pub position: i64,
    /// Users who acknowledged the message. Always contains the sender.
    pub read_by: BTreeSet<i64>,
}

impl Message {
    /// Check if a user has acknowledged the message.
    pub fn is_read_by(&self, user_id: i64) -> bool {
        self.read_by.contains(&user_id)
    }
}

/// Message row without its read-by set.
#[derive(sqlx::FromRow)]
pub(crate) struct MessageRow {
    pub(crate) id: i64,
    room_id: i64,
    sender_id: i64,
    position: i64,
    content: String,
    sent_at: String,
}

impl MessageRow {
    pub(crate) fn into_message(self, read_by: BTreeSet<i64>) -> Message {
        Message {
            id: self.id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            content: self.content,
            sent_at: parse_db_timestamp(&self.sent_at),
            position: self.position,
            read_by,
        }
    }
}
