//! WebSocket frame types.

use serde::{Deserialize, Serialize};

use crate::web::dto::MessageResponse;

/// Frames sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a room view.
    ///
    /// Without `cursor` the server replies with the newest history page and
    /// streams everything after it. With `cursor` it streams everything after
    /// the cursor and sends no history.
    Subscribe {
        /// Room ID.
        room_id: i64,
        /// Last position the client has seen.
        #[serde(default)]
        cursor: Option<i64>,
        /// History page size.
        #[serde(default)]
        limit: Option<u32>,
    },
    /// Close a room view.
    Unsubscribe {
        /// Room ID.
        room_id: i64,
    },
    /// Send a message.
    Send {
        /// Room ID.
        room_id: i64,
        /// Message body.
        content: String,
    },
    /// Acknowledge a message.
    MarkRead {
        /// Message ID.
        message_id: i64,
    },
    /// Heartbeat ping.
    Ping,
}

/// Frames sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A room view was opened.
    Subscribed {
        /// Room ID.
        room_id: i64,
        /// Newest-first history page.
        history: Vec<MessageResponse>,
        /// Position live delivery continues from.
        cursor: i64,
    },
    /// A live message.
    Message {
        /// The message.
        message: MessageResponse,
    },
    /// A room the client had open was deleted.
    RoomClosed {
        /// Room ID.
        room_id: i64,
    },
    /// A room view ended for another reason; reopen with `cursor` to resume.
    SubscriptionEnded {
        /// Room ID.
        room_id: i64,
        /// Why it ended.
        reason: String,
        /// Last position delivered.
        cursor: i64,
    },
    /// A room view was closed on request.
    Unsubscribed {
        /// Room ID.
        room_id: i64,
    },
    /// A `send` was accepted.
    Sent {
        /// The appended message.
        message: MessageResponse,
    },
    /// A `mark_read` was applied.
    Read {
        /// The acknowledged message.
        message: MessageResponse,
    },
    /// Error message.
    Error {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
    },
    /// Heartbeat pong response.
    Pong,
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}
