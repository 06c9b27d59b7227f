//! Connection sessions.
//!
//! One session per live connection. A session holds at most one subscription
//! per room and multiplexes them into a single event stream.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::select_all;
use tracing::{debug, info};
use uuid::Uuid;

use super::hub::{CloseReason, Subscription};
use super::log::MessageLog;
use super::service::ChatService;
use super::types::Message;
use crate::Result;

/// Something that happened on one of the session's rooms.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A message to forward to the client.
    Message(Arc<Message>),
    /// A room's subscription ended. Resume from `cursor` to continue.
    Closed {
        /// Room ID.
        room_id: i64,
        /// Why it ended.
        reason: CloseReason,
        /// Last position delivered.
        cursor: i64,
    },
}

/// Result of opening a room view.
#[derive(Debug, Clone)]
pub struct RoomOpened {
    /// Room ID.
    pub room_id: i64,
    /// Newest-first history page (empty when resuming from a cursor).
    pub history: Vec<Message>,
    /// Position the live stream continues from.
    pub cursor: i64,
}

/// Live connection state for one user.
pub struct ConnectionSession {
    id: Uuid,
    user_id: i64,
    service: ChatService,
    subscriptions: HashMap<i64, Subscription>,
}

impl ConnectionSession {
    pub(crate) fn new(service: ChatService, user_id: i64) -> Self {
        let id = Uuid::new_v4();
        info!(session_id = %id, user_id, "Session opened");
        Self {
            id,
            user_id,
            service,
            subscriptions: HashMap::new(),
        }
    }

    /// Session ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// User the session belongs to.
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Rooms with an open subscription, ascending.
    pub fn room_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.subscriptions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Check if a room is open.
    pub fn is_open(&self, room_id: i64) -> bool {
        self.subscriptions.contains_key(&room_id)
    }

    /// Open a room view.
    ///
    /// Without a cursor, the newest history page is read first and the live
    /// stream continues right after its newest message. With a cursor, no
    /// history is returned and every message after the cursor is streamed.
    /// Either way no message is skipped or repeated across the boundary.
    /// Reopening a room replaces its previous subscription; if the reopen
    /// fails, the previous subscription keeps delivering.
    pub async fn open_room(
        &mut self,
        room_id: i64,
        limit: Option<u32>,
        cursor: Option<i64>,
    ) -> Result<RoomOpened> {
        self.service.get_room(self.user_id, room_id).await?;

        let (history, resume) = match cursor {
            Some(cursor) => (Vec::new(), cursor.max(0)),
            None => {
                let limit = self.service.config().history_limit(limit);
                let history = MessageLog::new(self.service.db().pool())
                    .history(room_id, limit, None)
                    .await?;
                let newest = history.first().map_or(0, |m| m.position);
                (history, newest)
            }
        };

        let subscription = self
            .service
            .subscribe_room_messages(self.user_id, room_id, Some(resume))
            .await?;
        let cursor = subscription.cursor();
        // The previous view stays live until its replacement is registered
        if let Some(previous) = self.subscriptions.insert(room_id, subscription) {
            previous.cancel();
        }

        debug!(
            session_id = %self.id,
            room_id,
            cursor,
            history = history.len(),
            "Room opened"
        );

        Ok(RoomOpened {
            room_id,
            history,
            cursor,
        })
    }

    /// Close a room view. Returns false if it was not open.
    pub fn close_room(&mut self, room_id: i64) -> bool {
        match self.subscriptions.remove(&room_id) {
            Some(subscription) => {
                subscription.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait for the next event on any open room.
    ///
    /// Pending forever while no room is open. Cancel safe.
    pub async fn next_event(&mut self) -> SessionEvent {
        if self.subscriptions.is_empty() {
            return std::future::pending().await;
        }

        let (room_id, received) = {
            let pending = self.subscriptions.iter_mut().map(|(room_id, subscription)| {
                let room_id = *room_id;
                Box::pin(async move { (room_id, subscription.recv().await) })
            });
            let (ready, _, _) = select_all(pending).await;
            ready
        };

        if let Some(message) = received {
            return SessionEvent::Message(message);
        }

        let (reason, cursor) = match self.subscriptions.remove(&room_id) {
            Some(subscription) => (
                subscription
                    .close_reason()
                    .unwrap_or(CloseReason::Unsubscribed),
                subscription.cursor(),
            ),
            None => (CloseReason::Unsubscribed, 0),
        };

        debug!(session_id = %self.id, room_id, %reason, cursor, "Room subscription ended");
        SessionEvent::Closed {
            room_id,
            reason,
            cursor,
        }
    }

    /// Drop every subscription.
    pub fn disconnect(mut self) {
        let rooms = self.subscriptions.len();
        self.subscriptions.clear();
        info!(session_id = %self.id, user_id = self.user_id, rooms, "Session closed");
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("rooms", &self.room_ids())
            .finish()
    }
}
