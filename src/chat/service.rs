//! Chat service.
//!
//! Entry point for every chat operation. Each call takes the authenticated
//! caller's user ID and enforces room membership before touching the log or
//! the hub.

use std::sync::Arc;

use tracing::{debug, info};

use super::hub::{BroadcastHub, Subscription};
use super::log::{validate_content, MessageLog};
use super::read::ReadTracker;
use super::registry::RoomRegistry;
use super::session::ConnectionSession;
use super::types::{Message, Room, RoomSummary};
use crate::config::ChatConfig;
use crate::db::{Database, DbPool, User, UserRepository};
use crate::{Result, RoomcastError};

/// Chat service shared by all request handlers and live connections.
#[derive(Clone)]
pub struct ChatService {
    db: Arc<Database>,
    hub: Arc<BroadcastHub>,
    config: Arc<ChatConfig>,
}

impl ChatService {
    /// Create a service with its own broadcast hub.
    pub fn new(db: Arc<Database>, config: ChatConfig) -> Self {
        let hub = Arc::new(BroadcastHub::new(config.subscriber_buffer));
        Self {
            db,
            hub,
            config: Arc::new(config),
        }
    }

    /// Database handle.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Broadcast hub.
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Chat configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    fn pool(&self) -> &DbPool {
        self.db.pool()
    }

    /// The caller's own user record.
    pub async fn me(&self, caller_id: i64) -> Result<User> {
        UserRepository::new(self.pool())
            .get_by_id(caller_id)
            .await?
            .ok_or_else(|| RoomcastError::NotFound("user".to_string()))
    }

    /// Search users by username or email.
    pub async fn search_users(&self, term: &str, limit: Option<u32>) -> Result<Vec<User>> {
        let limit = self.config.search_limit(limit);
        UserRepository::new(self.pool()).search(term, limit).await
    }

    /// Create a room with the caller as a participant.
    pub async fn create_room(
        &self,
        caller_id: i64,
        name: &str,
        participant_ids: &[i64],
    ) -> Result<Room> {
        RoomRegistry::new(self.pool())
            .create(name, participant_ids, caller_id)
            .await
    }

    /// Rename a room the caller participates in.
    pub async fn rename_room(&self, caller_id: i64, room_id: i64, name: &str) -> Result<Room> {
        RoomRegistry::new(self.pool())
            .rename(room_id, caller_id, name)
            .await
    }

    /// Delete a room, its messages and every live subscription to it.
    ///
    /// Subscribers end with a room-closed signal before this returns.
    pub async fn delete_room(&self, caller_id: i64, room_id: i64) -> Result<bool> {
        let registry = RoomRegistry::new(self.pool());
        let room = registry
            .get(room_id)
            .await?
            .ok_or_else(|| RoomcastError::NotFound("room".to_string()))?;
        if !room.is_participant(caller_id) {
            return Err(RoomcastError::Authorization(
                "only participants can delete a room".to_string(),
            ));
        }

        let guard = self.hub.lock_room(room_id).await?;
        registry.delete(room_id, caller_id).await?;
        let closed = guard.close().await;

        info!(room_id, caller_id, closed, "Room deleted and subscribers closed");
        Ok(true)
    }

    /// Rooms the caller participates in, most recent activity first.
    pub async fn list_rooms(&self, caller_id: i64) -> Result<Vec<RoomSummary>> {
        let rooms = RoomRegistry::new(self.pool())
            .list_for_user(caller_id)
            .await?;
        let tracker = ReadTracker::new(self.pool());

        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            let unread_count = tracker.unread_count(room.id, caller_id).await?;
            summaries.push(RoomSummary { room, unread_count });
        }
        Ok(summaries)
    }

    /// A room the caller participates in.
    pub async fn get_room(&self, caller_id: i64, room_id: i64) -> Result<Room> {
        RoomRegistry::new(self.pool())
            .get_if_participant(room_id, caller_id)
            .await
    }

    /// Append a message and deliver it to the room's live subscribers.
    pub async fn send_message(&self, caller_id: i64, room_id: i64, content: &str) -> Result<Message> {
        validate_content(content, self.config.max_message_length)?;

        let room = self.get_room(caller_id, room_id).await?;

        let guard = self.hub.lock_room(room_id).await?;
        let message = MessageLog::new(self.pool())
            .append(room_id, caller_id, content)
            .await?;
        let delivered = guard.publish(Arc::new(message.clone()), &room.participants);
        drop(guard);

        debug!(
            room_id,
            position = message.position,
            delivered,
            "Message sent"
        );
        Ok(message)
    }

    /// Newest-first page of a room's history.
    pub async fn get_history(
        &self,
        caller_id: i64,
        room_id: i64,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<Message>> {
        self.get_room(caller_id, room_id).await?;
        let limit = self.config.history_limit(limit);
        MessageLog::new(self.pool())
            .history_page(room_id, limit, offset)
            .await
    }

    /// Acknowledge a message.
    pub async fn mark_read(&self, caller_id: i64, message_id: i64) -> Result<Message> {
        ReadTracker::new(self.pool())
            .mark_read(message_id, caller_id)
            .await
    }

    /// Live sequence of a room's messages.
    ///
    /// With `resume_position`, every message above it is yielded exactly once,
    /// in order: the ones already in the log first, then live ones. Without it
    /// only messages appended after this call are yielded.
    pub async fn subscribe_room_messages(
        &self,
        caller_id: i64,
        room_id: i64,
        resume_position: Option<i64>,
    ) -> Result<Subscription> {
        self.get_room(caller_id, room_id).await?;

        let resume = resume_position.unwrap_or(i64::MAX);
        self.hub
            .subscribe(self.pool(), room_id, resume, caller_id)
            .await
    }

    /// Start a live connection session for the caller.
    pub fn open_session(&self, caller_id: i64) -> ConnectionSession {
        ConnectionSession::new(self.clone(), caller_id)
    }

    /// End every live subscription.
    pub async fn shutdown(&self) {
        self.hub.shutdown().await;
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::hub::CloseReason;
    use crate::db::NewUser;

    async fn setup() -> (ChatService, [i64; 3]) {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool());
        let mut ids = [0; 3];
        for (i, name) in ["alice", "bob", "carol"].iter().enumerate() {
            ids[i] = users
                .create(&NewUser::new(*name, format!("{name}@example.com")))
                .await
                .unwrap()
                .id;
        }
        (ChatService::new(Arc::new(db), ChatConfig::default()), ids)
    }

    #[tokio::test]
    async fn test_send_and_history() {
        let (service, [alice, bob, _]) = setup().await;
        let room = service.create_room(alice, "general", &[bob]).await.unwrap();

        service.send_message(alice, room.id, "one").await.unwrap();
        service.send_message(bob, room.id, "two").await.unwrap();

        let history = service
            .get_history(alice, room.id, None, 0)
            .await
            .unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "one"]);
    }

    #[tokio::test]
    async fn test_send_rejects_long_content() {
        let (service, [alice, bob, _]) = setup().await;
        let room = service.create_room(alice, "general", &[bob]).await.unwrap();

        let long = "x".repeat(service.config().max_message_length + 1);
        let result = service.send_message(alice, room.id, &long).await;
        assert!(matches!(result, Err(RoomcastError::Validation(_))));
    }

    #[tokio::test]
    async fn test_outsider_sees_nothing() {
        let (service, [alice, bob, carol]) = setup().await;
        let room = service.create_room(alice, "general", &[bob]).await.unwrap();
        service.send_message(alice, room.id, "secret").await.unwrap();

        assert!(matches!(
            service.get_history(carol, room.id, None, 0).await,
            Err(RoomcastError::NotFound(_))
        ));
        assert!(matches!(
            service.send_message(carol, room.id, "hi").await,
            Err(RoomcastError::NotFound(_))
        ));
        assert!(matches!(
            service.subscribe_room_messages(carol, room.id, None).await,
            Err(RoomcastError::NotFound(_))
        ));
        assert!(service.list_rooms(carol).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_live_subscriber_receives_message() {
        let (service, [alice, bob, _]) = setup().await;
        let room = service.create_room(alice, "general", &[bob]).await.unwrap();

        let mut sub = service
            .subscribe_room_messages(bob, room.id, Some(0))
            .await
            .unwrap();
        let sent = service.send_message(alice, room.id, "hi").await.unwrap();

        let received = sub.recv().await.unwrap();
        assert_eq!(received.id, sent.id);
        assert_eq!(received.position, 1);
    }

    #[tokio::test]
    async fn test_resume_replays_from_log() {
        let (service, [alice, bob, _]) = setup().await;
        let room = service.create_room(alice, "general", &[bob]).await.unwrap();
        for i in 1..=3 {
            service
                .send_message(alice, room.id, &format!("m{i}"))
                .await
                .unwrap();
        }

        let mut sub = service
            .subscribe_room_messages(bob, room.id, Some(1))
            .await
            .unwrap();
        service.send_message(alice, room.id, "m4").await.unwrap();

        let mut positions = Vec::new();
        for _ in 0..3 {
            positions.push(sub.recv().await.unwrap().position);
        }
        assert_eq!(positions, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_delete_room_closes_subscribers() {
        let (service, [alice, bob, carol]) = setup().await;
        let room = service.create_room(alice, "general", &[bob]).await.unwrap();
        let mut sub = service
            .subscribe_room_messages(bob, room.id, None)
            .await
            .unwrap();

        assert!(matches!(
            service.delete_room(carol, room.id).await,
            Err(RoomcastError::Authorization(_))
        ));
        assert!(service.delete_room(alice, room.id).await.unwrap());

        assert!(sub.recv().await.is_none());
        assert_eq!(sub.close_reason(), Some(CloseReason::RoomClosed));
        assert!(matches!(
            service.get_room(alice, room.id).await,
            Err(RoomcastError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_room(alice, room.id).await,
            Err(RoomcastError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_rooms_with_unread() {
        let (service, [alice, bob, _]) = setup().await;
        let room = service.create_room(alice, "general", &[bob]).await.unwrap();
        service.send_message(alice, room.id, "one").await.unwrap();
        let second = service.send_message(alice, room.id, "two").await.unwrap();

        let rooms = service.list_rooms(bob).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].unread_count, 2);

        service.mark_read(bob, second.id).await.unwrap();
        let rooms = service.list_rooms(bob).await.unwrap();
        assert_eq!(rooms[0].unread_count, 1);
        assert_eq!(rooms[0].room.last_message_id, Some(second.id));
    }

    #[tokio::test]
    async fn test_me_and_search() {
        let (service, [alice, _, _]) = setup().await;
        assert_eq!(service.me(alice).await.unwrap().username, "alice");
        assert!(matches!(
            service.me(9999).await,
            Err(RoomcastError::NotFound(_))
        ));

        let found = service.search_users("bo", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "bob");
    }

    #[tokio::test]
    async fn test_search_uses_its_own_limit() {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool());
        for i in 0..6 {
            users
                .create(&NewUser::new(format!("user{i}"), format!("user{i}@example.com")))
                .await
                .unwrap();
        }
        let config = ChatConfig {
            max_history_limit: 2,
            default_search_limit: 4,
            ..ChatConfig::default()
        };
        let service = ChatService::new(Arc::new(db), config);

        assert_eq!(service.search_users("user", None).await.unwrap().len(), 4);
        assert_eq!(service.search_users("user", Some(10)).await.unwrap().len(), 6);
        assert_eq!(service.search_users("user", Some(1)).await.unwrap().len(), 1);
    }
}
