//! Read tracking.

use tracing::debug;

use super::log::MessageLog;
use super::registry::RoomRegistry;
use super::types::Message;
use crate::datetime::now_db_timestamp;
use crate::db::DbPool;
use crate::{Result, RoomcastError};

/// Tracks which users have acknowledged each message.
pub struct ReadTracker<'a> {
    pool: &'a DbPool,
}

impl<'a> ReadTracker<'a> {
    /// Create a new ReadTracker with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Add `user_id` to the message's read-by set.
    ///
    /// Repeated calls leave the set unchanged after the first one.
    pub async fn mark_read(&self, message_id: i64, user_id: i64) -> Result<Message> {
        let log = MessageLog::new(self.pool);
        let message = log
            .get(message_id)
            .await?
            .ok_or_else(|| RoomcastError::NotFound("message".to_string()))?;

        if !RoomRegistry::new(self.pool)
            .is_participant(message.room_id, user_id)
            .await?
        {
            return Err(RoomcastError::Authorization(
                "not a participant of this room".to_string(),
            ));
        }

        if message.is_read_by(user_id) {
            return Ok(message);
        }

        let result = sqlx::query(
            "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at) VALUES (?, ?, ?)",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(now_db_timestamp())
        .execute(self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(message_id, user_id, "Message marked as read");
        }

        let mut message = message;
        message.read_by.insert(user_id);
        Ok(message)
    }

    /// Number of messages in a room the user has not acknowledged.
    pub async fn unread_count(&self, room_id: i64, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages m
             WHERE m.room_id = ?
               AND NOT EXISTS (
                   SELECT 1 FROM message_reads r
                   WHERE r.message_id = m.id AND r.user_id = ?
               )",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::db::{Database, NewUser, UserRepository};

    async fn setup() -> (Database, i64, [i64; 3]) {
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
        let room = RoomRegistry::new(db.pool())
            .create("general", &[ids[1]], ids[0])
            .await
            .unwrap();
        (db, room.id, ids)
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let (db, room_id, [alice, bob, _]) = setup().await;
        let message = MessageLog::new(db.pool())
            .append(room_id, alice, "hi")
            .await
            .unwrap();
        let tracker = ReadTracker::new(db.pool());

        let first = tracker.mark_read(message.id, bob).await.unwrap();
        assert_eq!(first.read_by, BTreeSet::from([alice, bob]));

        let second = tracker.mark_read(message.id, bob).await.unwrap();
        assert_eq!(second.read_by, first.read_by);

        let stored = MessageLog::new(db.pool())
            .get(message.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.read_by, BTreeSet::from([alice, bob]));
    }

    #[tokio::test]
    async fn test_mark_read_by_sender_is_noop() {
        let (db, room_id, [alice, _, _]) = setup().await;
        let message = MessageLog::new(db.pool())
            .append(room_id, alice, "hi")
            .await
            .unwrap();

        let marked = ReadTracker::new(db.pool())
            .mark_read(message.id, alice)
            .await
            .unwrap();
        assert_eq!(marked.read_by, BTreeSet::from([alice]));
    }

    #[tokio::test]
    async fn test_mark_read_requires_participant() {
        let (db, room_id, [alice, _, carol]) = setup().await;
        let message = MessageLog::new(db.pool())
            .append(room_id, alice, "hi")
            .await
            .unwrap();
        let tracker = ReadTracker::new(db.pool());

        let result = tracker.mark_read(message.id, carol).await;
        assert!(matches!(result, Err(RoomcastError::Authorization(_))));

        let missing = tracker.mark_read(9999, alice).await;
        assert!(matches!(missing, Err(RoomcastError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unread_count() {
        let (db, room_id, [alice, bob, _]) = setup().await;
        let log = MessageLog::new(db.pool());
        let tracker = ReadTracker::new(db.pool());

        let first = log.append(room_id, alice, "one").await.unwrap();
        log.append(room_id, alice, "two").await.unwrap();
        log.append(room_id, bob, "three").await.unwrap();

        assert_eq!(tracker.unread_count(room_id, bob).await.unwrap(), 2);
        assert_eq!(tracker.unread_count(room_id, alice).await.unwrap(), 1);

        tracker.mark_read(first.id, bob).await.unwrap();
        assert_eq!(tracker.unread_count(room_id, bob).await.unwrap(), 1);
    }
}
