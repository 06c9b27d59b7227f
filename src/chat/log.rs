//! Per-room append-only message log.
//!
//! Positions are assigned by the storage layer inside the append transaction,
//! so they stay gapless even if two processes share the database file.

use std::collections::{BTreeSet, HashMap};

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use super::types::{Message, MessageRow};
use crate::datetime::{now_db_timestamp, parse_db_timestamp};
use crate::db::DbPool;
use crate::{Result, RoomcastError};

const MESSAGE_COLUMNS: &str = "id, room_id, sender_id, position, content, sent_at";

/// Message IDs bound per read-receipt query, well under SQLite's variable limit.
const READ_BY_CHUNK: usize = 500;

/// Check message content against the length limit.
///
/// Content that is empty after trimming is rejected; the stored content keeps
/// its original whitespace.
pub fn validate_content(content: &str, max_length: usize) -> Result<()> {
    if content.trim().is_empty() {
        return Err(RoomcastError::Validation(
            "message content is empty".to_string(),
        ));
    }
    let length = content.chars().count();
    if length > max_length {
        return Err(RoomcastError::Validation(format!(
            "message content is too long ({length} > {max_length} characters)"
        )));
    }
    Ok(())
}

/// Message log backed by the `messages` table.
pub struct MessageLog<'a> {
    pool: &'a DbPool,
}

impl<'a> MessageLog<'a> {
    /// Create a new MessageLog with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Append a message to a room.
    ///
    /// The caller has already checked that the sender is a participant. Position
    /// assignment, the insert, the sender's read mark and the room's
    /// last-message pointer commit together or not at all.
    pub async fn append(&self, room_id: i64, sender_id: i64, content: &str) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(RoomcastError::Validation(
                "message content is empty".to_string(),
            ));
        }

        let sent_at = now_db_timestamp();
        let mut tx = self.pool.begin().await?;

        let position: i64 = sqlx::query_scalar(
            "UPDATE rooms SET last_position = last_position + 1
             WHERE id = ?
             RETURNING last_position",
        )
        .bind(room_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RoomcastError::NotFound("room".to_string()))?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages (room_id, sender_id, position, content, sent_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(room_id)
        .bind(sender_id)
        .bind(position)
        .bind(content)
        .bind(&sent_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO message_reads (message_id, user_id, read_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(sender_id)
            .bind(&sent_at)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE rooms SET last_message_id = ?, last_activity_at = ? WHERE id = ?")
            .bind(id)
            .bind(&sent_at)
            .bind(room_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(room_id, position, message_id = id, "Message appended");

        Ok(Message {
            id,
            room_id,
            sender_id,
            content: content.to_string(),
            sent_at: parse_db_timestamp(&sent_at),
            position,
            read_by: BTreeSet::from([sender_id]),
        })
    }

    /// Get a message by ID.
    pub async fn get(&self, message_id: i64) -> Result<Option<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?");
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(message_id)
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.attach_read_by(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Position of the room's newest message (0 if empty).
    pub async fn head(&self, room_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT last_position FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| RoomcastError::NotFound("room".to_string()))
    }

    /// Newest-first history strictly below `before_position`.
    ///
    /// `None` starts from the newest message. Feeding the oldest returned
    /// position back as the next cursor walks the log without skipping or
    /// repeating a position.
    pub async fn history(
        &self,
        room_id: i64,
        limit: u32,
        before_position: Option<i64>,
    ) -> Result<Vec<Message>> {
        let before = before_position.unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE room_id = ? AND position < ?
             ORDER BY position DESC
             LIMIT ?"
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(room_id)
            .bind(before)
            .bind(limit as i64)
            .fetch_all(self.pool)
            .await?;

        self.attach_read_by(rows).await
    }

    /// Newest-first history skipping the `offset` newest messages.
    pub async fn history_page(&self, room_id: i64, limit: u32, offset: u32) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE room_id = ?
             ORDER BY position DESC
             LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(room_id)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(self.pool)
            .await?;

        self.attach_read_by(rows).await
    }

    /// Messages with `after < position <= upto`, oldest first.
    pub async fn after(&self, room_id: i64, after: i64, upto: i64) -> Result<Vec<Message>> {
        if upto <= after {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE room_id = ? AND position > ? AND position <= ?
             ORDER BY position ASC"
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(room_id)
            .bind(after)
            .bind(upto)
            .fetch_all(self.pool)
            .await?;

        self.attach_read_by(rows).await
    }

    /// Remove every message of a room.
    pub async fn purge(&self, room_id: i64) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        purge_with(&mut *conn, room_id).await
    }

    async fn attach_read_by(&self, rows: Vec<MessageRow>) -> Result<Vec<Message>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut read_by: HashMap<i64, BTreeSet<i64>> = HashMap::new();
        for chunk in rows.chunks(READ_BY_CHUNK) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT message_id, user_id FROM message_reads WHERE message_id IN (",
            );
            let mut separated = query.separated(", ");
            for row in chunk {
                separated.push_bind(row.id);
            }
            query.push(")");

            let pairs = query
                .build_query_as::<(i64, i64)>()
                .fetch_all(self.pool)
                .await?;
            for (message_id, user_id) in pairs {
                read_by.entry(message_id).or_default().insert(user_id);
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let readers = read_by.remove(&row.id).unwrap_or_default();
                row.into_message(readers)
            })
            .collect())
    }
}

/// Remove every message of a room on an existing connection or transaction.
pub(crate) async fn purge_with(conn: &mut SqliteConnection, room_id: i64) -> Result<u64> {
    sqlx::query(
        "DELETE FROM message_reads
         WHERE message_id IN (SELECT id FROM messages WHERE room_id = ?)",
    )
    .bind(room_id)
    .execute(&mut *conn)
    .await?;

    let result = sqlx::query("DELETE FROM messages WHERE room_id = ?")
        .bind(room_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}
