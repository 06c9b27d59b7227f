//! Room registry.
//!
//! Owns room records and their participant sets. Participant sets are fixed
//! at creation.

use std::collections::{BTreeMap, BTreeSet};

use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use super::log::purge_with;
use super::types::{Room, RoomRow};
use crate::datetime::now_db_timestamp;
use crate::db::{DbPool, UserRepository};
use crate::{Result, RoomcastError};

const ROOM_COLUMNS: &str =
    "r.id, r.name, r.last_message_id, r.last_position, r.created_at, r.last_activity_at";

/// Trim a room name and reject it if nothing is left.
fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RoomcastError::Validation("room name is empty".to_string()));
    }
    Ok(name.to_string())
}

/// Repository for rooms and their participants.
pub struct RoomRegistry<'a> {
    pool: &'a DbPool,
}

impl<'a> RoomRegistry<'a> {
    /// Create a new RoomRegistry with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a room. The creator is always a participant.
    ///
    /// Duplicate ids are collapsed. Every id must name an existing user.
    pub async fn create(
        &self,
        name: &str,
        participant_ids: &[i64],
        creator_id: i64,
    ) -> Result<Room> {
        let name = normalize_name(name)?;

        let participants: BTreeSet<i64> = participant_ids
            .iter()
            .copied()
            .chain(std::iter::once(creator_id))
            .collect();

        let existing = UserRepository::new(self.pool)
            .existing_ids(&participants)
            .await?;
        let unknown: Vec<String> = participants
            .difference(&existing)
            .map(|id| id.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(RoomcastError::Validation(format!(
                "unknown participant ids: {}",
                unknown.join(", ")
            )));
        }

        let now = now_db_timestamp();
        let mut tx = self.pool.begin().await?;

        let room_id: i64 = sqlx::query_scalar(
            "INSERT INTO rooms (name, created_at, last_activity_at)
             VALUES (?, ?, ?)
             RETURNING id",
        )
        .bind(&name)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

        let mut insert: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO room_participants (room_id, user_id) ");
        insert.push_values(&participants, |mut b, user_id| {
            b.push_bind(room_id).push_bind(*user_id);
        });
        insert.build().execute(&mut *tx).await?;

        tx.commit().await?;

        info!(
            room_id,
            creator_id,
            participants = participants.len(),
            "Room created"
        );

        self.get(room_id)
            .await?
            .ok_or_else(|| RoomcastError::NotFound("room".to_string()))
    }

    /// Get a room by ID, regardless of caller.
    pub async fn get(&self, room_id: i64) -> Result<Option<Room>> {
        let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms r WHERE r.id = ?");
        let row = sqlx::query_as::<_, RoomRow>(&sql)
            .bind(room_id)
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let participants = self.participants(room_id).await?;
        Ok(Some(row.into_room(participants)))
    }

    /// Get a room the caller participates in.
    ///
    /// A missing room and a room the caller cannot see both yield `NotFound`.
    pub async fn get_if_participant(&self, room_id: i64, caller_id: i64) -> Result<Room> {
        match self.get(room_id).await? {
            Some(room) if room.is_participant(caller_id) => Ok(room),
            _ => Err(RoomcastError::NotFound("room".to_string())),
        }
    }

    /// Participant IDs of a room (empty if the room does not exist).
    pub async fn participants(&self, room_id: i64) -> Result<BTreeSet<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT user_id FROM room_participants WHERE room_id = ? ORDER BY user_id",
        )
        .bind(room_id)
        .fetch_all(self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    /// Check whether a user participates in a room.
    pub async fn is_participant(&self, room_id: i64, user_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM room_participants WHERE room_id = ? AND user_id = ?)",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Rename a room.
    pub async fn rename(&self, room_id: i64, caller_id: i64, new_name: &str) -> Result<Room> {
        let room = self
            .get(room_id)
            .await?
            .ok_or_else(|| RoomcastError::NotFound("room".to_string()))?;
        if !room.is_participant(caller_id) {
            return Err(RoomcastError::Authorization(
                "only participants can rename a room".to_string(),
            ));
        }
        let name = normalize_name(new_name)?;

        sqlx::query("UPDATE rooms SET name = ? WHERE id = ?")
            .bind(&name)
            .bind(room_id)
            .execute(self.pool)
            .await?;

        debug!(room_id, caller_id, "Room renamed");

        Ok(Room { name, ..room })
    }

    /// Delete a room together with its messages and participant rows.
    ///
    /// Live subscriptions are not touched here; the caller closes them while
    /// holding the room's gate.
    pub async fn delete(&self, room_id: i64, caller_id: i64) -> Result<()> {
        let room = self
            .get(room_id)
            .await?
            .ok_or_else(|| RoomcastError::NotFound("room".to_string()))?;
        if !room.is_participant(caller_id) {
            return Err(RoomcastError::Authorization(
                "only participants can delete a room".to_string(),
            ));
        }

        // Every statement in this transaction writes, starting with the first,
        // so SQLite takes the write lock up front and waits on the busy timeout
        // instead of failing a read-to-write upgrade.
        let mut tx = self.pool.begin().await?;

        let purged = purge_with(&mut tx, room_id).await?;
        sqlx::query("DELETE FROM room_participants WHERE room_id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(RoomcastError::NotFound("room".to_string()));
        }

        tx.commit().await?;

        info!(room_id, caller_id, purged, "Room deleted");
        Ok(())
    }

    /// Rooms the user participates in, most recent activity first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Room>> {
        let sql = format!(
            "SELECT {ROOM_COLUMNS} FROM rooms r
             JOIN room_participants p ON p.room_id = r.id
             WHERE p.user_id = ?
             ORDER BY r.last_activity_at DESC, r.id DESC"
        );
        let rows = sqlx::query_as::<_, RoomRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let pairs: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT other.room_id, other.user_id
             FROM room_participants mine
             JOIN room_participants other ON other.room_id = mine.room_id
             WHERE mine.user_id = ?",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let mut participants: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for (room_id, user_id) in pairs {
            participants.entry(room_id).or_default().insert(user_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let members = participants.remove(&row.id).unwrap_or_default();
                row.into_room(members)
            })
            .collect())
    }
}
