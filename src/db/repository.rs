//! User repository for roomcast.

use std::collections::BTreeSet;

use sqlx::{QueryBuilder, Sqlite};

use super::user::{NewUser, User, UserRow};
use super::DbPool;
use crate::datetime::now_db_timestamp;
use crate::{Result, RoomcastError};

const USER_COLUMNS: &str = "id, username, display_name, email, profile_picture, created_at";

/// Repository for user lookups.
pub struct UserRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    ///
    /// Used for seeding; account registration lives with the identity provider.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, display_name, email, profile_picture, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&new_user.username)
        .bind(&new_user.display_name)
        .bind(&new_user.email)
        .bind(&new_user.profile_picture)
        .bind(now_db_timestamp())
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| RoomcastError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(User::from))
    }

    /// Get several users by ID. Unknown ids are skipped.
    pub async fn get_many(&self, ids: &BTreeSet<i64>) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE id IN ("));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        query.push(") ORDER BY id");

        let rows = query
            .build_query_as::<UserRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Return the subset of `ids` that name existing users.
    pub async fn existing_ids(&self, ids: &BTreeSet<i64>) -> Result<BTreeSet<i64>> {
        Ok(self
            .get_many(ids)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect())
    }

    /// Search users by username or email (case-insensitive substring).
    pub async fn search(&self, term: &str, limit: u32) -> Result<Vec<User>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = format!(
            "%{}%",
            term.replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE username LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\'
             ORDER BY username
             LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(pattern)
            .bind(limit as i64)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        let user = repo
            .create(&NewUser::new("alice", "alice@example.com").with_display_name("Alice"))
            .await
            .unwrap();
        assert!(user.id > 0);
        assert_eq!(user.display_name, "Alice");

        let fetched = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched, user);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        repo.create(&NewUser::new("alice", "a1@example.com"))
            .await
            .unwrap();
        let result = repo.create(&NewUser::new("alice", "a2@example.com")).await;
        assert!(matches!(result, Err(RoomcastError::Storage(_))));
    }

    #[tokio::test]
    async fn test_existing_ids() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        let alice = repo
            .create(&NewUser::new("alice", "alice@example.com"))
            .await
            .unwrap();
        let bob = repo
            .create(&NewUser::new("bob", "bob@example.com"))
            .await
            .unwrap();

        let wanted: BTreeSet<i64> = [alice.id, bob.id, 9999].into_iter().collect();
        let existing = repo.existing_ids(&wanted).await.unwrap();
        assert_eq!(existing, [alice.id, bob.id].into_iter().collect());

        assert!(repo.existing_ids(&BTreeSet::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        repo.create(&NewUser::new("alice", "alice@example.com"))
            .await
            .unwrap();
        repo.create(&NewUser::new("bob", "bob@corp.example"))
            .await
            .unwrap();
        repo.create(&NewUser::new("malice_100", "m@example.com"))
            .await
            .unwrap();

        let found = repo.search("ALI", 10).await.unwrap();
        let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "malice_100"]);

        let by_email = repo.search("corp", 10).await.unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].username, "bob");

        // LIKE wildcards in the term are literal
        assert_eq!(repo.search("_1", 10).await.unwrap().len(), 1);
        assert!(repo.search("%", 10).await.unwrap().is_empty());
        assert!(repo.search("   ", 10).await.unwrap().is_empty());
    }
}
