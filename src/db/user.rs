//! User model for roomcast.
//!
//! Users belong to the identity collaborator. The chat core only references
//! them by id; this record exists so participant ids can be checked and
//! resolved for display.

use chrono::{DateTime, Utc};

use crate::datetime::parse_db_timestamp;

/// User entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login name (unique).
    pub username: String,
    /// Name shown to other participants.
    pub display_name: String,
    /// Email address (unique).
    pub email: String,
    /// Profile picture reference (URL or storage key).
    pub profile_picture: Option<String>,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Database row type for User.
#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    id: i64,
    username: String,
    display_name: String,
    email: String,
    profile_picture: Option<String>,
    created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            email: row.email,
            profile_picture: row.profile_picture,
            created_at: parse_db_timestamp(&row.created_at),
        }
    }
}

/// New user for insertion.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Email address.
    pub email: String,
    /// Profile picture reference.
    pub profile_picture: Option<String>,
}

impl NewUser {
    /// Create a new user with the display name defaulting to the username.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            display_name: username.clone(),
            username,
            email: email.into(),
            profile_picture: None,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set the profile picture reference.
    pub fn with_profile_picture(mut self, picture: impl Into<String>) -> Self {
        self.profile_picture = Some(picture.into());
        self
    }
}
