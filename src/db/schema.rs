//! Database schema and migrations for roomcast.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: users, owned by the identity collaborator and referenced by id
    r#"
CREATE TABLE users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT NOT NULL UNIQUE,
    display_name    TEXT NOT NULL,
    email           TEXT NOT NULL UNIQUE,
    profile_picture TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX idx_users_username ON users(username);
"#,
    // v2: rooms and their fixed participant sets
    r#"
CREATE TABLE rooms (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT NOT NULL,
    last_position    INTEGER NOT NULL DEFAULT 0,   -- position counter
    last_message_id  INTEGER,                      -- NULL until first append
    created_at       TEXT NOT NULL,
    last_activity_at TEXT NOT NULL
);

CREATE INDEX idx_rooms_last_activity ON rooms(last_activity_at);

CREATE TABLE room_participants (
    room_id     INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
    user_id     INTEGER NOT NULL REFERENCES users(id),
    PRIMARY KEY (room_id, user_id)
);

CREATE INDEX idx_room_participants_user_id ON room_participants(user_id);
"#,
    // v3: per-room append-only message log with read-by sets
    r#"
CREATE TABLE messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id     INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
    sender_id   INTEGER NOT NULL REFERENCES users(id),
    position    INTEGER NOT NULL,
    content     TEXT NOT NULL,
    sent_at     TEXT NOT NULL,
    UNIQUE (room_id, position)
);

CREATE TABLE message_reads (
    message_id  INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    user_id     INTEGER NOT NULL REFERENCES users(id),
    read_at     TEXT NOT NULL,
    PRIMARY KEY (message_id, user_id)
);

CREATE INDEX idx_message_reads_user_id ON message_reads(user_id);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_migrations_are_valid_sql() {
        for migration in MIGRATIONS {
            assert!(!migration.trim().is_empty());
            assert!(migration.contains("CREATE TABLE"));
        }
    }

    #[test]
    fn test_messages_position_is_unique_per_room() {
        let messages_migration = MIGRATIONS[2];
        assert!(messages_migration.contains("CREATE TABLE messages"));
        assert!(messages_migration.contains("UNIQUE (room_id, position)"));
        assert!(messages_migration.contains("PRIMARY KEY (message_id, user_id)"));
    }

    #[test]
    fn test_rooms_migration_contains_counter() {
        let rooms_migration = MIGRATIONS[1];
        assert!(rooms_migration.contains("CREATE TABLE rooms"));
        assert!(rooms_migration.contains("last_position"));
        assert!(rooms_migration.contains("last_message_id"));
        assert!(rooms_migration.contains("CREATE TABLE room_participants"));
    }
}
