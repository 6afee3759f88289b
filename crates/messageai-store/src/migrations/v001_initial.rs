//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `messages`, `conversations` and
//! `users_cache`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY NOT NULL,  -- temp_<uuid> or remote id
    conversation_id TEXT NOT NULL,
    text            TEXT NOT NULL,
    sender_id       TEXT NOT NULL,
    sender_name     TEXT NOT NULL,
    timestamp       INTEGER NOT NULL,           -- unix millis
    status          TEXT NOT NULL,              -- sending|sent|delivered|read|failed
    type            TEXT NOT NULL DEFAULT 'text',
    media_url       TEXT,
    synced          INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    is_optimistic   INTEGER NOT NULL DEFAULT 0  -- boolean 0/1
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_ts
    ON messages(conversation_id, timestamp);

CREATE INDEX IF NOT EXISTS idx_messages_synced
    ON messages(synced, timestamp);

-- ----------------------------------------------------------------
-- Conversations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id            TEXT PRIMARY KEY NOT NULL,
    is_group      INTEGER NOT NULL DEFAULT 0,
    participants  TEXT NOT NULL,               -- JSON array of user ids
    group_name    TEXT,
    last_message  TEXT,                        -- JSON LastMessage
    last_activity INTEGER NOT NULL,            -- unix millis
    read_status   TEXT NOT NULL DEFAULT '{}'   -- JSON object uid -> millis
);

CREATE INDEX IF NOT EXISTS idx_conversations_activity
    ON conversations(last_activity DESC);

-- ----------------------------------------------------------------
-- Cached user profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users_cache (
    uid          TEXT PRIMARY KEY NOT NULL,
    display_name TEXT NOT NULL,
    email        TEXT NOT NULL,
    photo_url    TEXT,
    is_online    INTEGER NOT NULL DEFAULT 0,
    last_seen    INTEGER,
    cached_at    INTEGER NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
