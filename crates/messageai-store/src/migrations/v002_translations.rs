use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS translations (
    id                TEXT PRIMARY KEY NOT NULL,   -- <message_id>_<target_language>
    message_id        TEXT NOT NULL,
    source_text       TEXT NOT NULL,
    translated_text   TEXT NOT NULL,
    detected_language TEXT,
    target_language   TEXT NOT NULL,
    created_at        INTEGER NOT NULL             -- unix millis
);

CREATE INDEX IF NOT EXISTS idx_translations_created ON translations(created_at);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
