//! CRUD operations for [`Message`] records.

use rusqlite::{params, OptionalExtension};

use messageai_shared::types::MessageStatus;

use crate::database::{conversion_err, from_millis, not_found, to_millis, Database};
use crate::error::Result;
use crate::models::Message;

const MESSAGE_COLUMNS: &str = "id, conversation_id, text, sender_id, sender_name, timestamp, \
                               status, type, media_url, synced, is_optimistic";

impl Database {
    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Insert a message, or overwrite every column of the row with the same id.
    pub fn upsert_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, conversation_id, text, sender_id, sender_name, timestamp,
                                   status, type, media_url, synced, is_optimistic)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                conversation_id = excluded.conversation_id,
                text            = excluded.text,
                sender_id       = excluded.sender_id,
                sender_name     = excluded.sender_name,
                timestamp       = excluded.timestamp,
                status          = excluded.status,
                type            = excluded.type,
                media_url       = excluded.media_url,
                synced          = excluded.synced,
                is_optimistic   = excluded.is_optimistic",
            params![
                message.id,
                message.conversation_id,
                message.text,
                message.sender_id,
                message.sender_name,
                to_millis(&message.timestamp),
                message.status.as_str(),
                message.kind.as_str(),
                message.media_url,
                message.synced,
                message.is_optimistic,
            ],
        )?;
        Ok(())
    }

    /// Update the status of one message.  Returns `true` if a row changed.
    pub fn update_message_status(&self, id: &str, status: MessageStatus) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(affected > 0)
    }

    /// Flag a message as present in the remote store.
    pub fn mark_message_synced(&self, id: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET synced = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(affected > 0)
    }

    /// Replace a locally generated id with the id the remote store assigned,
    /// and mark the message sent and synced.
    ///
    /// If a row with `remote_id` already exists (a listener delivered the
    /// remote copy first) the placeholder row is dropped instead.  Returns
    /// `false` when no placeholder with `local_id` exists.
    pub fn confirm_message(&self, local_id: &str, remote_id: &str) -> Result<bool> {
        let tx = self.conn().unchecked_transaction()?;

        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM messages WHERE id = ?1",
                params![local_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(false);
        }

        if local_id != remote_id {
            let remote_present: Option<String> = tx
                .query_row(
                    "SELECT id FROM messages WHERE id = ?1",
                    params![remote_id],
                    |row| row.get(0),
                )
                .optional()?;
            if remote_present.is_some() {
                tx.execute("DELETE FROM messages WHERE id = ?1", params![local_id])?;
            } else {
                tx.execute(
                    "UPDATE messages SET id = ?1 WHERE id = ?2",
                    params![remote_id, local_id],
                )?;
            }
        }

        // Keep delivered/read if the remote copy already advanced past sent.
        tx.execute(
            "UPDATE messages
             SET status = CASE WHEN status IN ('delivered', 'read') THEN status ELSE 'sent' END,
                 synced = 1,
                 is_optimistic = 0
             WHERE id = ?1",
            params![remote_id],
        )?;

        tx.commit()?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_message(&self, id: &str) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .map_err(not_found)
    }

    /// All messages of a conversation, oldest first.
    pub fn get_messages_for_conversation(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY timestamp ASC, rowid ASC"
        ))?;

        let rows = stmt.query_map(params![conversation_id], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Every message not yet acknowledged by the remote store, oldest first.
    pub fn get_unsynced_messages(&self) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE synced = 0
             ORDER BY timestamp ASC, rowid ASC"
        ))?;

        let rows = stmt.query_map([], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    pub fn delete_message(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let status_str: String = row.get(6)?;
    let kind_str: String = row.get(7)?;

    let status = status_str.parse().map_err(|e| conversion_err(6, e))?;
    let kind = kind_str.parse().map_err(|e| conversion_err(7, e))?;

    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        text: row.get(2)?,
        sender_id: row.get(3)?,
        sender_name: row.get(4)?,
        timestamp: from_millis(5, row.get(5)?)?,
        status,
        kind,
        media_url: row.get(8)?,
        synced: row.get(9)?,
        is_optimistic: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use messageai_shared::types::MessageKind;

    use super::*;
    use crate::error::StoreError;

    fn open() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    fn message(id: &str, conversation: &str, offset_secs: i64, synced: bool) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: conversation.to_string(),
            text: format!("hello from {id}"),
            sender_id: "alice".into(),
            sender_name: "Alice".into(),
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            status: if synced {
                MessageStatus::Sent
            } else {
                MessageStatus::Sending
            },
            kind: MessageKind::Text,
            media_url: None,
            synced,
            is_optimistic: !synced,
        }
    }

    #[test]
    fn upsert_then_get() {
        let (db, _dir) = open();
        let mut msg = message("m1", "c1", 0, false);
        db.upsert_message(&msg).unwrap();

        msg.text = "edited".into();
        db.upsert_message(&msg).unwrap();

        let stored = db.get_message("m1").unwrap();
        assert_eq!(stored.text, "edited");
        assert_eq!(stored.timestamp.timestamp_millis(), msg.timestamp.timestamp_millis());
        assert!(stored.is_optimistic);
    }

    #[test]
    fn missing_message_is_not_found() {
        let (db, _dir) = open();
        assert!(matches!(db.get_message("nope"), Err(StoreError::NotFound)));
    }

    #[test]
    fn conversation_scan_is_ascending() {
        let (db, _dir) = open();
        db.upsert_message(&message("late", "c1", 30, true)).unwrap();
        db.upsert_message(&message("early", "c1", -30, true)).unwrap();
        db.upsert_message(&message("other", "c2", 0, true)).unwrap();

        let ids: Vec<String> = db
            .get_messages_for_conversation("c1")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn unsynced_scan_excludes_synced_rows() {
        let (db, _dir) = open();
        db.upsert_message(&message("a", "c1", 2, false)).unwrap();
        db.upsert_message(&message("b", "c1", 1, false)).unwrap();
        db.upsert_message(&message("c", "c1", 0, true)).unwrap();

        let pending: Vec<String> = db
            .get_unsynced_messages()
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(pending, vec!["b", "a"]);

        db.mark_message_synced("b").unwrap();
        assert_eq!(db.get_unsynced_messages().unwrap().len(), 1);
    }

    #[test]
    fn confirm_swaps_id_and_marks_sent() {
        let (db, _dir) = open();
        db.upsert_message(&message("temp_1", "c1", 0, false)).unwrap();

        assert!(db.confirm_message("temp_1", "remote-1").unwrap());

        assert!(matches!(db.get_message("temp_1"), Err(StoreError::NotFound)));
        let confirmed = db.get_message("remote-1").unwrap();
        assert_eq!(confirmed.status, MessageStatus::Sent);
        assert!(confirmed.synced);
        assert!(!confirmed.is_optimistic);
    }

    #[test]
    fn confirm_drops_placeholder_when_remote_copy_exists() {
        let (db, _dir) = open();
        db.upsert_message(&message("temp_1", "c1", 0, false)).unwrap();
        let mut remote = message("remote-1", "c1", 0, true);
        remote.status = MessageStatus::Read;
        db.upsert_message(&remote).unwrap();

        assert!(db.confirm_message("temp_1", "remote-1").unwrap());

        let all = db.get_messages_for_conversation("c1").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, MessageStatus::Read);
    }

    #[test]
    fn confirm_unknown_placeholder_is_noop() {
        let (db, _dir) = open();
        assert!(!db.confirm_message("temp_missing", "remote").unwrap());
    }

    #[test]
    fn status_update_and_delete() {
        let (db, _dir) = open();
        db.upsert_message(&message("m1", "c1", 0, false)).unwrap();

        assert!(db.update_message_status("m1", MessageStatus::Failed).unwrap());
        assert_eq!(db.get_message("m1").unwrap().status, MessageStatus::Failed);

        assert!(db.delete_message("m1").unwrap());
        assert!(!db.delete_message("m1").unwrap());
    }
}
