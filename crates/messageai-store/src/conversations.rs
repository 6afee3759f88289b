//! CRUD operations for [`Conversation`] records.
//!
//! `participants`, `last_message` and `read_status` are stored as JSON text
//! columns; they are only ever read back whole.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::params;

use messageai_shared::protocol::LastMessage;

use crate::database::{conversion_err, from_millis, not_found, to_millis, Database};
use crate::error::Result;
use crate::models::Conversation;

const CONVERSATION_COLUMNS: &str =
    "id, is_group, participants, group_name, last_message, last_activity, read_status";

impl Database {
    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Insert or fully overwrite a conversation.  The record is normalized
    /// first (unique participants, read markers only for participants).
    pub fn upsert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut conversation = conversation.clone();
        conversation.normalize();

        let participants = serde_json::to_string(&conversation.participants)?;
        let last_message = conversation
            .last_message
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let read_status = encode_read_status(&conversation.read_status)?;

        self.conn().execute(
            "INSERT INTO conversations (id, is_group, participants, group_name, last_message,
                                        last_activity, read_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                is_group      = excluded.is_group,
                participants  = excluded.participants,
                group_name    = excluded.group_name,
                last_message  = excluded.last_message,
                last_activity = excluded.last_activity,
                read_status   = excluded.read_status",
            params![
                conversation.id,
                conversation.is_group,
                participants,
                conversation.group_name,
                last_message,
                to_millis(&conversation.last_activity),
                read_status,
            ],
        )?;
        Ok(())
    }

    /// Set the denormalized last message and bump `last_activity`.
    ///
    /// Older snapshots never replace newer ones, so out-of-order send
    /// completions leave the latest message in place.
    pub fn update_conversation_last_message(
        &self,
        conversation_id: &str,
        last_message: &LastMessage,
    ) -> Result<bool> {
        let encoded = serde_json::to_string(last_message)?;
        let affected = self.conn().execute(
            "UPDATE conversations
             SET last_message = ?1, last_activity = ?2
             WHERE id = ?3 AND last_activity <= ?2",
            params![encoded, to_millis(&last_message.timestamp), conversation_id],
        )?;
        Ok(affected > 0)
    }

    /// Record that `uid` has read the conversation up to `at`.
    pub fn set_conversation_read(
        &self,
        conversation_id: &str,
        uid: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conversation = match self.get_conversation(conversation_id) {
            Ok(c) => c,
            Err(crate::StoreError::NotFound) => return Ok(false),
            Err(e) => return Err(e),
        };
        if !conversation.participants.iter().any(|p| p == uid) {
            return Ok(false);
        }
        conversation.read_status.insert(uid.to_string(), at);

        let affected = self.conn().execute(
            "UPDATE conversations SET read_status = ?1 WHERE id = ?2",
            params![encode_read_status(&conversation.read_status)?, conversation_id],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_conversation(&self, id: &str) -> Result<Conversation> {
        self.conn()
            .query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                row_to_conversation,
            )
            .map_err(not_found)
    }

    /// All conversations, most recent activity first.
    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS}
             FROM conversations
             ORDER BY last_activity DESC"
        ))?;

        let rows = stmt.query_map([], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a conversation row.  Its messages are left in place.
    pub fn delete_conversation(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn encode_read_status(read_status: &HashMap<String, DateTime<Utc>>) -> Result<String> {
    let millis: HashMap<&str, i64> = read_status
        .iter()
        .map(|(uid, at)| (uid.as_str(), to_millis(at)))
        .collect();
    Ok(serde_json::to_string(&millis)?)
}

/// Map a `rusqlite::Row` to a [`Conversation`].
fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let participants_json: String = row.get(2)?;
    let last_message_json: Option<String> = row.get(4)?;
    let read_status_json: String = row.get(6)?;

    let participants: Vec<String> =
        serde_json::from_str(&participants_json).map_err(|e| conversion_err(2, e))?;

    let last_message: Option<LastMessage> = last_message_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| conversion_err(4, e))?;

    let read_millis: HashMap<String, i64> =
        serde_json::from_str(&read_status_json).map_err(|e| conversion_err(6, e))?;
    let mut read_status = HashMap::with_capacity(read_millis.len());
    for (uid, ms) in read_millis {
        read_status.insert(uid, from_millis(6, ms)?);
    }

    Ok(Conversation {
        id: row.get(0)?,
        is_group: row.get(1)?,
        participants,
        group_name: row.get(3)?,
        last_message,
        last_activity: from_millis(5, row.get(5)?)?,
        read_status,
    })
}
