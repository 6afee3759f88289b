use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::{from_millis, not_found, to_millis, Database};
use crate::error::Result;
use crate::models::CachedTranslation;

impl Database {
    pub fn upsert_translation(&self, translation: &CachedTranslation) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO translations
                (id, message_id, source_text, translated_text, detected_language,
                 target_language, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                translation.id,
                translation.message_id,
                translation.source_text,
                translation.translated_text,
                translation.detected_language,
                translation.target_language,
                to_millis(&translation.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_translation(
        &self,
        message_id: &str,
        target_language: &str,
    ) -> Result<CachedTranslation> {
        self.conn()
            .query_row(
                "SELECT id, message_id, source_text, translated_text, detected_language,
                        target_language, created_at
                 FROM translations WHERE id = ?1",
                params![CachedTranslation::cache_key(message_id, target_language)],
                |row| {
                    Ok(CachedTranslation {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        source_text: row.get(2)?,
                        translated_text: row.get(3)?,
                        detected_language: row.get(4)?,
                        target_language: row.get(5)?,
                        created_at: from_millis(6, row.get(6)?)?,
                    })
                },
            )
            .map_err(not_found)
    }

    /// Delete translations created before `cutoff`.  Returns how many rows
    /// were removed.
    pub fn purge_translations_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.conn().execute(
            "DELETE FROM translations WHERE created_at < ?1",
            params![to_millis(&cutoff)],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn translation(message_id: &str, age_days: i64) -> CachedTranslation {
        CachedTranslation {
            id: CachedTranslation::cache_key(message_id, "es"),
            message_id: message_id.to_string(),
            source_text: "good morning".into(),
            translated_text: "buenos días".into(),
            detected_language: Some("en".into()),
            target_language: "es".into(),
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn lookup_by_message_and_language() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        db.upsert_translation(&translation("m1", 0)).unwrap();

        let hit = db.get_translation("m1", "es").unwrap();
        assert_eq!(hit.translated_text, "buenos días");
        assert!(db.get_translation("m1", "fr").is_err());
    }

    #[test]
    fn purge_removes_only_old_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        db.upsert_translation(&translation("fresh", 1)).unwrap();
        db.upsert_translation(&translation("stale", 45)).unwrap();

        let removed = db
            .purge_translations_before(Utc::now() - Duration::days(30))
            .unwrap();
        assert_eq!(removed, 1);
        assert!(db.get_translation("fresh", "es").is_ok());
        assert!(db.get_translation("stale", "es").is_err());
    }
}
