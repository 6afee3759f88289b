use rusqlite::params;

use crate::database::{from_millis, not_found, to_millis, Database};
use crate::error::Result;
use crate::models::CachedUser;

impl Database {
    pub fn upsert_cached_user(&self, user: &CachedUser) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users_cache (uid, display_name, email, photo_url, is_online, last_seen, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(uid) DO UPDATE SET
                display_name = excluded.display_name,
                email        = excluded.email,
                photo_url    = excluded.photo_url,
                is_online    = excluded.is_online,
                last_seen    = excluded.last_seen,
                cached_at    = excluded.cached_at",
            params![
                user.uid,
                user.display_name,
                user.email,
                user.photo_url,
                user.is_online,
                user.last_seen.as_ref().map(to_millis),
                to_millis(&user.cached_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_cached_user(&self, uid: &str) -> Result<CachedUser> {
        self.conn()
            .query_row(
                "SELECT uid, display_name, email, photo_url, is_online, last_seen, cached_at
                 FROM users_cache WHERE uid = ?1",
                params![uid],
                row_to_user,
            )
            .map_err(not_found)
    }

    pub fn delete_cached_user(&self, uid: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM users_cache WHERE uid = ?1", params![uid])?;
        Ok(affected > 0)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedUser> {
    let last_seen: Option<i64> = row.get(5)?;

    Ok(CachedUser {
        uid: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        photo_url: row.get(3)?,
        is_online: row.get(4)?,
        last_seen: last_seen.map(|ms| from_millis(5, ms)).transpose()?,
        cached_at: from_millis(6, row.get(6)?)?,
    })
}
