//! Time-limited upload URLs.
//!
//! An upload URL carries the object key, a unix expiry and a keyed BLAKE3
//! MAC over both. `PUT /objects/*key` accepts the body only while the URL is
//! unexpired and the MAC matches.

use std::time::Duration;

use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::ServerError;
use crate::media_store::validate_key;

const MAX_FILENAME_CHARS: usize = 64;

#[derive(Clone)]
pub struct UploadSigner {
    key: [u8; 32],
    ttl: Duration,
}

impl UploadSigner {
    pub fn new(key: [u8; 32], ttl: Duration) -> Self {
        Self { key, ttl }
    }

    /// Fresh object key for an upload of `filename` into `folder`.
    pub fn object_key(folder: &str, filename: &str) -> Result<String, ServerError> {
        let key = format!("{folder}/{}-{}", Uuid::new_v4(), sanitize_filename(filename));
        validate_key(&key)?;
        Ok(key)
    }

    pub fn sign(&self, key: &str, expires: i64) -> String {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }

    /// Signed `PUT` URL for `key`, valid from `now` for the configured TTL.
    pub fn upload_url(&self, base_url: &str, key: &str, now: i64) -> String {
        let expires = now + self.ttl.as_secs() as i64;
        format!(
            "{}/objects/{key}?expires={expires}&signature={}",
            base_url.trim_end_matches('/'),
            self.sign(key, expires)
        )
    }

    pub fn verify(&self, key: &str, expires: i64, signature: &str, now: i64) -> Result<(), ServerError> {
        if now > expires {
            return Err(ServerError::Forbidden("Upload URL expired".to_string()));
        }
        let expected = self.sign(key, expires);
        if expected.as_bytes().ct_eq(signature.as_bytes()).into() {
            Ok(())
        } else {
            Err(ServerError::Forbidden("Invalid upload signature".to_string()))
        }
    }
}

/// Keep the characters allowed in object keys, replacing the rest.
fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.replace("..", "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return "file".to_string();
    }
    // Keep the tail so the extension survives truncation.
    let skip = cleaned.chars().count().saturating_sub(MAX_FILENAME_CHARS);
    cleaned.chars().skip(skip).collect()
}
