//! Filesystem storage for uploaded media objects.
//!
//! Objects are addressed by keys of the form `{folder}/{name}`, where the
//! folder is one of the known upload folders. Each key maps to one file
//! under the storage root.

use std::path::{Component, Path, PathBuf};

use messageai_shared::constants::UPLOAD_FOLDERS;
use tokio::fs;
use tracing::{debug, info};

use crate::error::ServerError;

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(base)
        .unwrap_or(target)
        .components()
    {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest("Path traversal detected".to_string()));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

/// Check that `key` is `{known folder}/{safe name}`.
pub fn validate_key(key: &str) -> Result<(), ServerError> {
    let (folder, name) = key
        .split_once('/')
        .ok_or_else(|| ServerError::BadRequest(format!("Invalid object key: {key}")))?;
    if !UPLOAD_FOLDERS.contains(&folder) {
        return Err(ServerError::BadRequest(format!("Unknown folder: {folder}")));
    }
    if name.contains("..") {
        return Err(ServerError::BadRequest("Path traversal detected".to_string()));
    }
    let safe = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if !safe {
        return Err(ServerError::BadRequest(format!("Invalid object key: {key}")));
    }
    Ok(())
}

/// MIME type served for `key`, from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    max_size: usize,
}

impl MediaStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        for folder in UPLOAD_FOLDERS {
            let dir = base_path.join(folder);
            fs::create_dir_all(&dir).await.map_err(|e| {
                ServerError::Storage(format!(
                    "Failed to create media directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Store `data` under `key`, replacing any previous object.
    pub async fn put(&self, key: &str, data: &[u8]) -> Result<(), ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let path = self.object_path(key)?;
        let partial = path.with_extension("part");
        fs::write(&partial, data)
            .await
            .map_err(|e| ServerError::Storage(format!("Failed to write {key}: {e}")))?;
        fs::rename(&partial, &path)
            .await
            .map_err(|e| ServerError::Storage(format!("Failed to write {key}: {e}")))?;

        debug!(key, size = data.len(), "Stored object");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.object_path(key)?;

        match fs::read(&path).await {
            Ok(data) => {
                debug!(key, size = data.len(), "Retrieved object");
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServerError::NotFound(key.to_string()))
            }
            Err(e) => Err(ServerError::Storage(format!("Failed to read {key}: {e}"))),
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ServerError> {
        validate_key(key)?;
        ensure_within(&self.base_path, &self.base_path.join(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (MediaStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), 1024).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_and_get() {
        let (store, _dir) = test_store().await;
        store.put("images/a-photo.jpg", b"jpeg-bytes").await.unwrap();
        assert_eq!(store.get("images/a-photo.jpg").await.unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.get("images/nope.jpg").await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn size_limit_and_empty_body() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.put("images/big.jpg", &[0u8; 2048]).await,
            Err(ServerError::TooLarge { size: 2048, max: 1024 })
        ));
        assert!(store.put("images/empty.jpg", b"").await.is_err());
    }

    #[test]
    fn keys_are_validated() {
        assert!(validate_key("images/x.jpg").is_ok());
        assert!(validate_key("avatars/u_1-2.png").is_ok());
        assert!(validate_key("images/../secret").is_err());
        assert!(validate_key("images/a/b.jpg").is_err());
        assert!(validate_key("images/.hidden").is_err());
        assert!(validate_key("etc/passwd").is_err());
        assert!(validate_key("images").is_err());
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("images/x.JPG"), "image/jpeg");
        assert_eq!(content_type_for("audio/v.m4a"), "audio/mp4");
        assert_eq!(content_type_for("images/blob"), "application/octet-stream");
    }
}
