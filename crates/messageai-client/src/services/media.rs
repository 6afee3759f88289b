//! Media upload through pre-signed URLs, and the on-disk download cache.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use directories::ProjectDirs;
use tracing::{debug, info, warn};

use messageai_shared::constants::{MAX_UPLOAD_SIZE, UPLOAD_FOLDERS};
use messageai_shared::protocol::{UploadRequest, UploadResponse};

use crate::config::ClientConfig;
use crate::error::MediaError;

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// A stored media object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub key: String,
    /// Public URL the object can be fetched from.
    pub url: String,
}

pub struct MediaUploader {
    http: reqwest::Client,
    upload_endpoint: String,
    media_base_url: String,
}

impl MediaUploader {
    pub fn new(upload_endpoint: impl Into<String>, media_base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_endpoint: upload_endpoint.into(),
            media_base_url: media_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.upload_endpoint, &config.media_base_url)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.media_base_url, key.trim_start_matches('/'))
    }

    /// Upload a file from disk, guessing its content type from the extension.
    pub async fn upload_file(&self, path: &Path, folder: &str) -> Result<UploadedMedia, MediaError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MediaError::Invalid(format!("bad file name: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        self.upload_bytes(bytes, &filename, content_type_for(path), folder)
            .await
    }

    /// Request an upload URL, then `PUT` the bytes to it.
    pub async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
        folder: &str,
    ) -> Result<UploadedMedia, MediaError> {
        if !UPLOAD_FOLDERS.contains(&folder) {
            return Err(MediaError::Invalid(format!("unknown folder: {folder}")));
        }
        if bytes.is_empty() {
            return Err(MediaError::Invalid("file is empty".into()));
        }
        if bytes.len() > MAX_UPLOAD_SIZE {
            return Err(MediaError::Invalid(format!(
                "file too large: {} bytes (max {MAX_UPLOAD_SIZE})",
                bytes.len()
            )));
        }

        let request = UploadRequest {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            folder: folder.to_string(),
        };
        let resp = self
            .http
            .post(&self.upload_endpoint)
            .json(&request)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let UploadResponse { upload_url, key } = resp.json().await?;

        let size = bytes.len();
        let put = self
            .http
            .put(&upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        check_status(put).await?;

        info!(key = %key, size, "media uploaded");
        Ok(UploadedMedia {
            url: self.public_url(&key),
            key,
        })
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, MediaError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(MediaError::Endpoint {
        status: status.as_u16(),
        body,
    })
}

/// Content type inferred from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
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
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Download cache
// ---------------------------------------------------------------------------

/// Remote media cached on disk, one file per URL.
///
/// File names are the BLAKE3 hash of the URL plus the URL's extension, so a
/// URL always maps to the same file.  The cache is size-capped; the least
/// recently modified files go first.
pub struct MediaCache {
    dir: PathBuf,
    http: reqwest::Client,
    max_bytes: u64,
}

impl MediaCache {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, MediaError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            http: reqwest::Client::new(),
            max_bytes,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, MediaError> {
        let dir = match &config.media_cache_dir {
            Some(dir) => dir.clone(),
            None => ProjectDirs::from("com", "messageai", "messageai")
                .map(|dirs| dirs.cache_dir().join("media"))
                .ok_or_else(|| MediaError::Invalid("no cache directory available".into()))?,
        };
        Self::new(dir, config.media_cache_max_bytes)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `url` is (or would be) cached.
    pub fn path_for(&self, url: &str) -> PathBuf {
        let hash = blake3::hash(url.as_bytes()).to_hex();
        match url_extension(url) {
            Some(ext) => self.dir.join(format!("{hash}.{ext}")),
            None => self.dir.join(hash.as_str()),
        }
    }

    pub fn cached(&self, url: &str) -> Option<PathBuf> {
        let path = self.path_for(url);
        path.is_file().then_some(path)
    }

    /// Local path of `url`, downloading it on a miss.
    pub async fn fetch(&self, url: &str) -> Result<PathBuf, MediaError> {
        if let Some(path) = self.cached(url) {
            debug!(url, "media cache hit");
            return Ok(path);
        }

        let resp = self.http.get(url).send().await?;
        let resp = check_status(resp).await?;
        let bytes = resp.bytes().await?;

        let path = self.path_for(url);
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(url, size = bytes.len(), "media cached");

        if let Err(e) = self.prune(self.max_bytes) {
            warn!(error = %e, "media cache prune failed");
        }
        Ok(path)
    }

    /// Total size of the cached files in bytes.
    pub fn size(&self) -> Result<u64, MediaError> {
        Ok(self.entries()?.iter().map(|e| e.size).sum())
    }

    /// Delete the least recently modified files until the cache holds at most
    /// `max_bytes`.  Returns the number of files removed.
    pub fn prune(&self, max_bytes: u64) -> Result<usize, MediaError> {
        let mut entries = self.entries()?;
        let mut total: u64 = entries.iter().map(|e| e.size).sum();
        if total <= max_bytes {
            return Ok(0);
        }

        entries.sort_by_key(|e| e.modified);
        let mut removed = 0;
        for entry in entries {
            if total <= max_bytes {
                break;
            }
            std::fs::remove_file(&entry.path)?;
            total = total.saturating_sub(entry.size);
            removed += 1;
        }
        info!(removed, remaining_bytes = total, "media cache pruned");
        Ok(removed)
    }

    /// Delete every cached file.
    pub fn clear(&self) -> Result<usize, MediaError> {
        let entries = self.entries()?;
        for entry in &entries {
            std::fs::remove_file(&entry.path)?;
        }
        Ok(entries.len())
    }

    fn entries(&self) -> Result<Vec<CacheEntry>, MediaError> {
        let mut entries = Vec::new();
        for item in std::fs::read_dir(&self.dir)? {
            let item = item?;
            let meta = item.metadata()?;
            if !meta.is_file() {
                continue;
            }
            entries.push(CacheEntry {
                path: item.path(),
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(entries)
    }
}

struct CacheEntry {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Short alphanumeric extension of the URL path, ignoring query and fragment.
fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}
