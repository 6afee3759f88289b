//! Client configuration loaded from environment variables.
//!
//! All settings have defaults that point at a locally running
//! `messageai-server`, so the library can start with zero configuration
//! during development.

use std::path::PathBuf;
use std::time::Duration;

use messageai_shared::constants::{
    DEFAULT_AI_MODEL, DEFAULT_AI_TIMEOUT_SECS, DEFAULT_SEND_TIMEOUT_SECS,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path of the local SQLite cache.
    /// Env: `MESSAGEAI_DB_PATH`
    /// Default: `None` (platform data directory).
    pub db_path: Option<PathBuf>,

    /// Whether the local store is available on this target.  When `false`
    /// every cache accessor returns empty results.
    /// Env: `MESSAGEAI_LOCAL_STORE` (true/false)
    /// Default: `true`
    pub local_store_enabled: bool,

    /// Endpoint issuing pre-signed upload URLs.
    /// Env: `MESSAGEAI_UPLOAD_ENDPOINT`
    /// Default: `http://localhost:8080/upload`
    pub upload_endpoint: String,

    /// Base URL public media keys are appended to.
    /// Env: `MESSAGEAI_MEDIA_BASE_URL`
    /// Default: `http://localhost:8080/media`
    pub media_base_url: String,

    /// Push fan-out endpoint.
    /// Env: `MESSAGEAI_PUSH_ENDPOINT`
    /// Default: `http://localhost:8080/notify`
    pub push_endpoint: String,

    /// Base URL of the chat-completion API.
    /// Env: `OPENAI_BASE_URL`
    /// Default: `https://api.openai.com/v1`
    pub ai_base_url: String,

    /// API key for the chat-completion API.
    /// Env: `OPENAI_API_KEY`
    /// Default: empty (AI features disabled).
    pub ai_api_key: Option<String>,

    /// Env: `OPENAI_MODEL`
    pub ai_model: String,

    /// Applied to every AI call.
    /// Env: `MESSAGEAI_AI_TIMEOUT_SECS`
    pub ai_timeout: Duration,

    /// Time allowed for a remote message write before the message is marked
    /// failed.
    /// Env: `MESSAGEAI_SEND_TIMEOUT_SECS`
    pub send_timeout: Duration,

    /// URL probed to decide whether the device is online.  `None` disables
    /// probing; connectivity is then driven by the host platform.
    /// Env: `MESSAGEAI_PROBE_URL`
    pub probe_url: Option<String>,

    /// Env: `MESSAGEAI_PROBE_INTERVAL_SECS`
    /// Default: 15 seconds.
    pub probe_interval: Duration,

    /// Directory for cached media downloads.
    /// Env: `MESSAGEAI_MEDIA_CACHE_DIR`
    /// Default: `None` (platform cache directory).
    pub media_cache_dir: Option<PathBuf>,

    /// Size cap for the media cache in bytes.
    /// Env: `MESSAGEAI_MEDIA_CACHE_MAX_BYTES`
    /// Default: 200 MiB.
    pub media_cache_max_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            local_store_enabled: true,
            upload_endpoint: "http://localhost:8080/upload".to_string(),
            media_base_url: "http://localhost:8080/media".to_string(),
            push_endpoint: "http://localhost:8080/notify".to_string(),
            ai_base_url: "https://api.openai.com/v1".to_string(),
            ai_api_key: None,
            ai_model: DEFAULT_AI_MODEL.to_string(),
            ai_timeout: Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS),
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            probe_url: None,
            probe_interval: Duration::from_secs(15),
            media_cache_dir: None,
            media_cache_max_bytes: 200 * 1024 * 1024, // 200 MiB
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("MESSAGEAI_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(val) = lookup("MESSAGEAI_LOCAL_STORE") {
            config.local_store_enabled = val != "false" && val != "0" && val != "off";
        }

        if let Some(url) = lookup("MESSAGEAI_UPLOAD_ENDPOINT") {
            config.upload_endpoint = url;
        }

        if let Some(url) = lookup("MESSAGEAI_MEDIA_BASE_URL") {
            config.media_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(url) = lookup("MESSAGEAI_PUSH_ENDPOINT") {
            config.push_endpoint = url;
        }

        if let Some(url) = lookup("OPENAI_BASE_URL") {
            config.ai_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(key) = lookup("OPENAI_API_KEY") {
            if !key.is_empty() {
                config.ai_api_key = Some(key);
            }
        }

        if let Some(model) = lookup("OPENAI_MODEL") {
            config.ai_model = model;
        }

        if let Some(secs) = parse_secs(&lookup, "MESSAGEAI_AI_TIMEOUT_SECS") {
            config.ai_timeout = secs;
        }

        if let Some(secs) = parse_secs(&lookup, "MESSAGEAI_SEND_TIMEOUT_SECS") {
            config.send_timeout = secs;
        }

        if let Some(url) = lookup("MESSAGEAI_PROBE_URL") {
            if !url.is_empty() {
                config.probe_url = Some(url);
            }
        }

        if let Some(secs) = parse_secs(&lookup, "MESSAGEAI_PROBE_INTERVAL_SECS") {
            config.probe_interval = secs;
        }

        if let Some(dir) = lookup("MESSAGEAI_MEDIA_CACHE_DIR") {
            config.media_cache_dir = Some(PathBuf::from(dir));
        }

        if let Some(val) = lookup("MESSAGEAI_MEDIA_CACHE_MAX_BYTES") {
            match val.parse::<u64>() {
                Ok(n) => config.media_cache_max_bytes = n,
                Err(_) => tracing::warn!(
                    value = %val,
                    "Invalid MESSAGEAI_MEDIA_CACHE_MAX_BYTES, using default"
                ),
            }
        }

        config
    }
}

/// Parse a positive number of seconds, warning and ignoring invalid values.
fn parse_secs<F>(lookup: &F, key: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let val = lookup(key)?;
    match val.parse::<u64>() {
        Ok(n) if n > 0 => Some(Duration::from_secs(n)),
        _ => {
            tracing::warn!(key, value = %val, "Invalid duration, using default");
            None
        }
    }
}
