//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the server starts with zero configuration
//! for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use messageai_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_UPLOAD_URL_TTL_SECS, MAX_UPLOAD_SIZE};
use rand::RngCore;

const SIGNING_KEY_CONTEXT: &str = "messageai-server 2024 upload url signing";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Env: `HTTP_ADDR`, default `0.0.0.0:8080`.
    pub http_addr: SocketAddr,

    /// Directory holding uploaded media objects.
    /// Env: `MEDIA_STORAGE_PATH`, default `./media`.
    pub media_storage_path: PathBuf,

    /// Externally reachable base URL, used to build upload URLs.
    /// Env: `PUBLIC_BASE_URL`, default `http://localhost:8080`.
    pub public_base_url: String,

    /// Key for upload URL signatures, derived from `UPLOAD_SIGNING_KEY`.
    /// Random per process when unset, which invalidates outstanding URLs on
    /// restart.
    pub upload_signing_key: [u8; 32],

    /// Env: `UPLOAD_URL_TTL_SECS`, default 300.
    pub upload_url_ttl: Duration,

    /// Env: `MAX_UPLOAD_SIZE`, default 25 MiB.
    pub max_upload_size: usize,

    /// Push gateway endpoint.
    /// Env: `PUSH_GATEWAY_URL`, default the Expo push API.
    pub push_gateway_url: String,

    /// Bearer token sent to the push gateway, if any.
    /// Env: `PUSH_ACCESS_TOKEN`
    pub push_access_token: Option<String>,

    /// Env: `RATE_LIMIT_PER_SEC`, default 10.
    pub rate_limit_per_sec: f64,

    /// Env: `RATE_LIMIT_BURST`, default 30.
    pub rate_limit_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            media_storage_path: PathBuf::from("./media"),
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            upload_signing_key: random_key(),
            upload_url_ttl: Duration::from_secs(DEFAULT_UPLOAD_URL_TTL_SECS as u64),
            max_upload_size: MAX_UPLOAD_SIZE,
            push_gateway_url: "https://exp.host/--/api/v2/push/send".to_string(),
            push_access_token: None,
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Ok(path) = std::env::var("MEDIA_STORAGE_PATH") {
            config.media_storage_path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        match std::env::var("UPLOAD_SIGNING_KEY") {
            Ok(secret) if !secret.is_empty() => {
                config.upload_signing_key = derive_signing_key(&secret);
            }
            _ => tracing::warn!(
                "UPLOAD_SIGNING_KEY not set, upload URLs will not survive a restart"
            ),
        }

        if let Some(secs) = parse_var::<u64>("UPLOAD_URL_TTL_SECS") {
            config.upload_url_ttl = Duration::from_secs(secs);
        }

        if let Some(size) = parse_var::<usize>("MAX_UPLOAD_SIZE") {
            config.max_upload_size = size;
        }

        if let Ok(url) = std::env::var("PUSH_GATEWAY_URL") {
            config.push_gateway_url = url;
        }

        if let Ok(token) = std::env::var("PUSH_ACCESS_TOKEN") {
            if !token.is_empty() {
                config.push_access_token = Some(token);
            }
        }

        if let Some(rate) = parse_var::<f64>("RATE_LIMIT_PER_SEC") {
            config.rate_limit_per_sec = rate;
        }

        if let Some(burst) = parse_var::<f64>("RATE_LIMIT_BURST") {
            config.rate_limit_burst = burst;
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(var = name, value = %value, "Invalid value, using default");
            None
        }
    }
}

/// Stretch an operator-supplied secret of any length into a 32-byte key.
fn derive_signing_key(secret: &str) -> [u8; 32] {
    blake3::derive_key(SIGNING_KEY_CONTEXT, secret.as_bytes())
}

fn random_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}
