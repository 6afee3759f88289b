/// Application name
pub const APP_NAME: &str = "MessageAI";

/// Maximum length of a text message, in characters
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Minimum number of participants in a group conversation (creator included)
pub const MIN_GROUP_PARTICIPANTS: usize = 3;

/// Cached translations older than this are swept (30 days)
pub const TRANSLATION_CACHE_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Default time allowed for a remote message write before it is marked failed
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

/// Default timeout for AI chat-completion calls
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

/// Default AI model
pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";

/// Maximum number of smart reply suggestions returned
pub const MAX_SMART_REPLIES: usize = 3;

/// Characters of message text included in a push notification body
pub const PUSH_PREVIEW_CHARS: usize = 100;

/// Push gateway accepts at most this many messages per request
pub const PUSH_BATCH_SIZE: usize = 100;

/// Maximum upload size in bytes (25 MiB)
pub const MAX_UPLOAD_SIZE: usize = 25 * 1024 * 1024;

/// Default lifetime of a pre-signed upload URL
pub const DEFAULT_UPLOAD_URL_TTL_SECS: i64 = 300;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Upload folders accepted by the server
pub const UPLOAD_FOLDERS: &[&str] = &["images", "videos", "audio", "avatars"];
