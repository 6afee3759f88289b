use thiserror::Error;

use messageai_shared::types::MessageStatus;

use crate::remote::RemoteError;

/// Errors surfaced by the optimistic send path before any network call.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("Message not found: {0}")]
    NotFound(String),

    #[error("Only failed messages can be retried (status is {0})")]
    NotRetryable(MessageStatus),

    #[error("Message is already being sent: {0}")]
    AlreadySending(String),

    #[error("Media upload failed: {0}")]
    Upload(#[from] MediaError),
}

/// Errors from conversation and group write paths.  Read paths fall back to
/// cached data instead of returning these.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),
}

/// Errors from the media upload client and the media cache.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid media: {0}")]
    Invalid(String),
}

/// Errors from the push notify client.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notify endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("No push tokens to notify")]
    NoRecipients,
}
