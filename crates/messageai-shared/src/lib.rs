//! # messageai-shared
//!
//! Types shared by the MessageAI client library and the media/push server:
//! message status enums, remote document shapes, HTTP request bodies for the
//! upload and notify endpoints, constants and the shared error taxonomy.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::{auth_error_message, AiError, AiErrorKind};
pub use types::{MessageKind, MessageStatus};
