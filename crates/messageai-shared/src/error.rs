use thiserror::Error;

/// Category of an AI-service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiErrorKind {
    /// HTTP 429 from the inference endpoint.
    RateLimit,
    /// The request was rejected as malformed, or the input was empty.
    InvalidInput,
    /// Transport failure or timeout.
    Network,
    /// Any other error reported by (or parsed from) the endpoint.
    Api,
}

/// Error returned by every AI-assisted operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct AiError {
    pub kind: AiErrorKind,
    pub message: String,
    /// Whether repeating the same call later may succeed.
    pub retryable: bool,
}

impl AiError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: AiErrorKind::RateLimit,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            kind: AiErrorKind::InvalidInput,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: AiErrorKind::Network,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn api(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind: AiErrorKind::Api,
            message: message.into(),
            retryable,
        }
    }

    /// Map an HTTP status returned by the inference endpoint.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 => Self::rate_limited("Too many requests, try again shortly"),
            400 | 422 => Self::invalid_input(format!("Request rejected: {body}")),
            s if s >= 500 => Self::api(format!("Service error ({s})"), true),
            s => Self::api(format!("Unexpected status {s}: {body}"), false),
        }
    }
}

/// Map an authentication provider error code to a user-facing message.
pub fn auth_error_message(code: &str) -> &'static str {
    match code {
        "auth/invalid-email" => "That email address is not valid.",
        "auth/user-disabled" => "This account has been disabled.",
        "auth/user-not-found" => "No account exists for that email.",
        "auth/wrong-password" | "auth/invalid-credential" => "Incorrect email or password.",
        "auth/email-already-in-use" => "An account already exists for that email.",
        "auth/weak-password" => "Password must be at least 6 characters.",
        "auth/too-many-requests" => "Too many attempts. Please try again later.",
        "auth/network-request-failed" => "Network error. Check your connection.",
        _ => "Something went wrong. Please try again.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_sets_retryable() {
        assert!(AiError::from_status(429, "").retryable);
        assert_eq!(AiError::from_status(429, "").kind, AiErrorKind::RateLimit);
        assert!(!AiError::from_status(400, "bad").retryable);
        assert!(AiError::from_status(503, "").retryable);
        assert!(!AiError::from_status(401, "no key").retryable);
    }

    #[test]
    fn unknown_auth_code_has_fallback() {
        assert_eq!(
            auth_error_message("auth/wrong-password"),
            "Incorrect email or password."
        );
        assert_eq!(
            auth_error_message("auth/something-new"),
            "Something went wrong. Please try again."
        );
    }
}
