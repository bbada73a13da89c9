//! Error types module
//!
//! All failures surfaced by the media client and the state controller are
//! unified under [`MediaError`]. The variants follow the admin API taxonomy:
//! rate limiting (retried transparently by the client), other non-2xx
//! responses, transport failures without a response, local validation
//! failures that never reach the network, and undecodable bodies.

/// Message shown to the user when the server did not provide one.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// HTTP status used by the API to signal rate limiting.
pub const RATE_LIMITED_STATUS: u16 = 429;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like rate limiting
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented and handled
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "RATE_LIMITED")
    fn error_code(&self) -> &'static str;

    /// Whether repeating the same request may succeed
    fn is_recoverable(&self) -> bool;

    /// User-facing message for notifications
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("Rate limited: {}", .message.as_deref().unwrap_or("too many requests"))]
    RateLimited { message: Option<String> },

    #[error("API request failed with status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Http {
        status: u16,
        message: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Build the error for a non-2xx response. Empty server messages count as absent.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let message = message.filter(|m| !m.trim().is_empty());
        if status == RATE_LIMITED_STATUS {
            MediaError::RateLimited { message }
        } else {
            MediaError::Http { status, message }
        }
    }

    /// HTTP status carried by the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            MediaError::RateLimited { .. } => Some(RATE_LIMITED_STATUS),
            MediaError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, MediaError::RateLimited { .. })
    }

    /// Server-provided message, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            MediaError::RateLimited { message } | MediaError::Http { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MediaError {
    fn from(err: serde_json::Error) -> Self {
        MediaError::Decode(err.to_string())
    }
}

impl From<validator::ValidationErrors> for MediaError {
    fn from(err: validator::ValidationErrors) -> Self {
        MediaError::Validation(err.to_string())
    }
}

impl ErrorMetadata for MediaError {
    fn error_code(&self) -> &'static str {
        match self {
            MediaError::RateLimited { .. } => "RATE_LIMITED",
            MediaError::Http { status, .. } if *status >= 500 => "SERVER_ERROR",
            MediaError::Http { status: 404, .. } => "NOT_FOUND",
            MediaError::Http { status: 401 | 403, .. } => "UNAUTHORIZED",
            MediaError::Http { .. } => "CLIENT_ERROR",
            MediaError::Network(_) => "NETWORK_ERROR",
            MediaError::Validation(_) => "VALIDATION_ERROR",
            MediaError::Decode(_) => "DECODE_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            MediaError::RateLimited { .. } | MediaError::Network(_) => true,
            MediaError::Http { status, .. } => *status >= 500,
            MediaError::Validation(_) | MediaError::Decode(_) => false,
        }
    }

    fn client_message(&self) -> String {
        match self {
            MediaError::RateLimited { message } | MediaError::Http { message, .. } => message
                .clone()
                .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
            MediaError::Validation(msg) => msg.clone(),
            MediaError::Network(_) | MediaError::Decode(_) => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            MediaError::Validation(_) => LogLevel::Debug,
            MediaError::RateLimited { .. } => LogLevel::Warn,
            MediaError::Http { status, .. } if *status < 500 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}
