use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unauthorized - token may be invalid or expired")]
    Unauthorized,

    #[error("Login succeeded but the server returned no token")]
    MissingToken,

    #[error("{message}")]
    Validation { status: Option<u16>, message: String },

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token storage error: {0}")]
    Storage(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build a local validation error (no request was sent).
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            status: None,
            message: message.into(),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            429 => ApiError::RateLimited,
            code => {
                // The API answers errors with `{"message": "..."}` when it can
                let message = serde_json::from_str::<ErrorBody>(body)
                    .ok()
                    .and_then(|b| b.message)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| {
                        if body.trim().is_empty() {
                            format!("HTTP error! status: {}", code)
                        } else {
                            Self::truncate_body(body)
                        }
                    });
                ApiError::Validation {
                    status: Some(code),
                    message,
                }
            }
        }
    }

    /// Override the status recorded on a validation error.
    pub fn with_status(self, code: u16) -> Self {
        match self {
            ApiError::Validation { message, .. } => ApiError::Validation {
                status: Some(code),
                message,
            },
            other => other,
        }
    }

    /// Text shown to the user: the server's own message when there is one,
    /// otherwise `fallback` (or a generic network message for transport errors).
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Validation { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Network(_) => "网络错误".to_string(),
            ApiError::MissingToken | ApiError::NotAuthenticated | ApiError::RateLimited => {
                self.to_string()
            }
            _ => fallback.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// HTTP status carried by the error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::RateLimited => Some(429),
            ApiError::Validation { status, .. } => *status,
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
