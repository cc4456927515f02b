use serde::Deserialize;
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Unauthorized - session expired or missing")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid or expired reset token: {0}")]
    InvalidResetToken(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Carrier tracking unavailable: {0}")]
    CarrierUnavailable(String),

    #[error("Rate limited - please wait before trying again")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Session storage error: {0}")]
    Session(String),
}

/// Coarse classification of an `ApiError`, for callers that branch on the
/// kind of failure rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    Authz,
    NotFound,
    CarrierUnavailable,
    Server,
    Transport,
    Storage,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// FastAPI error body: `detail` is a string, or a list of validation items.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Items(Vec<ErrorItem>),
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    msg: String,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Extract the human-readable `detail` message from an error body, if any.
    pub fn server_detail(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        let message = match parsed.detail {
            ErrorDetail::Message(msg) => msg,
            ErrorDetail::Items(items) => items
                .into_iter()
                .map(|item| item.msg)
                .collect::<Vec<_>>()
                .join("; "),
        };
        let message = message.trim().to_string();
        if message.is_empty() {
            None
        } else {
            Some(message)
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = Self::server_detail(body).unwrap_or_default();
        match status.as_u16() {
            400 | 422 => ApiError::Validation(detail),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(detail),
            404 => ApiError::NotFound(detail),
            429 => ApiError::RateLimited,
            500..=599 => {
                if detail.is_empty() {
                    ApiError::ServerError(Self::truncate_body(body))
                } else {
                    ApiError::ServerError(detail)
                }
            }
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) | ApiError::InvalidResetToken(_) => ErrorKind::Validation,
            ApiError::InvalidCredentials(_) => ErrorKind::Auth,
            ApiError::Unauthorized | ApiError::AccessDenied(_) => ErrorKind::Authz,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::CarrierUnavailable(_) => ErrorKind::CarrierUnavailable,
            ApiError::RateLimited | ApiError::ServerError(_) => ErrorKind::Server,
            ApiError::Network(_) | ApiError::InvalidResponse(_) => ErrorKind::Transport,
            ApiError::Session(_) => ErrorKind::Storage,
        }
    }

    /// True when the caller must re-authenticate.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// The server-provided message if there is one, otherwise `fallback`.
    ///
    /// Transport failures and bare server errors never leak their raw text
    /// into the UI; the caller's generic fallback is shown instead.
    pub fn user_message(&self, fallback: &str) -> String {
        let message = match self {
            ApiError::Validation(msg)
            | ApiError::InvalidCredentials(msg)
            | ApiError::InvalidResetToken(msg)
            | ApiError::AccessDenied(msg)
            | ApiError::NotFound(msg)
            | ApiError::CarrierUnavailable(msg) => msg.as_str(),
            ApiError::Unauthorized => "Session expired, please log in again",
            ApiError::RateLimited => "Too many requests, please wait and try again",
            _ => "",
        };
        if message.is_empty() {
            fallback.to_string()
        } else {
            message.to_string()
        }
    }
}
