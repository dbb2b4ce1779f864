use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// `{code, message?}` envelope the service attaches to every error response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn from_status(status: u16) -> Self {
        Self {
            code: format!("http_{status}"),
            message: None,
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} ({})", message, self.code),
            None => f.write_str(&self.code),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The access token was rejected and could not be refreshed. The stored
    /// session has been cleared.
    #[error("Session expired, log in again")]
    SessionExpired,

    #[error("Unauthorized: {0}")]
    Unauthorized(ErrorBody),

    #[error("Validation error: {0}")]
    Validation(ErrorBody),

    #[error("Not found: {0}")]
    NotFound(ErrorBody),

    #[error("Server error {status}: {body}")]
    Server { status: u16, body: ErrorBody },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    pub(crate) fn from_status(status: u16, body: ErrorBody) -> Self {
        match status {
            400 | 422 => ClientError::Validation(body),
            401 => ClientError::Unauthorized(body),
            404 => ClientError::NotFound(body),
            _ => ClientError::Server { status, body },
        }
    }

    /// Machine-readable error code reported by the service, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Unauthorized(body)
            | ClientError::Validation(body)
            | ClientError::NotFound(body)
            | ClientError::Server { body, .. } => Some(body.code.as_str()),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
