use thiserror::Error;

use crate::auth::RefreshError;

/// A failure to complete an HTTP exchange at all (connect, TLS, timeout, body read).
///
/// Only the message is kept so the error can be cloned and handed to every
/// caller waiting on the same refresh exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(format!("request timed out: {}", err))
        } else {
            Self::new(err.to_string())
        }
    }
}

/// Outcome of [`RequestDispatcher::send`](super::RequestDispatcher::send) when no
/// usable response can be handed back.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    #[error("Network error: {0}")]
    NetworkError(#[from] TransportError),

    /// Authorization was rejected and could not be recovered with a refresh.
    /// The session has been torn down by the time the caller sees this.
    #[error("Authorization expired (status {status})")]
    AuthExpired {
        status: u16,
        #[source]
        refresh: Option<RefreshError>,
    },
}

impl DispatchError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, DispatchError::AuthExpired { .. })
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Rejected by server: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

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

    /// Classify a non-success status that the dispatcher passed through.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 | 409 | 422 => ApiError::BadRequest(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ApiError::Dispatch(err) if err.is_auth_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, "{\"error\":\"already processed\"}"),
            ApiError::BadRequest(body) if body.contains("already processed")
        ));
        assert!(matches!(ApiError::from_status(StatusCode::NOT_FOUND, ""), ApiError::NotFound(_)));
        assert!(matches!(ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""), ApiError::RateLimited));
        assert!(matches!(ApiError::from_status(StatusCode::BAD_GATEWAY, "oops"), ApiError::ServerError(_)));
        assert!(matches!(ApiError::from_status(StatusCode::IM_A_TEAPOT, ""), ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated, 520 total bytes"));

        assert_eq!(ApiError::truncate_body("short"), "short");
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_BODY_LENGTH);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated"));
    }

    #[test]
    fn test_auth_expired_detection() {
        let err = ApiError::from(DispatchError::AuthExpired { status: 401, refresh: None });
        assert!(err.is_auth_expired());

        let err = ApiError::from(DispatchError::NetworkError(TransportError::new("down")));
        assert!(!err.is_auth_expired());
    }
}
