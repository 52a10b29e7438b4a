// Session pipeline error types
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the session and tenant pipeline.
///
/// `Clone` so that a single in-flight refresh can hand the same outcome to
/// every request waiting on it.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    // Non-2xx response from the API
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    // Connection refused, timeout, TLS, ...
    #[error("Transport error: {0}")]
    Transport(String),

    // 2xx response whose payload did not match any known shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SessionError {
    pub fn http(status: u16, message: impl Into<String>, body: Option<Value>) -> Self {
        SessionError::Http {
            status,
            message: message.into(),
            body,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        SessionError::InvalidResponse(message.into())
    }

    pub fn not_authenticated(message: impl Into<String>) -> Self {
        SessionError::NotAuthenticated(message.into())
    }

    /// HTTP status carried by the error, if it came from a response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SessionError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Stable code for CLI/JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::Http { status: 401, .. } => "UNAUTHORIZED",
            SessionError::Http { status: 403, .. } => "FORBIDDEN",
            SessionError::Http { status: 404, .. } => "NOT_FOUND",
            SessionError::Http { status, .. } if *status >= 500 => "SERVER_ERROR",
            SessionError::Http { .. } => "HTTP_ERROR",
            SessionError::Transport(_) => "TRANSPORT_ERROR",
            SessionError::InvalidResponse(_) => "INVALID_RESPONSE",
            SessionError::NotAuthenticated(_) => "NOT_AUTHENTICATED",
            SessionError::Storage(_) => "STORAGE_ERROR",
            SessionError::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::InvalidResponse(err.to_string())
    }
}

impl From<url::ParseError> for SessionError {
    fn from(err: url::ParseError) -> Self {
        SessionError::Config(format!("invalid URL: {}", err))
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_detection() {
        let err = SessionError::http(401, "Unauthenticated.", None);
        assert!(err.is_unauthorized());
        assert_eq!(err.error_code(), "UNAUTHORIZED");

        let err = SessionError::http(503, "down", None);
        assert!(!err.is_unauthorized());
        assert_eq!(err.error_code(), "SERVER_ERROR");

        assert_eq!(SessionError::Transport("refused".into()).status_code(), None);
    }
}
