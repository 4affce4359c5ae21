//! Unified error type for the dashboard.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Backend API error (status={status}): {message}")]
    Api { status: u16, message: String },

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse error classes, used for logging and display decisions.
///
/// `Network` and `Timeout` render identically to the user but point at
/// different remediation (backend outage vs. backend slowness).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Timeout,
    Config,
    Other,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Config => "config",
            ErrorKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::Api { .. } | Error::Decode(_) | Error::Json(_) => {
                ErrorKind::Network
            }
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) | Error::Other(_) => ErrorKind::Other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_class_errors() {
        assert_eq!(Error::Http("refused".into()).kind(), ErrorKind::Network);
        assert_eq!(
            Error::Api {
                status: 503,
                message: "down".into()
            }
            .kind(),
            ErrorKind::Network
        );
        assert_eq!(Error::Decode("eof".into()).kind(), ErrorKind::Network);
    }

    #[test]
    fn test_timeout_is_distinguished() {
        let err = Error::Timeout(Duration::from_secs(10));
        assert!(err.is_timeout());
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.to_string(), "Request timed out after 10s");
        assert!(!Error::Http("x".into()).is_timeout());
    }

    #[test]
    fn test_api_error_display() {
        let err = Error::Api {
            status: 404,
            message: "Location not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Backend API error (status=404): Location not found"
        );
    }
}
