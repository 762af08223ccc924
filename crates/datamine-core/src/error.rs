//! Error type for HTTP streaming

/// Error from fetching a remote resource.
///
/// Wraps either a transport/HTTP failure or a local I/O error raised while
/// the body was being read or written.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// HTTP error with optional status code (`None` = no response at all)
    #[error("{}", fmt_http(.status, .message))]
    Http {
        status: Option<u16>,
        message: String,
    },
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_http(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(s) => format!("HTTP {s}: {message}"),
        None => format!("HTTP error: {message}"),
    }
}

impl StreamError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    /// Status code of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::Io(_) => None,
        }
    }

    /// Whether the read stalled past the configured read timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, ErrorKind};

    fn http_err(status: u16) -> StreamError {
        StreamError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn display_http_with_status() {
        assert_eq!(format!("{}", http_err(404)), "HTTP 404: test");
    }

    #[test]
    fn display_http_without_status() {
        let err = StreamError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP error: connection refused");
    }

    #[test]
    fn display_io_error() {
        let err = StreamError::Io(io::Error::new(ErrorKind::NotFound, "file not found"));
        assert!(format!("{err}").contains("IO error"));
    }

    #[test]
    fn status_accessor() {
        assert_eq!(http_err(500).status(), Some(500));
        assert_eq!(StreamError::Io(io::Error::other("x")).status(), None);
    }

    #[test]
    fn timeout_detection() {
        let err = StreamError::Io(io::Error::new(ErrorKind::TimedOut, "read timeout"));
        assert!(err.is_timeout());
        assert!(!http_err(504).is_timeout());
    }
}
