use std::fmt;

use thiserror::Error;

/// The broad category of a failed fetch.
///
/// The coordinator never interprets this, it is chosen by the executor and passed through to
/// observers verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport failure: connection loss, DNS resolution, a timeout or a 5xx response.
    Network,
    /// The resource does not exist at the remote source.
    NotFound,
    /// The resource could not be fetched due to missing permissions.
    Permission,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// A stable name, used as metrics tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::NotFound => "notfound",
            ErrorKind::Permission => "permission",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error an executor reports for a failed fetch.
///
/// This is what ends up in an errored [`CacheEntry`](super::CacheEntry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ErrorInfo {
    /// The category of the error.
    pub kind: ErrorKind,
    /// A human-readable description.
    pub message: String,
    /// The innermost underlying error, if any.
    pub cause: Option<String>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Attaches a cause.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Creates an error of the given kind from a std error.
    ///
    /// The message is the error itself, the cause is the innermost error of its source chain.
    pub fn from_std_error(kind: ErrorKind, error: &dyn std::error::Error) -> Self {
        let mut innermost = error;
        while let Some(source) = innermost.source() {
            innermost = source;
        }

        let info = Self::new(kind, error.to_string());
        match error.source() {
            Some(_) => info.with_cause(innermost.to_string()),
            None => info,
        }
    }
}
