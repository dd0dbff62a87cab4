use std::fmt;

use chrono::{DateTime, Utc};

#[derive(Debug)]
pub enum Error {
    /// Transport failure: DNS, refused or reset connection, timeout.
    Network(reqwest::Error),
    Http(u16),
    /// The appliance answered 401; the connection needs reconfiguring.
    Auth,
    Protocol(String),
    InvalidConfig(String),
    Io(std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network(_) => ErrorKind::Network,
            Error::Http(_) => ErrorKind::Http,
            Error::Auth => ErrorKind::Auth,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::InvalidConfig(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Network(e) if e.is_timeout())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Network(e) if e.is_timeout() => write!(f, "network error: request timed out"),
            Error::Network(e) => write!(f, "network error: {e}"),
            Error::Http(status) => write!(f, "HTTP error: status {status}"),
            Error::Auth => write!(f, "authentication failed (HTTP 401)"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Network(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Cloneable classification of an [`Error`], kept in snapshots and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Http,
    Auth,
    Protocol,
    Config,
    Io,
}

impl ErrorKind {
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ErrorKind::Auth)
    }
}

/// The most recent refresh failure recorded by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn from_error(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            at: Utc::now(),
        }
    }
}
