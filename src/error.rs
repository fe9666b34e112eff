use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static TRANSIENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)closed|broken pipe").unwrap());

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IMAP client is not connected")]
    NotConnected,

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("SMTP error: {message}")]
    Smtp { code: Option<u16>, message: String },
}

/// Coarse classification of an [`Error`], used to decide whether a call
/// may be retried after reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Transient,
    Protocol,
}

impl Error {
    pub fn smtp(message: impl Into<String>) -> Self {
        Error::Smtp {
            code: None,
            message: message.into(),
        }
    }

    /// True when the underlying transport looks dead ("closed" or
    /// "broken pipe") and a fresh session may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Imap(msg) => TRANSIENT_RE.is_match(msg),
            _ => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Configuration,
            Error::Connection(_) | Error::Auth(_) | Error::Tls(_) => ErrorKind::Connection,
            _ if self.is_transient() => ErrorKind::Transient,
            Error::NotConnected | Error::Imap(_) | Error::Smtp { .. } => ErrorKind::Protocol,
        }
    }
}

impl From<async_imap::error::Error> for Error {
    fn from(e: async_imap::error::Error) -> Self {
        match e {
            async_imap::error::Error::ConnectionLost => {
                Error::Imap("connection closed by server".to_string())
            }
            other => Error::Imap(other.to_string()),
        }
    }
}

impl From<async_native_tls::Error> for Error {
    fn from(e: async_native_tls::Error) -> Self {
        Error::Tls(e.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for Error {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        let code = e
            .status()
            .and_then(|code| code.to_string().parse::<u16>().ok());
        Error::Smtp {
            code,
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_and_broken_pipe_are_transient() {
        assert!(Error::Imap("broken pipe".into()).is_transient());
        assert!(Error::Imap("Broken pipe (os error 32)".into()).is_transient());
        assert!(Error::Imap("connection closed by server".into()).is_transient());
        assert_eq!(
            Error::Imap("use of closed network connection".into()).kind(),
            ErrorKind::Transient
        );
    }

    #[test]
    fn other_errors_are_not_transient() {
        assert!(!Error::Imap("NO [TRYCREATE] no such mailbox".into()).is_transient());
        assert!(!Error::Connection("connection closed".into()).is_transient());
        assert!(!Error::Auth("broken pipe".into()).is_transient());
        assert_eq!(Error::NotConnected.kind(), ErrorKind::Protocol);
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Configuration);
        assert_eq!(Error::Tls("x".into()).kind(), ErrorKind::Connection);
    }

    #[test]
    fn connection_lost_maps_to_transient() {
        let err: Error = async_imap::error::Error::ConnectionLost.into();
        assert!(err.is_transient());
    }
}
