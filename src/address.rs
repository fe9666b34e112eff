use crate::error::{Error, Result};
use std::fmt;

pub const IMAP_PORT_TLS: u16 = 993;
pub const SMTP_PORT_PLAIN: u16 = 25;

/// A `host:port` pair for one of the two mail servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses `host`, `host:port` or `[v6]:port`. A missing port falls back
    /// to `default_port`.
    pub fn parse(addr: &str, default_port: u16) -> Result<Self> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(Error::Config("server address is empty".to_string()));
        }

        let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| Error::Config(format!("invalid server address format: {addr}")))?;
            match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => {
                    return Err(Error::Config(format!(
                        "invalid server address format: {addr}"
                    )))
                }
            }
        } else {
            match addr.rsplit_once(':') {
                Some((host, _)) if host.contains(':') => {
                    return Err(Error::Config(format!(
                        "invalid server address format: {addr}"
                    )))
                }
                Some((host, port)) => (host, Some(port)),
                None => (addr, None),
            }
        };

        if host.is_empty() {
            return Err(Error::Config(format!("missing host in server address: {addr}")));
        }

        let port = match port {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("invalid port number: {port}")))?,
            None => default_port,
        };

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
