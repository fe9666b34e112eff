use crate::address::{ServerAddress, IMAP_PORT_TLS, SMTP_PORT_PLAIN};
use crate::error::{Error, Result};
use crate::smtp::ConnectionType;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_FETCH_CONCURRENCY: usize = 10;

/// Account address and secret used for both IMAP LOGIN and SMTP AUTH PLAIN.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub address: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub imap_server: Option<ServerAddress>,
    pub smtp_server: Option<ServerAddress>,
    pub smtp_connection_type: ConnectionType,
    pub connect_timeout: Duration,
    /// Pause before the single reconnect attempt after a transient failure.
    pub reconnect_delay: Duration,
    pub fetch_concurrency: usize,
    pub accept_invalid_certs: bool,
}

impl Config {
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(address, secret),
            imap_server: None,
            smtp_server: None,
            smtp_connection_type: ConnectionType::Auto,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            accept_invalid_certs: false,
        }
    }

    /// `host[:port]`, port defaults to 993.
    pub fn imap_server(mut self, addr: &str) -> Result<Self> {
        self.imap_server = Some(ServerAddress::parse(addr, IMAP_PORT_TLS)?);
        Ok(self)
    }

    /// `host[:port]`, port defaults to 25.
    pub fn smtp_server(mut self, addr: &str) -> Result<Self> {
        self.smtp_server = Some(ServerAddress::parse(addr, SMTP_PORT_PLAIN)?);
        Ok(self)
    }

    #[must_use]
    pub fn smtp_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.smtp_connection_type = connection_type;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn fetch_concurrency(mut self, width: usize) -> Self {
        self.fetch_concurrency = width.max(1);
        self
    }

    #[must_use]
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Reads `EMAIL_ADDRESS`, `EMAIL_PASSWORD`, `IMAP_SERVER`, `SMTP_SERVER`
    /// and `SMTP_CONNECTION_TYPE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("{key} must be set")))
        };
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::new(require("EMAIL_ADDRESS")?, require("EMAIL_PASSWORD")?);
        if let Some(addr) = optional("IMAP_SERVER") {
            config = config.imap_server(&addr)?;
        }
        if let Some(addr) = optional("SMTP_SERVER") {
            config = config.smtp_server(&addr)?;
        }
        if let Some(kind) = optional("SMTP_CONNECTION_TYPE") {
            config.smtp_connection_type = kind.parse()?;
        }
        Ok(config)
    }
}
