use crate::address::ServerAddress;
use crate::config::Credentials;
use crate::error::{Error, Result};
use async_trait::async_trait;
use lettre::transport::smtp::authentication::{self, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::{Data, Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::Address;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

pub const SMTP_PORT_SSL: u16 = 465;
pub const SMTP_PORT_SUBMISSION: u16 = 587;
pub const SMTP_PORT_SUBMISSION_ALT: u16 = 2525;

/// Policy for securing the SMTP connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionType {
    /// Pick by port: 465 is implicit TLS, 587/2525 try STARTTLS, anything
    /// else stays plain.
    #[default]
    Auto,
    Ssl,
    StartTls,
    Plain,
}

impl FromStr for ConnectionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "ssl" | "tls" => Ok(Self::Ssl),
            "starttls" => Ok(Self::StartTls),
            "plain" | "none" => Ok(Self::Plain),
            other => Err(Error::Config(format!("unknown SMTP connection type: {other}"))),
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Ssl => "ssl",
            Self::StartTls => "starttls",
            Self::Plain => "plain",
        })
    }
}

/// How the transport is actually established for one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    ImplicitTls,
    /// Plain dial followed by STARTTLS. A failed upgrade is only fatal when
    /// `required`.
    Upgrade { required: bool },
    Plain,
}

pub fn resolve_transport(port: u16, policy: ConnectionType) -> TransportMode {
    match policy {
        ConnectionType::Auto => match port {
            SMTP_PORT_SSL => TransportMode::ImplicitTls,
            SMTP_PORT_SUBMISSION | SMTP_PORT_SUBMISSION_ALT => {
                TransportMode::Upgrade { required: false }
            }
            _ => TransportMode::Plain,
        },
        ConnectionType::Ssl => TransportMode::ImplicitTls,
        ConnectionType::StartTls => TransportMode::Upgrade { required: true },
        ConnectionType::Plain => TransportMode::Plain,
    }
}

/// `Some(required)` when `mode` dials in plain text and then attempts
/// STARTTLS.
pub fn upgrade_policy(mode: TransportMode) -> Option<bool> {
    match mode {
        TransportMode::Upgrade { required } => Some(required),
        TransportMode::ImplicitTls | TransportMode::Plain => None,
    }
}

/// A failed upgrade aborts the dial only when it was required; otherwise
/// the session carries on over the plain connection.
pub fn settle_upgrade(required: bool, upgraded: Result<()>) -> Result<()> {
    match upgraded {
        Ok(()) => Ok(()),
        Err(e) if required => Err(e),
        Err(e) => {
            warn!("STARTTLS failed, continuing in plain text: {}", e);
            Ok(())
        }
    }
}

/// One authenticated SMTP session, driven command by command.
#[async_trait]
pub trait SmtpTransaction: Send + fmt::Debug {
    async fn mail_from(&mut self, from: &Address) -> Result<()>;
    async fn rcpt_to(&mut self, to: &Address) -> Result<()>;
    async fn data(&mut self) -> Result<()>;
    async fn write_message(&mut self, message: &[u8]) -> Result<()>;
    async fn quit(&mut self) -> Result<()>;
    async fn close(&mut self);
}

/// Opens and authenticates SMTP sessions.
#[async_trait]
pub trait SmtpDialer: Send + Sync + fmt::Debug {
    async fn dial(
        &self,
        server: &ServerAddress,
        mode: TransportMode,
        credentials: &Credentials,
    ) -> Result<Box<dyn SmtpTransaction>>;
}

#[derive(Debug, Clone)]
pub struct LettreDialer {
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for LettreDialer {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
        }
    }
}

impl LettreDialer {
    fn tls_parameters(&self, host: &str) -> Result<TlsParameters> {
        TlsParameters::builder(host.to_string())
            .dangerous_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| Error::Tls(e.to_string()))
    }
}

#[async_trait]
impl SmtpDialer for LettreDialer {
    async fn dial(
        &self,
        server: &ServerAddress,
        mode: TransportMode,
        credentials: &Credentials,
    ) -> Result<Box<dyn SmtpTransaction>> {
        let hello = ClientId::default();
        let implicit_tls = match mode {
            TransportMode::ImplicitTls => Some(self.tls_parameters(&server.host)?),
            TransportMode::Upgrade { .. } | TransportMode::Plain => None,
        };

        debug!("Dialing SMTP server {} ({:?})", server, mode);
        let mut conn = AsyncSmtpConnection::connect_tokio1(
            (server.host.as_str(), server.port),
            Some(self.timeout),
            &hello,
            implicit_tls,
            None,
        )
        .await
        .map_err(|e| Error::Connection(e.to_string()))?;

        if let Some(required) = upgrade_policy(mode) {
            let upgraded = if conn.can_starttls() {
                conn.starttls(self.tls_parameters(&server.host)?, &hello)
                    .await
                    .map_err(|e| Error::Tls(e.to_string()))
            } else {
                Err(Error::Tls("server does not advertise STARTTLS".to_string()))
            };
            settle_upgrade(required, upgraded)?;
        }

        let creds = authentication::Credentials::new(
            credentials.address.clone(),
            credentials.secret.clone(),
        );
        conn.auth(&[Mechanism::Plain], &creds)
            .await
            .map_err(|e| Error::Auth(e.to_string()))?;

        Ok(Box::new(LettreTransaction { conn: Some(conn) }))
    }
}

struct LettreTransaction {
    conn: Option<AsyncSmtpConnection>,
}

impl fmt::Debug for LettreTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LettreTransaction")
            .field("open", &self.conn.is_some())
            .finish()
    }
}

impl LettreTransaction {
    fn conn(&mut self) -> Result<&mut AsyncSmtpConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::smtp("connection already closed"))
    }
}

#[async_trait]
impl SmtpTransaction for LettreTransaction {
    async fn mail_from(&mut self, from: &Address) -> Result<()> {
        self.conn()?
            .command(Mail::new(Some(from.clone()), vec![]))
            .await?;
        Ok(())
    }

    async fn rcpt_to(&mut self, to: &Address) -> Result<()> {
        self.conn()?.command(Rcpt::new(to.clone(), vec![])).await?;
        Ok(())
    }

    async fn data(&mut self) -> Result<()> {
        self.conn()?.command(Data).await?;
        Ok(())
    }

    async fn write_message(&mut self, message: &[u8]) -> Result<()> {
        self.conn()?.message(message).await?;
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        self.conn()?.quit().await?;
        Ok(())
    }

    async fn close(&mut self) {
        self.conn.take();
    }
}
