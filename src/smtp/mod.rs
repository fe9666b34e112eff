pub mod compose;
pub mod connection;

pub use connection::{
    resolve_transport, ConnectionType, LettreDialer, SmtpDialer, SmtpTransaction, TransportMode,
};

use crate::address::ServerAddress;
use crate::config::{Config, Credentials};
use crate::email::SendOption;
use crate::error::{Error, Result};
use lettre::message::Mailbox;
use lettre::Address;
use std::sync::Arc;
use tracing::{debug, info};

/// Delivers single-part messages over SMTP.
#[derive(Debug, Clone)]
pub struct Mailer {
    server: Option<ServerAddress>,
    connection_type: ConnectionType,
    credentials: Credentials,
    dialer: Arc<dyn SmtpDialer>,
}

impl Mailer {
    pub fn new(config: &Config, dialer: Arc<dyn SmtpDialer>) -> Self {
        Self {
            server: config.smtp_server.clone(),
            connection_type: config.smtp_connection_type,
            credentials: config.credentials.clone(),
            dialer,
        }
    }

    pub fn transport_mode(&self) -> Option<TransportMode> {
        self.server
            .as_ref()
            .map(|server| resolve_transport(server.port, self.connection_type))
    }

    pub async fn send(
        &self,
        to: &[String],
        subject: &str,
        body: &[u8],
        opt: &SendOption,
    ) -> Result<()> {
        let server = self
            .server
            .as_ref()
            .ok_or_else(|| Error::Config("smtp server is empty".to_string()))?;
        if to.is_empty() {
            return Err(Error::Config("recipients list is empty".to_string()));
        }

        let sender = parse_address(&self.credentials.address)?;
        let recipients = to
            .iter()
            .chain(&opt.cc)
            .chain(&opt.bcc)
            .map(|addr| parse_address(addr))
            .collect::<Result<Vec<_>>>()?;

        let message =
            compose::compose_message(&self.credentials.address, to, subject, body, opt);
        let mode = resolve_transport(server.port, self.connection_type);

        let mut transaction = self.dialer.dial(server, mode, &self.credentials).await?;
        let result = run_dialog(transaction.as_mut(), &sender, &recipients, &message).await;
        transaction.close().await;

        if result.is_ok() {
            info!(
                "Sent \"{}\" to {} recipient(s) via {}",
                subject,
                recipients.len(),
                server
            );
        }
        result
    }
}

fn parse_address(addr: &str) -> Result<Address> {
    addr.parse::<Mailbox>()
        .map(|mailbox| mailbox.email)
        .map_err(|e| Error::Config(format!("invalid address {addr}: {e}")))
}

async fn run_dialog(
    tx: &mut dyn SmtpTransaction,
    sender: &Address,
    recipients: &[Address],
    message: &[u8],
) -> Result<()> {
    tx.mail_from(sender)
        .await
        .map_err(|e| context(e, "failed to set sender"))?;

    for recipient in recipients {
        tolerate_positive(tx.rcpt_to(recipient).await)
            .map_err(|e| context(e, &format!("failed to add recipient {recipient}")))?;
    }

    tolerate_positive(tx.data().await)
        .map_err(|e| context(e, "failed to create message writer"))?;

    tx.write_message(message)
        .await
        .map_err(|e| context(e, "failed to write message"))?;

    tolerate_positive(tx.quit().await)
}

/// Some servers answer with a completion code the transport still reports
/// as an error; a 2xx reply is a success whatever the wrapper says.
fn tolerate_positive(result: Result<()>) -> Result<()> {
    match result {
        Err(Error::Smtp {
            code: Some(code),
            message,
        }) if (200..300).contains(&code) => {
            debug!("Ignoring SMTP error carrying positive reply {}: {}", code, message);
            Ok(())
        }
        other => other,
    }
}

fn context(e: Error, what: &str) -> Error {
    match e {
        Error::Smtp { code, message } => Error::Smtp {
            code,
            message: format!("{what}: {message}"),
        },
        other => other,
    }
}
