pub mod fetcher;
pub mod filter;
pub mod flags;
pub mod session;

pub use fetcher::SharedSession;
pub use filter::Filter;
pub use session::{ImapConnector, MailboxSession, MailboxStatus, MessageEnvelope, TlsImapConnector};

use crate::address::ServerAddress;
use crate::config::{Config, Credentials};
use crate::error::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct ManagerState {
    session: Option<SharedSession>,
    /// Last SELECT/EXAMINE, replayed after a reconnect.
    selected: Option<(String, bool)>,
}

/// Owns the IMAP session: initial login, reconnection and the single-shot
/// retry of calls that hit a dead connection.
#[derive(Debug)]
pub struct ConnectionManager {
    server: Option<ServerAddress>,
    credentials: Credentials,
    connector: Arc<dyn ImapConnector>,
    reconnect_delay: Duration,
    state: Mutex<ManagerState>,
}

impl ConnectionManager {
    pub fn new(config: &Config, connector: Arc<dyn ImapConnector>) -> Self {
        Self {
            server: config.imap_server.clone(),
            credentials: config.credentials.clone(),
            connector,
            reconnect_delay: config.reconnect_delay,
            state: Mutex::new(ManagerState::default()),
        }
    }

    pub fn server(&self) -> Option<&ServerAddress> {
        self.server.as_ref()
    }

    async fn open(&self) -> Result<SharedSession> {
        let server = self
            .server
            .as_ref()
            .ok_or_else(|| Error::Config("imap server is empty".to_string()))?;
        let session = self.connector.connect(server, &self.credentials).await?;
        Ok(Arc::new(Mutex::new(session)))
    }

    /// Logs in and installs a fresh session, replacing any existing one.
    pub async fn connect(&self) -> Result<()> {
        let session = self.open().await?;
        self.state.lock().await.session = Some(session);
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    pub async fn require_session(&self) -> Result<SharedSession> {
        self.state
            .lock()
            .await
            .session
            .clone()
            .ok_or(Error::NotConnected)
    }

    pub async fn select(&self, mailbox: &str, read_only: bool) -> Result<MailboxStatus> {
        let session = self.require_session().await?;
        let status = session.lock().await.select(mailbox, read_only).await?;
        self.state.lock().await.selected = Some((mailbox.to_string(), read_only));
        Ok(status)
    }

    /// Replaces the session with a new login and re-selects the last mailbox.
    pub async fn reconnect(&self) -> Result<()> {
        if !self.reconnect_delay.is_zero() {
            tokio::time::sleep(self.reconnect_delay).await;
        }

        let session = self.open().await?;
        let selected = self.state.lock().await.selected.clone();
        if let Some((mailbox, read_only)) = &selected {
            session.lock().await.select(mailbox, *read_only).await?;
        }

        self.state.lock().await.session = Some(session);
        info!("Reconnected IMAP session for {}", self.credentials.address);
        Ok(())
    }

    /// Runs `op`; if it fails with a transient error, reconnects once and
    /// runs it again, returning whatever the second attempt produces.
    pub async fn with_reconnect<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match op().await {
            Err(e) if e.is_transient() => {
                warn!("IMAP connection lost ({}), reconnecting", e);
                self.reconnect().await?;
                op().await
            }
            other => other,
        }
    }

    /// Logs out and forgets the session. A failed logout is only logged.
    pub async fn close(&self) {
        let session = {
            let mut state = self.state.lock().await;
            state.selected = None;
            state.session.take()
        };
        if let Some(session) = session {
            if let Err(e) = session.lock().await.logout().await {
                warn!("Failed to logout: {}", e);
            }
        }
    }
}
