use crate::config::Config;
use crate::email::{Email, SendOption};
use crate::error::Result;
use crate::imap::{fetcher, flags, ConnectionManager, Filter, ImapConnector, MailboxStatus, TlsImapConnector};
use crate::smtp::{LettreDialer, Mailer, SmtpDialer};
use std::sync::Arc;
use tracing::{debug, info};

/// Mail client over one account: IMAP retrieval and flag changes, SMTP
/// delivery.
#[derive(Debug)]
pub struct Client {
    imap: ConnectionManager,
    mailer: Mailer,
    fetch_concurrency: usize,
}

impl Client {
    /// Builds a client with the default TLS transports and, when an IMAP
    /// server is configured, logs in right away.
    pub async fn connect(config: Config) -> Result<Self> {
        let connector = TlsImapConnector {
            timeout: config.connect_timeout,
            accept_invalid_certs: config.accept_invalid_certs,
        };
        let dialer = LettreDialer {
            timeout: config.connect_timeout,
            accept_invalid_certs: config.accept_invalid_certs,
        };
        Self::with_transports(config, Arc::new(connector), Arc::new(dialer)).await
    }

    pub async fn with_transports(
        config: Config,
        connector: Arc<dyn ImapConnector>,
        dialer: Arc<dyn SmtpDialer>,
    ) -> Result<Self> {
        let client = Self {
            imap: ConnectionManager::new(&config, connector),
            mailer: Mailer::new(&config, dialer),
            fetch_concurrency: config.fetch_concurrency,
        };
        if let Some(server) = client.imap.server() {
            info!("Connecting to IMAP server {}", server);
            client.imap.connect().await?;
        }
        Ok(client)
    }

    pub fn mailer(&self) -> &Mailer {
        &self.mailer
    }

    pub async fn select_mailbox(&self, name: &str, read_only: bool) -> Result<MailboxStatus> {
        self.imap
            .with_reconnect(move || self.imap.select(name, read_only))
            .await
    }

    /// Retrieves the messages matching `filter`. Message order follows the
    /// post-search UID selection; UIDs that fail to fetch are left out.
    pub async fn get(&self, filter: &Filter) -> Result<Vec<Email>> {
        self.imap.with_reconnect(move || self.get_once(filter)).await
    }

    async fn get_once(&self, filter: &Filter) -> Result<Vec<Email>> {
        let status = self.imap.select(&filter.mailbox, false).await?;
        if status.exists == 0 {
            return Ok(Vec::new());
        }

        let session = self.imap.require_session().await?;
        let query = filter.search_query();
        let found = session.lock().await.uid_search(&query).await?;
        if found.is_empty() {
            return Ok(Vec::new());
        }

        let uids = filter.select_uids(found);
        debug!("Fetching {} message(s) from {}", uids.len(), filter.mailbox);
        let emails = fetcher::fetch_all(&session, &uids, self.fetch_concurrency).await;

        if filter.mark_read {
            let unread: Vec<u32> = emails
                .iter()
                .filter(|email| !email.is_seen())
                .map(|email| email.uid)
                .collect();
            let mut guard = session.lock().await;
            flags::mark_read(&mut **guard, &unread).await?;
        }

        Ok(emails)
    }

    /// Flags `uids` as deleted. Call [`Client::mark_read`] or
    /// [`Client::mark_unread`] afterwards to expunge them.
    pub async fn delete(&self, uids: &[u32]) -> Result<()> {
        self.imap
            .with_reconnect(move || async move {
                let session = self.imap.require_session().await?;
                let mut guard = session.lock().await;
                flags::delete(&mut **guard, uids).await
            })
            .await
    }

    pub async fn mark_read(&self, uids: &[u32]) -> Result<()> {
        self.imap
            .with_reconnect(move || async move {
                let session = self.imap.require_session().await?;
                let mut guard = session.lock().await;
                flags::mark_read(&mut **guard, uids).await
            })
            .await
    }

    pub async fn mark_unread(&self, uids: &[u32]) -> Result<()> {
        self.imap
            .with_reconnect(move || async move {
                let session = self.imap.require_session().await?;
                let mut guard = session.lock().await;
                flags::mark_unread(&mut **guard, uids).await
            })
            .await
    }

    pub async fn send(
        &self,
        to: &[String],
        subject: &str,
        body: &[u8],
        opt: &SendOption,
    ) -> Result<()> {
        self.mailer.send(to, subject, body, opt).await
    }

    /// Logs out of the IMAP session. The client stays usable for sending.
    pub async fn close(&self) {
        self.imap.close().await;
    }
}
