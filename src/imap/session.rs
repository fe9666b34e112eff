use crate::address::ServerAddress;
use crate::config::Credentials;
use crate::error::{Error, Result};
use async_imap::types::{Fetch, Flag};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::fmt;
use std::time::Duration;
use tracing::info;

pub type ImapStream = async_native_tls::TlsStream<async_std::net::TcpStream>;

/// Server answer to SELECT / EXAMINE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    pub name: String,
    pub exists: u32,
    pub recent: u32,
    pub unseen: Option<u32>,
    pub uid_validity: Option<u32>,
    pub uid_next: Option<u32>,
    pub flags: Vec<String>,
    pub read_only: bool,
}

/// Envelope, flags and size of one message, fetched without the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub uid: u32,
    pub subject: String,
    pub from: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    pub flags: Vec<String>,
    pub size: Option<u32>,
}

/// The IMAP round trips the client needs. Each call is one command/response
/// exchange; callers serialise access to a session themselves.
#[async_trait]
pub trait MailboxSession: Send + fmt::Debug {
    async fn select(&mut self, mailbox: &str, read_only: bool) -> Result<MailboxStatus>;
    /// UIDs matching `query`, ascending.
    async fn uid_search(&mut self, query: &str) -> Result<Vec<u32>>;
    /// `None` when the server returns nothing for `uid`.
    async fn fetch_envelope(&mut self, uid: u32) -> Result<Option<MessageEnvelope>>;
    async fn fetch_body(&mut self, uid: u32) -> Result<Option<Vec<u8>>>;
    async fn uid_store(&mut self, uid_set: &str, query: &str) -> Result<()>;
    async fn expunge(&mut self) -> Result<()>;
    async fn logout(&mut self) -> Result<()>;
}

/// Dials and logs in, yielding a fresh session.
#[async_trait]
pub trait ImapConnector: Send + Sync + fmt::Debug {
    async fn connect(
        &self,
        server: &ServerAddress,
        credentials: &Credentials,
    ) -> Result<Box<dyn MailboxSession>>;
}

/// Implicit-TLS connector backed by async-imap.
#[derive(Debug, Clone)]
pub struct TlsImapConnector {
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for TlsImapConnector {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
        }
    }
}

#[async_trait]
impl ImapConnector for TlsImapConnector {
    async fn connect(
        &self,
        server: &ServerAddress,
        credentials: &Credentials,
    ) -> Result<Box<dyn MailboxSession>> {
        let tls = async_native_tls::TlsConnector::new()
            .danger_accept_invalid_certs(self.accept_invalid_certs);
        let tcp = async_std::future::timeout(
            self.timeout,
            async_std::net::TcpStream::connect((server.host.as_str(), server.port)),
        )
        .await
        .map_err(|_| {
            Error::Connection(format!(
                "TCP connect to {} timed out after {}s",
                server,
                self.timeout.as_secs()
            ))
        })?
        .map_err(|e| Error::Connection(e.to_string()))?;

        let tls_stream = tls
            .connect(server.host.as_str(), tcp)
            .await
            .map_err(|e| Error::Tls(e.to_string()))?;

        let client = async_imap::Client::new(tls_stream);
        let session = client
            .login(&credentials.address, &credentials.secret)
            .await
            .map_err(|(e, _)| Error::Auth(e.to_string()))?;

        info!("Logged in to {} as {}", server, credentials.address);
        Ok(Box::new(AsyncImapSession { inner: session }))
    }
}

pub struct AsyncImapSession {
    inner: async_imap::Session<ImapStream>,
}

impl fmt::Debug for AsyncImapSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncImapSession").finish_non_exhaustive()
    }
}

impl AsyncImapSession {
    async fn fetch_one(&mut self, uid: u32, query: &str) -> Result<Option<Fetch>> {
        let fetches: Vec<Fetch> = self
            .inner
            .uid_fetch(uid.to_string(), query)
            .await?
            .try_collect()
            .await?;
        Ok(pick_response(fetches, uid, |f| f.uid))
    }
}

/// Unsolicited FETCH responses for other messages may be interleaved with
/// the one asked for. An exact UID match wins; a response without a UID is
/// only taken when nothing matches.
fn pick_response<T>(responses: Vec<T>, uid: u32, uid_of: impl Fn(&T) -> Option<u32>) -> Option<T> {
    let mut untagged = None;
    for response in responses {
        match uid_of(&response) {
            Some(u) if u == uid => return Some(response),
            None if untagged.is_none() => untagged = Some(response),
            _ => {}
        }
    }
    untagged
}

#[async_trait]
impl MailboxSession for AsyncImapSession {
    async fn select(&mut self, mailbox: &str, read_only: bool) -> Result<MailboxStatus> {
        let status = if read_only {
            self.inner.examine(mailbox).await?
        } else {
            self.inner.select(mailbox).await?
        };
        Ok(MailboxStatus {
            name: mailbox.to_string(),
            exists: status.exists,
            recent: status.recent,
            unseen: status.unseen,
            uid_validity: status.uid_validity,
            uid_next: status.uid_next,
            flags: status.flags.iter().map(flag_name).collect(),
            read_only,
        })
    }

    async fn uid_search(&mut self, query: &str) -> Result<Vec<u32>> {
        let mut uids: Vec<u32> = self.inner.uid_search(query).await?.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn fetch_envelope(&mut self, uid: u32) -> Result<Option<MessageEnvelope>> {
        let Some(fetch) = self
            .fetch_one(uid, "(UID FLAGS ENVELOPE RFC822.SIZE)")
            .await?
        else {
            return Ok(None);
        };
        let Some(envelope) = fetch.envelope() else {
            return Ok(None);
        };

        let subject = envelope
            .subject
            .as_ref()
            .map(|s| decode_rfc2047(&String::from_utf8_lossy(s)))
            .unwrap_or_default();
        let date = envelope
            .date
            .as_ref()
            .and_then(|d| mailparse::dateparse(&String::from_utf8_lossy(d)).ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0));
        let from = envelope
            .from
            .as_ref()
            .map(|list| {
                list.iter()
                    .map(|addr| {
                        let mailbox = addr
                            .mailbox
                            .as_ref()
                            .map(|m| String::from_utf8_lossy(m).to_string())
                            .unwrap_or_default();
                        let host = addr
                            .host
                            .as_ref()
                            .map(|h| String::from_utf8_lossy(h).to_string())
                            .unwrap_or_default();
                        format!("{mailbox}@{host}")
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(MessageEnvelope {
            uid,
            subject,
            from,
            date,
            flags: fetch.flags().map(|f| flag_name(&f)).collect(),
            size: fetch.size,
        }))
    }

    async fn fetch_body(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let fetch = self.fetch_one(uid, "BODY.PEEK[]").await?;
        Ok(fetch.and_then(|f| f.body().map(<[u8]>::to_vec)))
    }

    async fn uid_store(&mut self, uid_set: &str, query: &str) -> Result<()> {
        let _: Vec<Fetch> = self
            .inner
            .uid_store(uid_set, query)
            .await?
            .try_collect()
            .await?;
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        let _: Vec<u32> = self.inner.expunge().await?.try_collect().await?;
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.inner.logout().await?;
        Ok(())
    }
}

pub fn flag_name(flag: &Flag<'_>) -> String {
    match flag {
        Flag::Seen => "\\Seen".to_string(),
        Flag::Answered => "\\Answered".to_string(),
        Flag::Flagged => "\\Flagged".to_string(),
        Flag::Deleted => "\\Deleted".to_string(),
        Flag::Draft => "\\Draft".to_string(),
        Flag::Recent => "\\Recent".to_string(),
        Flag::Custom(name) => name.to_string(),
        Flag::MayCreate => "\\*".to_string(),
    }
}

fn decode_rfc2047(input: &str) -> String {
    let fake_header = format!("X: {input}");
    match mailparse::parse_header(fake_header.as_bytes()) {
        Ok((header, _)) => header.get_value(),
        Err(_) => input.to_string(),
    }
}
