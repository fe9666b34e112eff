//! Scripted stand-ins for the IMAP and SMTP transports. Every command is
//! recorded so tests can assert on the exact dialog the client drives.

use crate::address::ServerAddress;
use crate::config::Credentials;
use crate::email::SEEN_FLAG;
use crate::error::{Error, Result};
use crate::imap::{ImapConnector, MailboxSession, MailboxStatus, MessageEnvelope};
use crate::smtp::{SmtpDialer, SmtpTransaction, TransportMode};
use async_trait::async_trait;
use lettre::Address;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct MockMessage {
    pub subject: String,
    pub from: Vec<String>,
    pub flags: Vec<String>,
    pub raw: Vec<u8>,
}

impl MockMessage {
    pub fn text(subject: &str, body: &str) -> Self {
        let raw = format!(
            "From: sender@example.com\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}\r\n"
        );
        Self {
            subject: subject.to_string(),
            from: vec!["sender@example.com".to_string()],
            flags: Vec::new(),
            raw: raw.into_bytes(),
        }
    }

    pub fn from(mut self, addr: &str) -> Self {
        self.from = vec![addr.to_string()];
        self
    }
}

/// Server-side state shared by every session a [`MockConnector`] hands out.
#[derive(Debug, Default)]
pub struct MockMailbox {
    pub messages: BTreeMap<u32, MockMessage>,
    pub missing_envelope: HashSet<u32>,
    pub missing_body: HashSet<u32>,
    /// Each UID SEARCH pops one entry and fails with it while non-empty.
    pub search_failures: VecDeque<String>,
    pub commands: Vec<String>,
}

impl MockMailbox {
    pub fn shared() -> Arc<Mutex<MockMailbox>> {
        Arc::new(Mutex::new(MockMailbox::default()))
    }

    pub fn session(mailbox: &Arc<Mutex<MockMailbox>>) -> MockSession {
        MockSession {
            mailbox: mailbox.clone(),
        }
    }

    pub fn insert(&mut self, uid: u32, message: MockMessage) {
        self.messages.insert(uid, message);
    }

    pub fn set_seen(&mut self, uid: u32) {
        if let Some(message) = self.messages.get_mut(&uid) {
            if !message.flags.iter().any(|f| f == SEEN_FLAG) {
                message.flags.push(SEEN_FLAG.to_string());
            }
        }
    }

    fn clear_seen(&mut self, uid: u32) {
        if let Some(message) = self.messages.get_mut(&uid) {
            message.flags.retain(|f| f != SEEN_FLAG);
        }
    }
}

fn expand_uid_set(uid_set: &str) -> Vec<u32> {
    uid_set
        .split(',')
        .flat_map(|part| match part.split_once(':') {
            Some((a, b)) => {
                let (a, b): (u32, u32) = (a.parse().unwrap(), b.parse().unwrap());
                (a..=b).collect::<Vec<_>>()
            }
            None => vec![part.parse().unwrap()],
        })
        .collect()
}

#[derive(Debug)]
pub struct MockSession {
    mailbox: Arc<Mutex<MockMailbox>>,
}

#[async_trait]
impl MailboxSession for MockSession {
    async fn select(&mut self, mailbox: &str, read_only: bool) -> Result<MailboxStatus> {
        let mut mb = self.mailbox.lock().unwrap();
        let verb = if read_only { "EXAMINE" } else { "SELECT" };
        mb.commands.push(format!("{verb} {mailbox}"));
        Ok(MailboxStatus {
            name: mailbox.to_string(),
            exists: mb.messages.len() as u32,
            read_only,
            ..Default::default()
        })
    }

    async fn uid_search(&mut self, query: &str) -> Result<Vec<u32>> {
        let mut mb = self.mailbox.lock().unwrap();
        mb.commands.push(format!("UID SEARCH {query}"));
        if let Some(failure) = mb.search_failures.pop_front() {
            return Err(Error::Imap(failure));
        }
        let unseen_only = query.contains("UNSEEN");
        Ok(mb
            .messages
            .iter()
            .filter(|(_, m)| !unseen_only || !m.flags.iter().any(|f| f == SEEN_FLAG))
            .map(|(uid, _)| *uid)
            .collect())
    }

    async fn fetch_envelope(&mut self, uid: u32) -> Result<Option<MessageEnvelope>> {
        let mut mb = self.mailbox.lock().unwrap();
        mb.commands.push(format!("UID FETCH {uid} ENVELOPE"));
        if mb.missing_envelope.contains(&uid) {
            return Ok(None);
        }
        Ok(mb.messages.get(&uid).map(|m| MessageEnvelope {
            uid,
            subject: m.subject.clone(),
            from: m.from.clone(),
            date: None,
            flags: m.flags.clone(),
            size: Some(m.raw.len() as u32),
        }))
    }

    async fn fetch_body(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let mut mb = self.mailbox.lock().unwrap();
        mb.commands.push(format!("UID FETCH {uid} BODY.PEEK[]"));
        if mb.missing_body.contains(&uid) {
            return Ok(None);
        }
        Ok(mb.messages.get(&uid).map(|m| m.raw.clone()))
    }

    async fn uid_store(&mut self, uid_set: &str, query: &str) -> Result<()> {
        let mut mb = self.mailbox.lock().unwrap();
        mb.commands.push(format!("UID STORE {uid_set} {query}"));
        if query.contains("\\Seen") {
            for uid in expand_uid_set(uid_set) {
                if query.starts_with('+') {
                    mb.set_seen(uid);
                } else {
                    mb.clear_seen(uid);
                }
            }
        }
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        self.mailbox.lock().unwrap().commands.push("EXPUNGE".to_string());
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.mailbox.lock().unwrap().commands.push("LOGOUT".to_string());
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockConnector {
    mailbox: Arc<Mutex<MockMailbox>>,
    connects: AtomicUsize,
    reject_logins: AtomicBool,
}

impl MockConnector {
    pub fn new(mailbox: Arc<Mutex<MockMailbox>>) -> Self {
        Self {
            mailbox,
            connects: AtomicUsize::new(0),
            reject_logins: AtomicBool::new(false),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_logins(&self) {
        self.reject_logins.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImapConnector for MockConnector {
    async fn connect(
        &self,
        _server: &ServerAddress,
        _credentials: &Credentials,
    ) -> Result<Box<dyn MailboxSession>> {
        if self.reject_logins.load(Ordering::SeqCst) {
            return Err(Error::Auth("invalid credentials".to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.mailbox.lock().unwrap().commands.push("LOGIN".to_string());
        Ok(Box::new(MockMailbox::session(&self.mailbox)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpStep {
    MailFrom(String),
    RcptTo(String),
    Data,
    Message,
    Quit,
    Close,
}

#[derive(Debug, Default)]
struct DialerState {
    modes: Vec<TransportMode>,
    steps: Vec<SmtpStep>,
    messages: Vec<Vec<u8>>,
    rcpt_failures: HashMap<String, u16>,
    data_failure: Option<u16>,
    quit_failure: Option<u16>,
}

#[derive(Debug, Default)]
pub struct MockDialer {
    state: Arc<Mutex<DialerState>>,
}

impl MockDialer {
    pub fn dial_count(&self) -> usize {
        self.state.lock().unwrap().modes.len()
    }

    pub fn modes(&self) -> Vec<TransportMode> {
        self.state.lock().unwrap().modes.clone()
    }

    pub fn steps(&self) -> Vec<SmtpStep> {
        self.state.lock().unwrap().steps.clone()
    }

    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().messages.clone()
    }

    /// Makes RCPT TO for `addr` fail with reply `code`.
    pub fn fail_rcpt(&self, addr: &str, code: u16) {
        self.state
            .lock()
            .unwrap()
            .rcpt_failures
            .insert(addr.to_string(), code);
    }

    /// Makes DATA fail with reply `code`.
    pub fn fail_data(&self, code: u16) {
        self.state.lock().unwrap().data_failure = Some(code);
    }

    /// Makes QUIT fail with reply `code`.
    pub fn fail_quit(&self, code: u16) {
        self.state.lock().unwrap().quit_failure = Some(code);
    }
}

fn reply_error(code: Option<u16>, what: &str) -> Result<()> {
    match code {
        Some(code) => Err(Error::Smtp {
            code: Some(code),
            message: format!("{code} {what}"),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl SmtpDialer for MockDialer {
    async fn dial(
        &self,
        _server: &ServerAddress,
        mode: TransportMode,
        _credentials: &Credentials,
    ) -> Result<Box<dyn SmtpTransaction>> {
        self.state.lock().unwrap().modes.push(mode);
        Ok(Box::new(MockTransaction {
            state: self.state.clone(),
        }))
    }
}

#[derive(Debug)]
struct MockTransaction {
    state: Arc<Mutex<DialerState>>,
}

impl MockTransaction {
    fn record(&self, step: SmtpStep) {
        self.state.lock().unwrap().steps.push(step);
    }
}

#[async_trait]
impl SmtpTransaction for MockTransaction {
    async fn mail_from(&mut self, from: &Address) -> Result<()> {
        self.record(SmtpStep::MailFrom(from.to_string()));
        Ok(())
    }

    async fn rcpt_to(&mut self, to: &Address) -> Result<()> {
        self.record(SmtpStep::RcptTo(to.to_string()));
        let code = self.state.lock().unwrap().rcpt_failures.get(&to.to_string()).copied();
        reply_error(code, "recipient rejected")
    }

    async fn data(&mut self) -> Result<()> {
        self.record(SmtpStep::Data);
        let code = self.state.lock().unwrap().data_failure;
        reply_error(code, "data refused")
    }

    async fn write_message(&mut self, message: &[u8]) -> Result<()> {
        self.record(SmtpStep::Message);
        self.state.lock().unwrap().messages.push(message.to_vec());
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        self.record(SmtpStep::Quit);
        let code = self.state.lock().unwrap().quit_failure;
        reply_error(code, "closing connection")
    }

    async fn close(&mut self) {
        self.record(SmtpStep::Close);
    }
}
