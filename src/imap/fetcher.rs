use super::session::MailboxSession;
use crate::email::Email;
use crate::error::{Error, Result};
use crate::mime;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

/// One IMAP session shared by the fetch workers. Every round trip holds the
/// lock for exactly one command/response pair.
pub type SharedSession = Arc<Mutex<Box<dyn MailboxSession>>>;

/// Result of fetching a single UID.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(Email),
    Failed { uid: u32, reason: String },
}

async fn fetch_email(session: &SharedSession, uid: u32) -> Result<Email> {
    let envelope = session
        .lock()
        .await
        .fetch_envelope(uid)
        .await?
        .ok_or_else(|| Error::Imap(format!("empty envelope for message {uid}")))?;

    let raw = session
        .lock()
        .await
        .fetch_body(uid)
        .await?
        .ok_or_else(|| Error::Imap(format!("empty body for message {uid}")))?;

    let body = mime::parse_message(&raw);
    Ok(Email {
        uid,
        subject: envelope.subject,
        content: body.content,
        from: envelope.from,
        date: envelope.date,
        size: envelope.size,
        attachments: body.attachments,
        flags: envelope.flags,
    })
}

/// Fetches every UID with at most `width` requests in flight and waits for
/// all of them. Results come back in the order of `uids`; failed UIDs are
/// reported as [`FetchOutcome::Failed`] instead of aborting the batch.
pub async fn fetch_batch(session: &SharedSession, uids: &[u32], width: usize) -> Vec<FetchOutcome> {
    let permits = Arc::new(Semaphore::new(width.max(1)));
    let mut handles = Vec::with_capacity(uids.len());

    for &uid in uids {
        let session = session.clone();
        let permits = permits.clone();
        let handle = tokio::spawn(async move {
            let _permit = permits.acquire_owned().await;
            match fetch_email(&session, uid).await {
                Ok(email) => FetchOutcome::Fetched(email),
                Err(e) => FetchOutcome::Failed {
                    uid,
                    reason: e.to_string(),
                },
            }
        });
        handles.push((uid, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (uid, handle) in handles {
        let outcome = handle.await.unwrap_or_else(|e| {
            tracing::error!("Fetch task for message {} panicked: {}", uid, e);
            FetchOutcome::Failed {
                uid,
                reason: e.to_string(),
            }
        });
        outcomes.push(outcome);
    }
    outcomes
}

/// Like [`fetch_batch`], keeping only the messages that were retrieved.
pub async fn fetch_all(session: &SharedSession, uids: &[u32], width: usize) -> Vec<Email> {
    fetch_batch(session, uids, width)
        .await
        .into_iter()
        .filter_map(|outcome| match outcome {
            FetchOutcome::Fetched(email) => Some(email),
            FetchOutcome::Failed { uid, reason } => {
                tracing::warn!("Skipping message {}: {}", uid, reason);
                None
            }
        })
        .collect()
}
