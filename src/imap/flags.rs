use super::session::MailboxSession;
use crate::error::Result;

const ADD_DELETED: &str = "+FLAGS.SILENT (\\Deleted)";
const ADD_SEEN: &str = "+FLAGS.SILENT (\\Seen)";
const REMOVE_SEEN: &str = "-FLAGS.SILENT (\\Seen)";

/// Compact sequence set for `uids`: sorted, deduplicated, with consecutive
/// runs collapsed to `a:b`.
pub fn uid_set(uids: &[u32]) -> String {
    let mut sorted = uids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges: Vec<String> = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(mut start) = iter.next() else {
        return String::new();
    };
    let mut end = start;
    for uid in iter {
        if end.checked_add(1) == Some(uid) {
            end = uid;
            continue;
        }
        ranges.push(render_range(start, end));
        start = uid;
        end = uid;
    }
    ranges.push(render_range(start, end));
    ranges.join(",")
}

fn render_range(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}:{end}")
    }
}

/// Flags `uids` as deleted in one STORE. Does not expunge.
pub async fn delete(session: &mut dyn MailboxSession, uids: &[u32]) -> Result<()> {
    if uids.is_empty() {
        return Ok(());
    }
    session.uid_store(&uid_set(uids), ADD_DELETED).await
}

pub async fn mark_read(session: &mut dyn MailboxSession, uids: &[u32]) -> Result<()> {
    store_then_expunge(session, uids, ADD_SEEN).await
}

pub async fn mark_unread(session: &mut dyn MailboxSession, uids: &[u32]) -> Result<()> {
    store_then_expunge(session, uids, REMOVE_SEEN).await
}

async fn store_then_expunge(
    session: &mut dyn MailboxSession,
    uids: &[u32],
    query: &str,
) -> Result<()> {
    if uids.is_empty() {
        return Ok(());
    }
    session.uid_store(&uid_set(uids), query).await?;
    session.expunge().await
}
