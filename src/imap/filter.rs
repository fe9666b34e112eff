use chrono::{DateTime, Utc};

pub const DEFAULT_MAILBOX: &str = "INBOX";

/// Query for one retrieval call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Upper bound on returned messages; 0 means unbounded.
    pub limit: usize,
    /// Include already-read messages. Ignored by the realtime poller.
    pub all: bool,
    pub mark_read: bool,
    pub sort_desc: bool,
    pub mailbox: String,
    pub since: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            limit: 0,
            all: false,
            mark_read: false,
            sort_desc: false,
            mailbox: DEFAULT_MAILBOX.to_string(),
            since: None,
            before: None,
        }
    }
}

impl Filter {
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    #[must_use]
    pub fn mark_read(mut self, mark_read: bool) -> Self {
        self.mark_read = mark_read;
        self
    }

    #[must_use]
    pub fn sort_desc(mut self, sort_desc: bool) -> Self {
        self.sort_desc = sort_desc;
        self
    }

    #[must_use]
    pub fn mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = mailbox.into();
        self
    }

    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    /// IMAP SEARCH criteria for this filter.
    pub fn search_query(&self) -> String {
        let mut criteria = vec![if self.all { "ALL" } else { "UNSEEN" }.to_string()];
        if let Some(since) = self.since {
            criteria.push(format!("SINCE {}", imap_date(since)));
        }
        if let Some(before) = self.before {
            criteria.push(format!("BEFORE {}", imap_date(before)));
        }
        criteria.join(" ")
    }

    /// Applies `limit` to ascending search results. With `sort_desc` the
    /// newest `limit` UIDs are kept, newest first; otherwise the oldest
    /// `limit` in ascending order.
    pub fn select_uids(&self, mut uids: Vec<u32>) -> Vec<u32> {
        if self.limit == 0 || uids.len() <= self.limit {
            return uids;
        }
        if self.sort_desc {
            let mut tail = uids.split_off(uids.len() - self.limit);
            tail.sort_unstable_by(|a, b| b.cmp(a));
            tail
        } else {
            uids.truncate(self.limit);
            uids
        }
    }
}

fn imap_date(at: DateTime<Utc>) -> String {
    at.format("%-d-%b-%Y").to_string()
}
