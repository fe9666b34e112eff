use chrono::{DateTime, Utc};

pub const SEEN_FLAG: &str = "\\Seen";
pub const DELETED_FLAG: &str = "\\Deleted";

/// A named attachment, in the order its MIME part was encountered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub body: Vec<u8>,
}

/// One retrieved message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Email {
    pub uid: u32,
    pub subject: String,
    /// Body of the first inline part only.
    pub content: Vec<u8>,
    pub from: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    pub size: Option<u32>,
    pub attachments: Vec<Attachment>,
    pub flags: Vec<String>,
}

impl Email {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }

    pub fn is_seen(&self) -> bool {
        self.has_flag(SEEN_FLAG)
    }

    pub fn content_text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Extra options for [`Client::send`](crate::Client::send).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOption {
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub is_html: bool,
}

impl SendOption {
    #[must_use]
    pub fn cc<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cc.extend(addrs.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn bcc<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bcc.extend(addrs.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn html(mut self, is_html: bool) -> Self {
        self.is_html = is_html;
        self
    }
}
