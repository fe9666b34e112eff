//! Reduces a raw RFC 822 message to its first inline body and its named
//! attachments.
//!
//! Decoding is forgiving: a part that cannot be decoded is logged and
//! skipped, and a message that cannot be parsed at all yields an empty
//! body. Nothing here ever fails the fetch of a message.

use crate::email::Attachment;
use mailparse::{DispositionType, MailHeaderMap, ParsedContentDisposition, ParsedMail};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBody {
    pub content: Vec<u8>,
    pub attachments: Vec<Attachment>,
}

pub fn parse_message(raw: &[u8]) -> ParsedBody {
    let mut parsed = ParsedBody::default();
    match mailparse::parse_mail(raw) {
        Ok(mail) => walk_parts(&mail, &mut parsed),
        Err(e) => warn!("Unparseable message, keeping empty body: {}", e),
    }
    parsed
}

/// Depth-first over leaf parts, in encounter order.
fn walk_parts(part: &ParsedMail<'_>, out: &mut ParsedBody) {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            walk_parts(sub, out);
        }
        return;
    }

    let disposition = part.get_content_disposition();
    if is_attachment(part, &disposition) {
        let Some(name) = attachment_name(part, &disposition) else {
            debug!("Skipping {} attachment without a filename", part.ctype.mimetype);
            return;
        };
        match part.get_body_raw() {
            Ok(body) => out.attachments.push(Attachment { name, body }),
            Err(e) => debug!("Skipping attachment {}: {}", name, e),
        }
    } else if out.content.is_empty() {
        match inline_body(part) {
            Ok(body) => out.content = body,
            Err(e) => debug!("Skipping undecodable inline part: {}", e),
        }
    }
}

/// Explicit `attachment` always wins and explicit `inline` always stays
/// inline. Without a usable disposition only text parts are inline.
fn is_attachment(part: &ParsedMail<'_>, disposition: &ParsedContentDisposition) -> bool {
    let explicit = part
        .headers
        .get_first_header("Content-Disposition")
        .is_some();
    match disposition.disposition {
        DispositionType::Attachment => true,
        DispositionType::Inline if explicit => false,
        _ => !part.ctype.mimetype.starts_with("text/"),
    }
}

fn attachment_name(part: &ParsedMail<'_>, disposition: &ParsedContentDisposition) -> Option<String> {
    disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Text parts are charset-decoded to UTF-8; anything else is returned
/// transfer-decoded only.
fn inline_body(part: &ParsedMail<'_>) -> Result<Vec<u8>, mailparse::MailParseError> {
    if part.ctype.mimetype.starts_with("text/") {
        part.get_body().map(String::into_bytes)
    } else {
        part.get_body_raw()
    }
}
