use crate::email::SendOption;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lettre::message::Mailbox;

const BASE64_LINE_LEN: usize = 76;

/// Renders `addr` as `"Name" <user@host>` or `<user@host>`. Addresses
/// that do not parse are passed through untouched.
pub fn format_address(addr: &str) -> String {
    let Ok(mailbox) = addr.parse::<Mailbox>() else {
        return addr.to_string();
    };
    match mailbox.name.as_deref().filter(|name| !name.is_empty()) {
        None => format!("<{}>", mailbox.email),
        Some(name) if is_printable_ascii(name) => {
            format!("{} <{}>", quote(name), mailbox.email)
        }
        Some(name) => format!("{} <{}>", encode_display_name(name), mailbox.email),
    }
}

/// Characters that may not appear inside a `Q` encoded word in a phrase.
const PHRASE_SPECIALS: &str = "\"#$%&'(),.:;<>@[]^`{|}~";

/// Non-ASCII display names become a `Q` encoded word, or a `B` one when the
/// name carries phrase specials.
fn encode_display_name(name: &str) -> String {
    if name.chars().any(|c| PHRASE_SPECIALS.contains(c)) {
        encode_word(name)
    } else {
        q_encode_word(name)
    }
}

/// RFC 2047 `Q` encoded word.
fn q_encode_word(s: &str) -> String {
    let mut out = String::from("=?utf-8?q?");
    for b in s.bytes() {
        match b {
            b' ' => out.push('_'),
            b'=' | b'?' | b'_' => out.push_str(&format!("={b:02X}")),
            b'!'..=b'~' => out.push(char::from(b)),
            _ => out.push_str(&format!("={b:02X}")),
        }
    }
    out.push_str("?=");
    out
}

pub fn format_addresses(addrs: &[String]) -> String {
    addrs
        .iter()
        .map(|addr| format_address(addr))
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| b == b' ' || b == b'\t' || b.is_ascii_graphic())
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// RFC 2047 `B` encoded word.
fn encode_word(s: &str) -> String {
    format!("=?utf-8?b?{}?=", STANDARD.encode(s))
}

fn encode_subject(subject: &str) -> String {
    if is_printable_ascii(subject) {
        subject.to_string()
    } else {
        encode_word(subject)
    }
}

/// Header fields in wire order.
pub fn compose_headers(
    from: &str,
    to: &[String],
    subject: &str,
    opt: &SendOption,
) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("From", format_address(from)),
        ("To", format_addresses(to)),
    ];
    if !opt.cc.is_empty() {
        headers.push(("Cc", format_addresses(&opt.cc)));
    }
    headers.push(("Subject", encode_subject(subject)));
    headers.push(("MIME-Version", "1.0".to_string()));
    let content_type = if opt.is_html {
        "text/html; charset=\"utf-8\""
    } else {
        "text/plain; charset=\"utf-8\""
    };
    headers.push(("Content-Type", content_type.to_string()));
    headers.push(("Content-Transfer-Encoding", "base64".to_string()));
    headers
}

/// Builds the complete single-part wire message: header block, blank line,
/// base64 body wrapped at 76 columns.
pub fn compose_message(
    from: &str,
    to: &[String],
    subject: &str,
    body: &[u8],
    opt: &SendOption,
) -> Vec<u8> {
    let mut message = String::new();
    for (name, value) in compose_headers(from, to, subject, opt) {
        message.push_str(name);
        message.push_str(": ");
        message.push_str(&value);
        message.push_str("\r\n");
    }
    message.push_str("\r\n");

    let encoded = STANDARD.encode(body);
    // base64 output is ASCII, so byte chunks are valid str slices
    for line in encoded.as_bytes().chunks(BASE64_LINE_LEN) {
        message.push_str(&String::from_utf8_lossy(line));
        message.push_str("\r\n");
    }

    message.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_message(msg: &[u8]) -> (String, String) {
        let text = String::from_utf8(msg.to_vec()).unwrap();
        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        (head.to_string(), body.to_string())
    }

    #[test]
    fn bare_address_gets_angle_brackets() {
        assert_eq!(format_address("test@example.com"), "<test@example.com>");
    }

    #[test]
    fn display_names_are_quoted_or_encoded() {
        assert_eq!(
            format_address("John Doe <john@example.com>"),
            "\"John Doe\" <john@example.com>"
        );
        assert_eq!(quote("Say \"hi\""), "\"Say \\\"hi\\\"\"");
        assert_eq!(encode_word("Zoë"), "=?utf-8?b?Wm/Dqw==?=");
        assert_eq!(format_address("not an address"), "not an address");
    }

    #[test]
    fn non_ascii_names_use_q_words_unless_specials_appear() {
        assert_eq!(encode_display_name("Zoë Ré"), "=?utf-8?q?Zo=C3=AB_R=C3=A9?=");
        assert_eq!(q_encode_word("a=b?c_d"), "=?utf-8?q?a=3Db=3Fc=5Fd?=");
        assert_eq!(
            encode_display_name("Zoë, Inc."),
            format!("=?utf-8?b?{}?=", STANDARD.encode("Zoë, Inc."))
        );
    }

    #[test]
    fn headers_are_in_a_stable_order() {
        let opt = SendOption::default().cc(["c@example.com"]);
        let to = vec!["a@example.com".to_string(), "b@example.com".to_string()];
        let names: Vec<_> = compose_headers("me@example.com", &to, "hi", &opt)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            [
                "From",
                "To",
                "Cc",
                "Subject",
                "MIME-Version",
                "Content-Type",
                "Content-Transfer-Encoding"
            ]
        );
    }

    #[test]
    fn cc_is_omitted_when_empty_and_bcc_never_appears() {
        let opt = SendOption::default().bcc(["hidden@example.com"]).html(true);
        let msg = compose_message(
            "me@example.com",
            &["a@example.com".to_string()],
            "hi",
            b"<b>x</b>",
            &opt,
        );
        let (head, _) = split_message(&msg);
        assert_eq!(
            head,
            "From: <me@example.com>\r\n\
             To: <a@example.com>\r\n\
             Subject: hi\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/html; charset=\"utf-8\"\r\n\
             Content-Transfer-Encoding: base64"
        );
        assert!(!head.contains("hidden@example.com"));
    }

    #[test]
    fn body_survives_base64_round_trip() {
        let body: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let msg = compose_message(
            "me@example.com",
            &["a@example.com".to_string()],
            "binary",
            &body,
            &SendOption::default(),
        );
        let (_, payload) = split_message(&msg);
        assert!(payload.lines().all(|line| line.len() <= BASE64_LINE_LEN));
        let joined: String = payload.split("\r\n").collect();
        assert_eq!(STANDARD.decode(joined).unwrap(), body);
    }

    #[test]
    fn non_ascii_subject_is_encoded() {
        let headers = compose_headers(
            "me@example.com",
            &["a@example.com".to_string()],
            "héllo",
            &SendOption::default(),
        );
        let subject = &headers.iter().find(|(n, _)| *n == "Subject").unwrap().1;
        assert_eq!(subject, &format!("=?utf-8?b?{}?=", STANDARD.encode("héllo")));
    }
}
