//! Intake: turning raw messages and sender strings into pipeline input.
//!
//! Pure string/MIME parsing, no I/O. The inbox layer fetches messages; this
//! module only extracts who sent them and the readable body text.

use mail_parser::MessageParser;
use serde::{Deserialize, Serialize};

use crate::error::IntakeError;

/// A sender split into display name and normalized address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub display_name: Option<String>,
    /// Lowercased, trimmed address.
    pub address: String,
}

impl SenderIdentity {
    /// Parse `addr`, `Name <addr>` or `"Name" <addr>`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some((name, rest)) = raw.split_once('<')
            && let Some((addr, _)) = rest.split_once('>')
        {
            let name = name.trim().trim_matches('"').trim();
            return Self {
                display_name: (!name.is_empty()).then(|| name.to_string()),
                address: addr.trim().to_lowercase(),
            };
        }

        Self {
            display_name: None,
            address: raw.to_lowercase(),
        }
    }
}

impl std::fmt::Display for SenderIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// A request ready for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRequest {
    /// Sender address.
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Plain-text body with quoted replies removed.
    pub body: String,
}

impl InboundRequest {
    /// Build from a sender string (`addr` or `Name <addr>`) and plain body.
    pub fn new(sender: &str, subject: Option<String>, body: impl Into<String>) -> Self {
        let identity = SenderIdentity::parse(sender);
        Self {
            sender: identity.address,
            sender_name: identity.display_name,
            subject,
            body: body.into(),
        }
    }

    /// Sender identity in the form the pipeline accepts.
    pub fn sender_identity(&self) -> String {
        SenderIdentity {
            display_name: self.sender_name.clone(),
            address: self.sender.clone(),
        }
        .to_string()
    }
}

/// Parse a raw RFC 822 message.
pub fn parse_raw(raw: &[u8]) -> Result<InboundRequest, IntakeError> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or(IntakeError::Unparseable)?;

    let from = message
        .from()
        .and_then(|addr| addr.first())
        .ok_or(IntakeError::MissingSender)?;
    let sender = from
        .address()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .ok_or(IntakeError::MissingSender)?;
    let sender_name = from
        .name()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let body = if let Some(text) = message.body_text(0) {
        text.to_string()
    } else if let Some(html) = message.body_html(0) {
        strip_html(html.as_ref())
    } else {
        String::new()
    };

    Ok(InboundRequest {
        sender,
        sender_name,
        subject: message.subject().map(str::to_string),
        body: strip_quoted_text(&body),
    })
}

/// Drop tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove quoted reply text: `>` lines and everything after an
/// "On ... wrote:" attribution or an "Original Message" separator.
pub fn strip_quoted_text(body: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('>') {
            continue;
        }
        let attribution = trimmed.starts_with("On ") && trimmed.ends_with("wrote:");
        let separator = trimmed.starts_with("---") && trimmed.contains("Original Message");
        if attribution || separator {
            break;
        }
        kept.push(line);
    }

    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_plain_address() {
        let id = SenderIdentity::parse("  Buyer@Example.com ");
        assert_eq!(id.address, "buyer@example.com");
        assert_eq!(id.display_name, None);
    }

    #[test]
    fn sender_with_display_name() {
        let id = SenderIdentity::parse("John Doe <John@Example.com>");
        assert_eq!(id.address, "john@example.com");
        assert_eq!(id.display_name.as_deref(), Some("John Doe"));
        assert_eq!(id.to_string(), "John Doe <john@example.com>");
    }

    #[test]
    fn sender_with_quoted_name() {
        let id = SenderIdentity::parse("\"Doe, Jane\" <jane@x.io>");
        assert_eq!(id.display_name.as_deref(), Some("Doe, Jane"));
        assert_eq!(id.address, "jane@x.io");
    }

    #[test]
    fn sender_brackets_without_name() {
        let id = SenderIdentity::parse("<ops@x.io>");
        assert_eq!(id.display_name, None);
        assert_eq!(id.address, "ops@x.io");
    }

    #[test]
    fn inbound_request_identity_roundtrip() {
        let req = InboundRequest::new("Ann <ann@x.io>", None, "hi");
        assert_eq!(req.sender, "ann@x.io");
        assert_eq!(req.sender_identity(), "Ann <ann@x.io>");
    }

    #[test]
    fn parse_plain_message() {
        let raw = b"From: John Doe <john@acme.com>\r\n\
To: sales@vendor.com\r\n\
Subject: Security docs\r\n\
Content-Type: text/plain\r\n\
\r\n\
Hi team,\r\nPlease send your SOC 2 report.\r\n\r\nOn Mon, Jan 1, 2026 at 9:00 AM Sales <sales@vendor.com> wrote:\r\n> earlier\r\n";
        let req = parse_raw(raw).unwrap();
        assert_eq!(req.sender, "john@acme.com");
        assert_eq!(req.sender_name.as_deref(), Some("John Doe"));
        assert_eq!(req.subject.as_deref(), Some("Security docs"));
        assert!(req.body.contains("SOC 2 report"));
        assert!(!req.body.contains("earlier"));
    }

    #[test]
    fn parse_html_only_message() {
        let raw = b"From: ann@x.io\r\n\
Subject: Docs\r\n\
Content-Type: text/html\r\n\
\r\n\
<html><body><p>Need your <b>ISO 27001</b> certificate</p></body></html>\r\n";
        let req = parse_raw(raw).unwrap();
        assert!(req.body.contains("ISO 27001"));
        assert!(!req.body.contains('<'));
    }

    #[test]
    fn parse_without_sender_fails() {
        let raw = b"Subject: nobody\r\n\r\nbody\r\n";
        assert!(parse_raw(raw).is_err());
    }

    #[test]
    fn strip_html_separates_block_text() {
        assert_eq!(strip_html("<p>One</p><p>Two</p>"), "One Two");
        assert_eq!(strip_html("plain"), "plain");
    }

    #[test]
    fn strip_quoted_lines_and_separator() {
        let body = "Reply\n> quoted\nMore\n\n--- Original Message ---\nold";
        assert_eq!(strip_quoted_text(body), "Reply\nMore");
    }

    #[test]
    fn strip_quoted_empty() {
        assert_eq!(strip_quoted_text(""), "");
    }
}
