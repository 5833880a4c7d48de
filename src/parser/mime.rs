//! MIME message parsing: turn one raw message into a [`Mail`].

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::debug;

use crate::error::ParseError;
use crate::model::attachment::Attachment;
use crate::model::mail::Mail;
use crate::parser::envelope::declared_type;
use crate::sniff::sniff;
use crate::source::{BodySection, RawMessage};

/// Replacement for path separators in attachment filenames.
const SEPARATOR_REPLACEMENT: char = '-';

/// Parse a fetched message into a [`Mail`].
///
/// Never panics. On failure the returned mail keeps its envelope metadata,
/// has empty content, and carries the reason in [`Mail::error`].
pub fn parse_mail(raw: &RawMessage) -> Mail {
    let mut mail = Mail::new(raw.uid);
    mail.message_id = raw.envelope.message_id.clone();
    mail.subject = raw.envelope.subject.clone();
    mail.from = raw.envelope.from.clone();
    mail.date = raw.envelope.date;

    let Some(bytes) = raw.body(BodySection::Full) else {
        mail.error = Some(ParseError::MissingBody);
        return mail;
    };

    let Some(message) = MessageParser::default().parse(bytes) else {
        mail.error = Some(ParseError::Unparseable);
        return mail;
    };

    mail.mime_type = raw
        .envelope
        .mime_type
        .clone()
        .unwrap_or_else(|| declared_type(message.root_part()));

    if mail.from.is_empty() {
        mail.error = Some(ParseError::MissingSender);
        return mail;
    }

    match read_parts(raw.uid, &message) {
        Ok((body, attachments)) => {
            mail.body = body;
            mail.attachments = attachments;
        }
        Err(e) => {
            mail.error = Some(e);
            return mail;
        }
    }

    mail.multipart_mime_type = mail
        .body
        .iter()
        .filter(|b| !b.is_empty())
        .map(|b| sniff(b).mime)
        .collect();

    mail.attachment_mime_type = mail
        .attachments
        .iter()
        .filter(|a| !a.body.is_empty())
        .map(|a| a.mimetype.clone())
        .collect();

    mail
}

/// Walk the flattened part list, splitting inline content from attachments.
///
/// Multipart containers are skipped; nested `message/rfc822` parts count as
/// one leaf. A damaged inline part is dropped, a damaged attachment fails
/// the whole message.
fn read_parts(
    uid: u32,
    message: &Message<'_>,
) -> Result<(Vec<Vec<u8>>, Vec<Attachment>), ParseError> {
    let mut bodies = Vec::new();
    let mut attachments: Vec<Attachment> = Vec::new();
    let mut unnamed = 0usize;

    for (index, part) in message.parts.iter().enumerate() {
        if matches!(part.body, PartType::Multipart(_)) {
            continue;
        }

        if !is_attachment(part) {
            if part.is_encoding_problem {
                debug!(uid, part = index, "Skipping truncated inline part");
                continue;
            }
            bodies.push(part.contents().to_vec());
            continue;
        }

        if part.is_encoding_problem {
            return Err(ParseError::UnreadablePart {
                ordinal: attachments.len() + 1,
            });
        }

        let body = part.contents().to_vec();
        let sniffed = sniff(&body);

        let filename = match part.attachment_name().map(sanitize_filename) {
            Some(name) if is_usable_filename(&name) => name,
            _ => {
                unnamed += 1;
                sanitize_filename(&format!("{uid}-{unnamed}{}", sniffed.extension))
            }
        };

        attachments.push(Attachment {
            filename,
            body,
            mimetype: sniffed.mime,
        });
    }

    Ok((bodies, attachments))
}

/// Whether the part is an attachment rather than inline content.
///
/// An explicit disposition decides. Without one, only `text/*` parts are
/// inline.
fn is_attachment(part: &MessagePart<'_>) -> bool {
    match part.content_disposition().map(|d| d.ctype()) {
        Some(d) if d.eq_ignore_ascii_case("attachment") => true,
        Some(d) if d.eq_ignore_ascii_case("inline") => false,
        _ => !declared_type(part).starts_with("text/"),
    }
}

/// Make an attachment filename safe to join onto an output directory.
///
/// Path separators become `-` and undecodable characters (U+FFFD) are dropped.
pub fn sanitize_filename(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .map(|c| match c {
            '/' | '\\' => SEPARATOR_REPLACEMENT,
            c => c,
        })
        .collect()
}

/// Empty names and `.` / `..` cannot be written as files.
fn is_usable_filename(name: &str) -> bool {
    !name.trim_matches('.').is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::Address;
    use crate::source::Envelope;

    fn raw(uid: u32, message: &str) -> RawMessage {
        let envelope = Envelope {
            from: vec![Address::new("", "sender@example.com")],
            ..Envelope::default()
        };
        RawMessage::new(uid, envelope).with_section(BodySection::Full, message.as_bytes().to_vec())
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "..-..-etc-passwd");
        assert_eq!(sanitize_filename("a\\b.txt"), "a-b.txt");
        assert_eq!(sanitize_filename("ok\u{FFFD}.pdf"), "ok.pdf");
        assert_eq!(sanitize_filename("  report.pdf "), "report.pdf");
    }

    #[test]
    fn test_usable_filename() {
        assert!(is_usable_filename("a.pdf"));
        assert!(!is_usable_filename(""));
        assert!(!is_usable_filename(".."));
    }

    #[test]
    fn test_single_part_plain_text() {
        let mail = parse_mail(&raw(
            1,
            "From: sender@example.com\r\nContent-Type: text/plain\r\n\r\nHello there\r\n",
        ));
        assert!(mail.is_ok());
        assert_eq!(mail.mime_type, "text/plain");
        assert_eq!(mail.body.len(), 1);
        assert!(mail.attachments.is_empty());
        assert_eq!(mail.multipart_mime_type, vec!["text/plain; charset=utf-8"]);
    }

    #[test]
    fn test_missing_body_section() {
        let envelope = Envelope {
            subject: "No body".to_string(),
            from: vec![Address::new("", "a@b.com")],
            ..Envelope::default()
        };
        let mail = parse_mail(&RawMessage::new(4, envelope));
        assert_eq!(mail.error, Some(ParseError::MissingBody));
        assert_eq!(mail.subject, "No body");
        assert!(mail.body.is_empty());
    }

    #[test]
    fn test_missing_sender() {
        let message = RawMessage::new(5, Envelope::default())
            .with_section(BodySection::Full, b"Subject: x\r\n\r\nbody\r\n".to_vec());
        let mail = parse_mail(&message);
        assert_eq!(mail.error, Some(ParseError::MissingSender));
    }

    #[test]
    fn test_unnamed_attachments_get_ordinals() {
        let message = "From: sender@example.com\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain\r\n\
\r\n\
See attached.\r\n\
--XX\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment\r\n\
\r\n\
%PDF-1.4 first\r\n\
--XX\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment; filename=\"named.bin\"\r\n\
\r\n\
payload\r\n\
--XX\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment\r\n\
\r\n\
%PDF-1.4 second\r\n\
--XX--\r\n";
        let mail = parse_mail(&raw(42, message));
        assert!(mail.is_ok());
        assert_eq!(mail.mime_type, "multipart/mixed");
        assert_eq!(mail.body.len(), 1);
        let names: Vec<&str> = mail.attachments.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["42-1.pdf", "named.bin", "42-2.pdf"]);
        assert_eq!(mail.attachments[0].mimetype, "application/pdf");
        assert_eq!(mail.attachment_mime_type.len(), 3);
    }

    #[test]
    fn test_part_kind_follows_disposition_then_type() {
        let message = "From: sender@example.com\r\n\
Content-Type: multipart/mixed; boundary=\"KK\"\r\n\
\r\n\
--KK\r\n\
Content-Type: text/plain\r\n\
\r\n\
Invoice attached.\r\n\
--KK\r\n\
Content-Type: application/pdf; name=\"invoice.pdf\"\r\n\
\r\n\
%PDF-1.4 invoice\r\n\
--KK\r\n\
Content-Type: text/html\r\n\
\r\n\
<html><body>Invoice</body></html>\r\n\
--KK\r\n\
Content-Type: image/png\r\n\
Content-Disposition: inline\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw0KGgo=\r\n\
--KK--\r\n";
        let mail = parse_mail(&raw(8, message));
        assert!(mail.is_ok());

        assert_eq!(mail.attachments.len(), 1);
        assert_eq!(mail.attachments[0].filename, "invoice.pdf");
        assert_eq!(mail.attachments[0].mimetype, "application/pdf");

        assert_eq!(mail.body.len(), 3);
        assert_eq!(
            mail.multipart_mime_type,
            vec![
                "text/plain; charset=utf-8",
                "text/html; charset=utf-8",
                "image/png"
            ]
        );
    }

    #[test]
    fn test_single_part_binary_message_is_an_attachment() {
        let message = "From: sender@example.com\r\n\
Content-Type: application/pdf; name=\"scan.pdf\"\r\n\
\r\n\
%PDF-1.4 scan\r\n";
        let mail = parse_mail(&raw(3, message));
        assert!(mail.is_ok());
        assert_eq!(mail.mime_type, "application/pdf");
        assert!(mail.body.is_empty());
        assert_eq!(mail.attachments.len(), 1);
        assert_eq!(mail.attachments[0].filename, "scan.pdf");
    }

    #[test]
    fn test_truncated_inline_part_is_dropped() {
        let message = "From: sender@example.com\r\n\
Content-Type: multipart/mixed; boundary=\"TT\"\r\n\
\r\n\
--TT\r\n\
Content-Type: text/plain\r\n\
\r\n\
first\r\n\
--TT\r\n\
Content-Type: text/plain\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
c2Vjb25kIHBhcnQgdGhhdCBuZXZlciBlbm";
        let mail = parse_mail(&raw(11, message));
        assert_eq!(mail.error, None);
        assert_eq!(mail.body.len(), 1);
        assert!(mail.body[0].starts_with(b"first"));
        assert!(mail.attachments.is_empty());
    }

    #[test]
    fn test_damaged_attachment_fails_mail() {
        let message = "From: sender@example.com\r\n\
Content-Type: multipart/mixed; boundary=\"TT\"\r\n\
\r\n\
--TT\r\n\
Content-Type: text/plain\r\n\
\r\n\
first\r\n\
--TT\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"broken.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0x!!!***";
        let mail = parse_mail(&raw(12, message));
        assert_eq!(mail.error, Some(ParseError::UnreadablePart { ordinal: 1 }));
        assert!(!mail.is_ok());
    }
}
