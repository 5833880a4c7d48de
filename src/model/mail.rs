//! Core mail record and its persisted projection.

use chrono::{DateTime, Utc};

use super::address::Address;
use super::attachment::Attachment;
use crate::error::ParseError;

/// One email message as extracted from the mailbox.
///
/// Exactly one of two states holds: `error` is set and the content fields
/// are not meaningful, or `error` is `None`, `from` is non-empty and
/// `body` / `attachments` describe the message.
#[derive(Debug, Clone)]
pub struct Mail {
    /// Mailbox-scoped identifier, the deduplication key.
    pub uid: u32,

    /// The `Message-ID` header value (informational).
    pub message_id: String,

    /// Decoded subject line.
    pub subject: String,

    /// Envelope date.
    pub date: DateTime<Utc>,

    /// Senders in header order.
    pub from: Vec<Address>,

    /// Raw content of each inline part, in order of appearance.
    pub body: Vec<Vec<u8>>,

    /// Attachments in order of appearance.
    pub attachments: Vec<Attachment>,

    /// Declared top-level content type, e.g. `multipart/alternative`.
    pub mime_type: String,

    /// Sniffed label for each non-empty entry of `body`.
    pub multipart_mime_type: Vec<String>,

    /// Sniffed label for each non-empty attachment.
    pub attachment_mime_type: Vec<String>,

    /// Set when the message could not be parsed.
    pub error: Option<ParseError>,
}

impl Mail {
    /// A mail carrying only an identifier, filled in by the parser.
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            message_id: String::new(),
            subject: String::new(),
            date: DateTime::UNIX_EPOCH,
            from: Vec::new(),
            body: Vec::new(),
            attachments: Vec::new(),
            mime_type: String::new(),
            multipart_mime_type: Vec::new(),
            attachment_mime_type: Vec::new(),
            error: None,
        }
    }

    /// A mail that failed before or during parsing.
    pub fn failed(uid: u32, error: ParseError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(uid)
        }
    }

    /// Whether parsing succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The first sender, which decides the output directory.
    pub fn sender(&self) -> Option<&Address> {
        self.from.first()
    }

    /// Multi-line description of a parse failure for the run log.
    pub fn error_text(&self) -> String {
        let error = self
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        format!(
            "Error: {error}\nSubject: {}\nFrom: {}\n",
            self.subject,
            self.date.to_rfc3339()
        )
    }
}

/// Persisted projection of a [`Mail`], one entry of the index `list`.
///
/// Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MetadataRecord {
    pub uid: u32,
    pub message_id: String,
    pub subject: String,
    pub from: Vec<String>,
    pub date: DateTime<Utc>,
    pub attachments: Vec<String>,
    pub mime_type: String,
    pub multipart_mime_type: Vec<String>,
    pub attachment_mime_type: Vec<String>,
}

impl From<&Mail> for MetadataRecord {
    fn from(mail: &Mail) -> Self {
        Self {
            uid: mail.uid,
            message_id: mail.message_id.clone(),
            subject: mail.subject.clone(),
            from: mail.from.iter().map(Address::display).collect(),
            date: mail.date,
            attachments: mail.attachments.iter().map(|a| a.filename.clone()).collect(),
            mime_type: mail.mime_type.clone(),
            multipart_mime_type: mail.multipart_mime_type.clone(),
            attachment_mime_type: mail.attachment_mime_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_projection() {
        let mut mail = Mail::new(7);
        mail.subject = "Quarterly report".to_string();
        mail.from = vec![
            Address::new("Alice", "alice@example.com"),
            Address::new("", "bob@example.org"),
        ];
        mail.attachments.push(Attachment {
            filename: "report.pdf".to_string(),
            body: b"%PDF-1.4".to_vec(),
            mimetype: "application/pdf".to_string(),
        });

        let record = MetadataRecord::from(&mail);
        assert_eq!(record.uid, 7);
        assert_eq!(
            record.from,
            vec!["Alice <alice@example.com>", "bob@example.org"]
        );
        assert_eq!(record.attachments, vec!["report.pdf"]);
    }

    #[test]
    fn test_record_key_order() {
        let record = MetadataRecord::from(&Mail::new(1));
        let json = serde_json::to_string(&record).unwrap();
        let uid = json.find("\"uid\"").unwrap();
        let subject = json.find("\"subject\"").unwrap();
        let attachment_types = json.find("\"attachment_mime_type\"").unwrap();
        assert!(uid < subject && subject < attachment_types);
    }

    #[test]
    fn test_error_text() {
        let mut mail = Mail::failed(3, ParseError::MissingBody);
        mail.subject = "Hello".to_string();
        let text = mail.error_text();
        assert!(text.starts_with("Error: no body section available\n"));
        assert!(text.contains("Subject: Hello\n"));
        assert!(!mail.is_ok());
    }
}
