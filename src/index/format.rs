//! On-disk index document.
//!
//! One pretty-printed JSON file per account at `<root>/<account>/data.json`:
//!
//! ```text
//! {
//!   "email": "user@example.com",
//!   "list": [ { "uid": 1, "message_id": "...", ... }, ... ],
//!   "vendor": "mbox",
//!   "server": "/var/mail/INBOX"
//! }
//! ```
//!
//! Keys are written in declaration order so successive versions diff cleanly.

use crate::model::mail::MetadataRecord;

/// File name of the index document inside the account directory.
pub const INDEX_FILE_NAME: &str = "data.json";

/// Suffix of the temporary file written before the atomic rename.
pub const TEMP_SUFFIX: &str = ".tmp";

/// The complete index document for one account.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IndexDocument {
    /// Account address.
    pub email: String,
    /// Every successfully parsed message, in first-seen order.
    pub list: Vec<MetadataRecord>,
    /// Ingestion-source label.
    pub vendor: String,
    /// Server address of the source.
    pub server: String,
}

impl IndexDocument {
    pub fn new(email: &str, vendor: &str, server: &str) -> Self {
        Self {
            email: email.to_string(),
            list: Vec::new(),
            vendor: vendor.to_string(),
            server: server.to_string(),
        }
    }

    /// Replace the record with the same uid, or append.
    ///
    /// Returns `true` when an existing record was replaced.
    pub fn upsert(&mut self, record: MetadataRecord) -> bool {
        match self.list.iter_mut().find(|r| r.uid == record.uid) {
            Some(existing) => {
                *existing = record;
                true
            }
            None => {
                self.list.push(record);
                false
            }
        }
    }
}
