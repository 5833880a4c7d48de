//! Message sources: where raw messages come from.
//!
//! A source resolves a date range to identifiers and then streams the raw
//! messages for a set of identifiers. Delivery order is the source's own and
//! need not follow identifier order.

pub mod mbox;
pub mod memory;

use std::collections::{BTreeSet, HashMap};
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::Stream;

use crate::error::{Result, SourceError};
use crate::model::address::Address;

/// Stream of fetched messages. Per-message failures arrive as `Err` items.
pub type RawMessageStream =
    Pin<Box<dyn Stream<Item = std::result::Result<RawMessage, SourceError>> + Send>>;

/// Ordered, duplicate-free set of message identifiers.
pub type IdSet = BTreeSet<u32>;

/// Calendar-day search window: `since` inclusive, `before` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub since: NaiveDate,
    pub before: NaiveDate,
}

impl DateRange {
    pub fn new(since: NaiveDate, before: NaiveDate) -> Self {
        Self { since, before }
    }

    /// Whether `date` falls on a day inside the window.
    pub fn contains(&self, date: &DateTime<Utc>) -> bool {
        let day = date.date_naive();
        day >= self.since && day < self.before
    }
}

/// Which part of a message a body read refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodySection {
    /// The whole message, headers and body (`BODY[]`).
    Full,
}

/// Envelope metadata delivered alongside a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub message_id: String,
    pub subject: String,
    pub from: Vec<Address>,
    pub date: DateTime<Utc>,
    /// Top-level `type/subtype` when the source knows the structure.
    pub mime_type: Option<String>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            message_id: String::new(),
            subject: String::new(),
            from: Vec::new(),
            date: DateTime::UNIX_EPOCH,
            mime_type: None,
        }
    }
}

/// One message as delivered by a source.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub uid: u32,
    pub envelope: Envelope,
    sections: HashMap<BodySection, Vec<u8>>,
}

impl RawMessage {
    pub fn new(uid: u32, envelope: Envelope) -> Self {
        Self {
            uid,
            envelope,
            sections: HashMap::new(),
        }
    }

    /// Attach the bytes of one body section.
    pub fn with_section(mut self, section: BodySection, bytes: Vec<u8>) -> Self {
        self.sections.insert(section, bytes);
        self
    }

    /// Read a previously fetched section, `None` if it was not delivered.
    pub fn body(&self, section: BodySection) -> Option<&[u8]> {
        self.sections.get(&section).map(Vec::as_slice)
    }
}

/// Labels describing a source, recorded in the index document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Ingestion-source label, e.g. `"mbox"`.
    pub vendor: String,
    /// Server address or file location.
    pub server: String,
}

/// A mailbox that can be searched and fetched from.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Vendor and server labels.
    fn describe(&self) -> SourceInfo;

    /// Identifiers of messages dated inside `range`.
    async fn search(&self, range: &DateRange) -> Result<Vec<u32>>;

    /// Start delivering the messages in `ids`.
    ///
    /// An `Err` here means the source could not be reached at all.
    async fn fetch(&self, ids: &IdSet) -> Result<RawMessageStream>;
}
