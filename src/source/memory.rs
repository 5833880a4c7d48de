//! In-memory mailbox, for tests and for embedding callers that already hold messages.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream;

use super::{DateRange, IdSet, MessageSource, RawMessage, RawMessageStream, SourceInfo};
use crate::error::{GrabError, Result, SourceError};

/// A mailbox backed by a list of messages.
///
/// Messages are delivered in insertion order, which may differ from
/// identifier order.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    messages: Vec<RawMessage>,
    failures: HashMap<u32, String>,
    unreachable: Option<String>,
    drop_after: Option<usize>,
}

impl MemorySource {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Report a read failure for `uid` instead of delivering it.
    pub fn with_failure(mut self, uid: u32, reason: impl Into<String>) -> Self {
        self.failures.insert(uid, reason.into());
        self
    }

    /// Make every search and fetch fail as if the server were down.
    pub fn unreachable(mut self, reason: impl Into<String>) -> Self {
        self.unreachable = Some(reason.into());
        self
    }

    /// Lose the connection after delivering `count` messages.
    pub fn drop_connection_after(mut self, count: usize) -> Self {
        self.drop_after = Some(count);
        self
    }

    fn check_reachable(&self) -> Result<()> {
        match &self.unreachable {
            Some(reason) => Err(GrabError::Source(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    fn describe(&self) -> SourceInfo {
        SourceInfo {
            vendor: "memory".to_string(),
            server: "localhost".to_string(),
        }
    }

    async fn search(&self, range: &DateRange) -> Result<Vec<u32>> {
        self.check_reachable()?;
        let mut uids: Vec<u32> = self
            .messages
            .iter()
            .filter(|m| range.contains(&m.envelope.date))
            .map(|m| m.uid)
            .collect();
        uids.sort_unstable();
        uids.dedup();
        Ok(uids)
    }

    async fn fetch(&self, ids: &IdSet) -> Result<RawMessageStream> {
        self.check_reachable()?;

        let mut items: Vec<std::result::Result<RawMessage, SourceError>> = self
            .messages
            .iter()
            .filter(|m| ids.contains(&m.uid))
            .map(|m| match self.failures.get(&m.uid) {
                Some(reason) => Err(SourceError::Message {
                    uid: m.uid,
                    reason: reason.clone(),
                }),
                None => Ok(m.clone()),
            })
            .collect();

        if let Some(count) = self.drop_after {
            items.truncate(count);
            items.push(Err(SourceError::Connection("connection reset".to_string())));
        }

        Ok(Box::pin(stream::iter(items)))
    }
}
