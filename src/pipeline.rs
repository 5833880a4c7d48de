//! Fetch pipeline: one producer task drives the source and parses each
//! message, one consumer loop indexes and buffers the results.
//!
//! The channel between them is unbounded, so a slow consumer never stalls
//! the source and a fast source never loses messages. Items arrive in the
//! source's delivery order.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{GrabError, ParseError, Result, SourceError};
use crate::index::MetadataIndex;
use crate::model::mail::Mail;
use crate::parser::parse_mail;
use crate::source::{IdSet, MessageSource};

/// Receiving end of a running fetch.
///
/// Yields exactly one [`Mail`] per requested identifier, then closes. A
/// fatal source failure is yielded once as `Err` and closes the stream early.
pub struct FetchHandle {
    receiver: UnboundedReceiver<Result<Mail>>,
    requested: usize,
    task: Option<JoinHandle<()>>,
}

impl FetchHandle {
    /// Number of identifiers requested.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Wait for the next mail. `None` once the fetch is complete.
    ///
    /// A producer that died without closing cleanly is reported as a source
    /// failure.
    pub async fn next(&mut self) -> Option<Result<Mail>> {
        if let Some(item) = self.receiver.recv().await {
            return Some(item);
        }
        let task = self.task.take()?;
        match task.await {
            Ok(()) => None,
            Err(e) => {
                error!(error = %e, "Fetch task failed");
                Some(Err(GrabError::Source(format!("fetch task failed: {e}"))))
            }
        }
    }
}

/// Start fetching `ids` from `source` on a background task.
pub fn spawn_fetch(source: Arc<dyn MessageSource>, ids: IdSet) -> FetchHandle {
    let (sender, receiver) = unbounded_channel();
    let requested = ids.len();
    let task = tokio::spawn(produce(source, ids, sender));
    FetchHandle {
        receiver,
        requested,
        task: Some(task),
    }
}

async fn produce(source: Arc<dyn MessageSource>, ids: IdSet, sender: UnboundedSender<Result<Mail>>) {
    if ids.is_empty() {
        return;
    }

    let mut stream = match source.fetch(&ids).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = %e, "Fetch could not be started");
            let _ = sender.send(Err(e));
            return;
        }
    };

    let mut pending = ids.clone();

    while let Some(item) = stream.next().await {
        let mail = match item {
            Ok(raw) => {
                if !accept(&ids, &mut pending, raw.uid) {
                    continue;
                }
                parse_mail(&raw)
            }
            Err(SourceError::Message { uid, reason }) => {
                if !accept(&ids, &mut pending, uid) {
                    continue;
                }
                Mail::failed(uid, ParseError::SourceRead { reason })
            }
            Err(SourceError::Connection(reason)) => {
                error!(reason = %reason, remaining = pending.len(), "Source connection lost");
                let _ = sender.send(Err(GrabError::Source(reason)));
                return;
            }
        };

        if sender.send(Ok(mail)).is_err() {
            debug!("Fetch consumer went away, stopping producer");
            return;
        }
    }

    for uid in pending {
        warn!(uid, "Source finished without delivering message");
        if sender
            .send(Ok(Mail::failed(uid, ParseError::NotDelivered)))
            .is_err()
        {
            return;
        }
    }
}

/// Claim `uid` from the pending set; duplicates and strays are rejected.
fn accept(requested: &IdSet, pending: &mut IdSet, uid: u32) -> bool {
    if pending.remove(&uid) {
        return true;
    }
    if requested.contains(&uid) {
        warn!(uid, "Dropping duplicate delivery");
    } else {
        warn!(uid, "Dropping message that was not requested");
    }
    false
}

/// Everything the fetch phase produced.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Every mail in delivery order, failures included.
    pub mails: Vec<Mail>,
    /// Number of identifiers requested.
    pub requested: usize,
    /// Mails written to the index.
    pub indexed: usize,
    /// Mails whose index update failed to persist.
    pub index_errors: usize,
}

impl FetchOutcome {
    /// Mails that carry a parse error.
    pub fn failed(&self) -> usize {
        self.mails.iter().filter(|m| !m.is_ok()).count()
    }
}

/// Drain a fetch: index every parsed mail and buffer all of them.
///
/// The progress callback receives `(received, requested)`. Returns the
/// fatal source error if the fetch was aborted.
///
/// Index writes run inline on this task. Each is one small file write under
/// the index lock, and the producer keeps reading on its own task while it
/// happens.
pub async fn collect(
    mut handle: FetchHandle,
    index: &MetadataIndex,
    progress: Option<&(dyn Fn(u64, u64) + Sync)>,
) -> Result<FetchOutcome> {
    let requested = handle.requested();
    let mut outcome = FetchOutcome {
        mails: Vec::with_capacity(requested),
        requested,
        ..FetchOutcome::default()
    };

    while let Some(event) = handle.next().await {
        let mail = event?;

        if mail.is_ok() {
            match index.upsert(&mail) {
                Ok(()) => outcome.indexed += 1,
                Err(e) => {
                    error!(uid = mail.uid, error = %e, "Failed to update metadata");
                    outcome.index_errors += 1;
                }
            }
        } else {
            warn!(uid = mail.uid, "{}", mail.error_text());
        }

        outcome.mails.push(mail);
        if let Some(cb) = progress {
            cb(outcome.mails.len() as u64, requested as u64);
        }
    }

    if outcome.mails.len() != requested {
        warn!(
            received = outcome.mails.len(),
            requested, "Fetch closed with a result count mismatch"
        );
    }

    Ok(outcome)
}
