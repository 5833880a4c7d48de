//! One complete sync run: search, fetch and index, then export.
//!
//! Export starts only after the fetch has finished, so slow rendering never
//! holds up network reads and the other way round.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::export::naming::MAIL_CATEGORY;
use crate::export::Dispatcher;
use crate::index::MetadataIndex;
use crate::pipeline::{collect, spawn_fetch};
use crate::render::PdfRenderer;
use crate::source::{DateRange, IdSet, MessageSource};

/// Which half of the run a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetching,
    Processing,
}

/// End-of-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Identifiers the search returned.
    pub requested: usize,
    /// Mails received from the pipeline, failures included.
    pub fetched: usize,
    /// Mails that carried a parse error.
    pub failed: usize,
    /// Mails written to the index.
    pub indexed: usize,
    /// Index updates that failed to persist.
    pub index_errors: usize,
    /// Individual handler failures.
    pub handler_errors: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} requested, {} fetched, {} failed, {} indexed, {} index errors, {} handler errors",
            self.requested,
            self.fetched,
            self.failed,
            self.indexed,
            self.index_errors,
            self.handler_errors
        )
    }
}

/// Run a full sync of `range` from `source`.
///
/// Only a source failure or an unusable index aborts the run; everything
/// else is counted in the summary.
pub async fn sync(
    config: &Config,
    source: Arc<dyn MessageSource>,
    renderer: Arc<dyn PdfRenderer>,
    range: DateRange,
    progress: Option<&(dyn Fn(Phase, u64, u64) + Sync)>,
) -> Result<RunSummary> {
    let account = config.account.username.as_str();
    let root = config.general.output_dir.as_path();

    let described = source.describe();
    let vendor = config.account.vendor.clone().unwrap_or(described.vendor);
    let server = if config.account.server.is_empty() {
        described.server
    } else {
        config.account.server.clone()
    };
    let index = MetadataIndex::open(&root.join(MAIL_CATEGORY), account, &vendor, &server)?;

    let ids: IdSet = source.search(&range).await?.into_iter().collect();
    info!(
        count = ids.len(),
        since = %range.since,
        before = %range.before,
        "Fetching messages"
    );

    let on_fetch = |done: u64, total: u64| {
        if let Some(cb) = progress {
            cb(Phase::Fetching, done, total);
        }
    };
    let outcome = collect(spawn_fetch(source, ids), &index, Some(&on_fetch)).await?;

    let mut summary = RunSummary {
        requested: outcome.requested,
        fetched: outcome.mails.len(),
        failed: outcome.failed(),
        indexed: outcome.indexed,
        index_errors: outcome.index_errors,
        handler_errors: 0,
    };

    info!(count = outcome.mails.len(), "Processing messages");
    let dispatcher = Arc::new(Dispatcher::for_account(root, account, renderer));
    let shared_config = Arc::new(config.clone());
    let total = outcome.mails.len() as u64;
    for (i, mail) in outcome.mails.into_iter().enumerate() {
        let uid = mail.uid;
        let dispatcher = Arc::clone(&dispatcher);
        let handler_config = Arc::clone(&shared_config);
        // Handlers write files and wait on the renderer process.
        let task =
            tokio::task::spawn_blocking(move || dispatcher.dispatch(&handler_config, &mail));
        match task.await {
            Ok(report) => summary.handler_errors += report.failures.len(),
            Err(e) => {
                error!(uid, error = %e, "Export task failed");
                summary.handler_errors += 1;
            }
        }
        if let Some(cb) = progress {
            cb(Phase::Processing, i as u64 + 1, total);
        }
    }

    info!(%summary, "Done");
    Ok(summary)
}
