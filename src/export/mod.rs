//! Export handlers and the dispatcher that runs them for each mail.
//!
//! The handler set is closed: attachments, PDF, text, always in that order.
//! Each handler owns its filter and output paths, and a failure in one
//! never keeps the others from running.

pub mod attachment;
pub mod naming;
pub mod pdf;
pub mod text;

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::config::Config;
use crate::error::Result;
use crate::model::mail::Mail;
use crate::render::PdfRenderer;

pub use attachment::AttachmentExport;
pub use pdf::PdfExport;
pub use text::TextExport;

/// One export step.
#[derive(Debug, Clone)]
pub enum Handler {
    Attachment(AttachmentExport),
    Pdf(PdfExport),
    Text(TextExport),
}

impl Handler {
    /// Short name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Attachment(_) => "attachment",
            Self::Pdf(_) => "pdf",
            Self::Text(_) => "text",
        }
    }

    pub fn handle(&self, config: &Config, mail: &Mail) -> Result<()> {
        match self {
            Self::Attachment(h) => h.handle(config, mail),
            Self::Pdf(h) => h.handle(config, mail),
            Self::Text(h) => h.handle(config, mail),
        }
    }
}

/// What happened when one mail went through the dispatcher.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// The mail carried a parse error and no handler ran.
    pub skipped: bool,
    /// `(handler, error)` for each handler that failed.
    pub failures: Vec<(&'static str, String)>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        !self.skipped && self.failures.is_empty()
    }
}

/// Ordered list of handlers applied to every parsed mail.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    handlers: Vec<Handler>,
}

impl Dispatcher {
    pub fn new(handlers: Vec<Handler>) -> Self {
        Self { handlers }
    }

    /// The standard handler chain for one account, writing under `root`.
    pub fn for_account(root: &Path, account: &str, renderer: Arc<dyn PdfRenderer>) -> Self {
        Self::new(vec![
            Handler::Attachment(AttachmentExport::new(root, account)),
            Handler::Pdf(PdfExport::new(root, account, renderer)),
            Handler::Text(TextExport::new(root, account)),
        ])
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Run every handler on `mail`, in order, collecting failures.
    ///
    /// A mail with a parse error is only logged.
    pub fn dispatch(&self, config: &Config, mail: &Mail) -> DispatchReport {
        let mut report = DispatchReport::default();

        if !mail.is_ok() {
            warn!(uid = mail.uid, "{}", mail.error_text());
            report.skipped = true;
            return report;
        }

        for handler in &self.handlers {
            if let Err(e) = handler.handle(config, mail) {
                warn!(
                    uid = mail.uid,
                    handler = handler.name(),
                    error = %e,
                    "Handler failed"
                );
                report.failures.push((handler.name(), e.to_string()));
            }
        }

        report
    }
}
