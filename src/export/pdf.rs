//! Render the HTML bodies of matching mails into a PDF.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::naming::{mail_directory, mail_file_stem, MAIL_CATEGORY};
use crate::config::Config;
use crate::error::{GrabError, Result};
use crate::model::mail::Mail;
use crate::render::PdfRenderer;
use crate::sniff::sniff;

/// Writes `<root>/mail/<account>/<YYYYMM>/<sender_host>/<subject>-<date>-<uid>.pdf`
/// for mails whose subject matches `mails.subjects`.
#[derive(Clone)]
pub struct PdfExport {
    root: PathBuf,
    account: String,
    renderer: Arc<dyn PdfRenderer>,
}

impl std::fmt::Debug for PdfExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfExport")
            .field("root", &self.root)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

impl PdfExport {
    pub fn new(
        root: impl Into<PathBuf>,
        account: impl Into<String>,
        renderer: Arc<dyn PdfRenderer>,
    ) -> Self {
        Self {
            root: root.into(),
            account: account.into(),
            renderer,
        }
    }

    /// Render all HTML inline bodies of `mail` into one document.
    ///
    /// A mail without HTML content produces no file and no error.
    pub fn handle(&self, config: &Config, mail: &Mail) -> Result<()> {
        if !config.mails.filter().matches(&mail.subject) {
            return Ok(());
        }

        let pages: Vec<&[u8]> = mail
            .body
            .iter()
            .filter(|body| sniff(body).essence() == "text/html")
            .map(Vec::as_slice)
            .collect();

        if pages.is_empty() {
            debug!(uid = mail.uid, "No HTML body to render");
            return Ok(());
        }

        let pdf = self.renderer.render(&pages, &config.pdf)?;
        if pdf.is_empty() {
            return Ok(());
        }

        let dir = mail_directory(&self.root, MAIL_CATEGORY, &self.account, mail);
        std::fs::create_dir_all(&dir).map_err(|e| GrabError::io(&dir, e))?;

        let path = dir.join(format!("{}.pdf", mail_file_stem(mail)));
        std::fs::write(&path, pdf).map_err(|e| GrabError::io(&path, e))?;
        debug!(uid = mail.uid, path = %path.display(), pages = pages.len(), "Saved PDF");
        Ok(())
    }
}
