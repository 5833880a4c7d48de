//! Save attachments whose sniffed type is on the allow-list.

use std::path::PathBuf;

use tracing::{debug, warn};

use super::naming::{is_name_too_long, mail_directory, ATTACHMENT_CATEGORY};
use crate::config::Config;
use crate::error::{GrabError, Result};
use crate::model::mail::Mail;

/// Writes matching attachments to
/// `<root>/attachment/<account>/<YYYYMM>/<sender_host>/<filename>`.
#[derive(Debug, Clone)]
pub struct AttachmentExport {
    root: PathBuf,
    account: String,
}

impl AttachmentExport {
    pub fn new(root: impl Into<PathBuf>, account: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            account: account.into(),
        }
    }

    /// Export every allowed attachment of `mail`.
    ///
    /// A file name too long for the filesystem is logged and skipped; any
    /// other write failure stops this handler for this mail.
    pub fn handle(&self, config: &Config, mail: &Mail) -> Result<()> {
        let filter = config.attachments.filter();
        let dir = mail_directory(&self.root, ATTACHMENT_CATEGORY, &self.account, mail);

        for attachment in &mail.attachments {
            if !filter.matches(&attachment.mimetype) {
                continue;
            }

            std::fs::create_dir_all(&dir).map_err(|e| GrabError::io(&dir, e))?;

            let path = dir.join(&attachment.filename);
            match std::fs::write(&path, &attachment.body) {
                Ok(()) => debug!(
                    uid = mail.uid,
                    path = %path.display(),
                    size = %humansize::format_size(attachment.size(), humansize::BINARY),
                    "Saved attachment"
                ),
                Err(e) if is_name_too_long(&e) => {
                    warn!(uid = mail.uid, path = %path.display(), "Path too long, skipping attachment");
                }
                Err(e) => return Err(GrabError::io(&path, e)),
            }
        }

        Ok(())
    }
}
