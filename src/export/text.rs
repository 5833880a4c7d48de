//! Save plain-text and HTML bodies of matching mails.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::naming::{mail_directory, mail_file_stem, MAIL_CATEGORY};
use crate::config::Config;
use crate::error::{GrabError, Result};
use crate::model::mail::Mail;
use crate::sniff::{essence, sniff};

/// Writes `<subject>-<date>-<uid>.txt` / `.html` next to the PDF export.
#[derive(Debug, Clone)]
pub struct TextExport {
    root: PathBuf,
    account: String,
}

impl TextExport {
    pub fn new(root: impl Into<PathBuf>, account: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            account: account.into(),
        }
    }

    /// Save the body of `mail` according to its declared top-level type.
    ///
    /// Single-part `text/plain` and `text/html` are written verbatim. For
    /// `multipart/*` each inline part is classified by sniffing; parts that
    /// are neither text nor HTML are skipped. Other types are ignored.
    pub fn handle(&self, config: &Config, mail: &Mail) -> Result<()> {
        if !config.mails.filter().matches(&mail.subject) {
            return Ok(());
        }
        let Some(first) = mail.body.first() else {
            return Ok(());
        };

        let dir = mail_directory(&self.root, MAIL_CATEGORY, &self.account, mail);
        let stem = mail_file_stem(mail);

        match essence(&mail.mime_type).as_str() {
            "text/plain" => write_body(&dir, &stem, "txt", first),
            "text/html" => write_body(&dir, &stem, "html", first),
            t if t.starts_with("multipart/") => {
                for (i, body) in mail.body.iter().enumerate() {
                    let sniffed = sniff(body);
                    match sniffed.essence().as_str() {
                        "text/plain" => write_body(&dir, &stem, "txt", body)?,
                        "text/html" => write_body(&dir, &stem, "html", body)?,
                        _ => debug!(
                            uid = mail.uid,
                            part = i,
                            mime = %sniffed.mime,
                            "Skipping body part of unknown content type"
                        ),
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn write_body(dir: &Path, stem: &str, extension: &str, body: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| GrabError::io(dir, e))?;
    let path = dir.join(format!("{stem}.{extension}"));
    std::fs::write(&path, body).map_err(|e| GrabError::io(&path, e))
}
