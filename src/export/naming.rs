//! Output path naming shared by all export handlers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::model::mail::Mail;

/// Category directory for exported attachments.
pub const ATTACHMENT_CATEGORY: &str = "attachment";

/// Category directory for rendered and saved message bodies.
pub const MAIL_CATEGORY: &str = "mail";

/// Directory used when the sender has no host part.
const UNKNOWN_HOST: &str = "unknown";

/// Characters that are not allowed in file names on common filesystems.
const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// `<category>/<account>/<YYYYMM>/<sender_host>`.
///
/// Pure: nothing is created on disk.
pub fn directory_name(
    category: &str,
    date: &DateTime<Utc>,
    sender_host: &str,
    account: &str,
) -> PathBuf {
    let month = date.format("%Y%m").to_string();
    [category, account, month.as_str(), sender_host]
        .iter()
        .collect()
}

/// Output directory for `mail` under `root`, keyed by its first sender.
pub fn mail_directory(root: &Path, category: &str, account: &str, mail: &Mail) -> PathBuf {
    let host = mail
        .sender()
        .map(|a| a.host.as_str())
        .filter(|h| !h.is_empty())
        .unwrap_or(UNKNOWN_HOST);
    root.join(directory_name(category, &mail.date, host, account))
}

/// Trim surrounding whitespace and replace filesystem-unsafe characters with `_`.
pub fn sanitize_subject(subject: &str) -> String {
    subject
        .trim()
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// `<subject>-<YYYY-MM-DD>-<uid>`, unique per message and stable across runs.
pub fn mail_file_stem(mail: &Mail) -> String {
    format!(
        "{}-{}-{}",
        sanitize_subject(&mail.subject),
        mail.date.format("%Y-%m-%d"),
        mail.uid
    )
}

/// Whether an I/O error means the path exceeded a filesystem limit.
#[cfg(unix)]
pub fn is_name_too_long(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENAMETOOLONG)
}

/// Whether an I/O error means the path exceeded a filesystem limit.
#[cfg(windows)]
pub fn is_name_too_long(err: &std::io::Error) -> bool {
    const ERROR_FILENAME_EXCED_RANGE: i32 = 206;
    err.raw_os_error() == Some(ERROR_FILENAME_EXCED_RANGE)
}

#[cfg(not(any(unix, windows)))]
pub fn is_name_too_long(_err: &std::io::Error) -> bool {
    false
}
