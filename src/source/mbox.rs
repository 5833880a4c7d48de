//! A local MBOX file used as the mailbox.
//!
//! Messages are identified by their 1-based position in the file. The file
//! is read line by line with a large buffer and never loaded whole. The
//! splitter is tolerant of:
//!
//! - Mixed `\n` and `\r\n` line endings
//! - `From ` lines not preceded by a blank line (logs a warning)
//! - A UTF-8 BOM at the start of the file
//! - A truncated last message

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use super::{
    BodySection, DateRange, IdSet, MessageSource, RawMessage, RawMessageStream, SourceInfo,
};
use crate::error::{GrabError, Result, SourceError};
use crate::parser::envelope::parse_envelope;

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Largest message kept in memory; longer ones are truncated (256 MB).
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// An MBOX file exposed as a [`MessageSource`].
#[derive(Debug, Clone)]
pub struct MboxSource {
    path: PathBuf,
}

impl MboxSource {
    /// Use the MBOX file at `path`. The file is opened on each search or fetch.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> Result<File> {
        File::open(&self.path).map_err(|e| {
            GrabError::Source(format!("cannot open '{}': {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl MessageSource for MboxSource {
    fn describe(&self) -> SourceInfo {
        SourceInfo {
            vendor: "mbox".to_string(),
            server: self.path.display().to_string(),
        }
    }

    async fn search(&self, range: &DateRange) -> Result<Vec<u32>> {
        let file = self.open()?;
        let range = *range;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let mut uids = Vec::new();
            split_messages(file, MAX_MESSAGE_SIZE, &mut |uid, bytes| {
                match parse_envelope(header_block(strip_separator(bytes))) {
                    Some(envelope) if range.contains(&envelope.date) => uids.push(uid),
                    Some(_) => {}
                    None => debug!(uid, "Skipping unparseable message during search"),
                }
                true
            })
            .map_err(|e| GrabError::Source(format!("reading '{}': {e}", path.display())))?;
            Ok(uids)
        })
        .await
        .map_err(|e| GrabError::Source(format!("search task failed: {e}")))?
    }

    async fn fetch(&self, ids: &IdSet) -> Result<RawMessageStream> {
        let file = self.open()?;
        let ids = ids.clone();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::task::spawn_blocking(move || {
            let last = ids.last().copied().unwrap_or(0);
            let outcome = split_messages(file, MAX_MESSAGE_SIZE, &mut |uid, bytes| {
                if ids.contains(&uid) {
                    let item = fetch_one(uid, bytes);
                    if tx.send(item).is_err() {
                        // Receiver dropped, nobody is listening any more.
                        return false;
                    }
                }
                uid < last
            });

            if let Err(e) = outcome {
                let _ = tx.send(Err(SourceError::Connection(e.to_string())));
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

/// Build the raw message for one MBOX entry.
fn fetch_one(uid: u32, bytes: &[u8]) -> std::result::Result<RawMessage, SourceError> {
    let message = strip_separator(bytes);
    let envelope = parse_envelope(message).ok_or_else(|| SourceError::Message {
        uid,
        reason: "unreadable headers".to_string(),
    })?;

    Ok(RawMessage::new(uid, envelope).with_section(BodySection::Full, message.to_vec()))
}

/// Split an MBOX stream into messages.
///
/// The callback receives `(uid, raw_bytes)` with the `From ` line included
/// and returns `true` to continue or `false` to stop early. Messages longer
/// than `max_message_size` are cut off at that size.
fn split_messages(
    file: File,
    max_message_size: usize,
    message_callback: &mut dyn FnMut(u32, &[u8]) -> bool,
) -> std::io::Result<u32> {
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

    let mut uid: u32 = 0;
    let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
    let mut line_buf: Vec<u8> = Vec::with_capacity(4096);
    let mut prev_line_was_empty = true;
    let mut first_line = true;
    let mut offset: u64 = 0;
    let mut message_start: u64 = 0;
    let mut truncated = false;

    loop {
        line_buf.clear();
        let read = reader.read_until(b'\n', &mut line_buf)?;
        if read == 0 {
            break;
        }

        if is_mbox_separator(&line_buf) {
            if !first_line && !prev_line_was_empty {
                warn!(offset, "Found 'From ' separator without preceding blank line");
            }
            if !message_buf.is_empty() {
                uid += 1;
                if !message_callback(uid, &message_buf) {
                    return Ok(uid);
                }
            }
            message_buf.clear();
            message_start = offset;
            truncated = false;
            message_buf.extend_from_slice(&line_buf);
        } else if truncated {
            // Rest of an oversized message, dropped.
        } else if message_buf.len() + line_buf.len() <= max_message_size {
            message_buf.extend_from_slice(&line_buf);
        } else {
            warn!(
                offset = message_start,
                max_size = max_message_size,
                "Message exceeds maximum size, truncating body"
            );
            truncated = true;
        }

        prev_line_was_empty = is_blank_line(&line_buf);
        first_line = false;
        offset += read as u64;
    }

    if !message_buf.is_empty() {
        uid += 1;
        message_callback(uid, &message_buf);
    }

    Ok(uid)
}

/// Drop the BOM and the leading `From ` separator line.
fn strip_separator(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// The header block of a message, or all of it when there is no body.
fn header_block(message: &[u8]) -> &[u8] {
    header_end(message).map_or(message, |end| &message[..end])
}

/// Offset just past the blank line that ends the header block.
fn header_end(data: &[u8]) -> Option<usize> {
    let lf = data.windows(2).position(|w| w == b"\n\n").map(|p| p + 2);
    let crlf = data.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4);
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
