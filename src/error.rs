//! Centralized error types for mailgrab.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailgrab library.
#[derive(Error, Debug)]
pub enum GrabError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file could not be read or parsed.
    #[error("Invalid configuration '{path}': {reason}")]
    Config { path: PathBuf, reason: String },

    /// The message source is unreachable or failed mid-fetch. Fatal for the run.
    #[error("Message source failed: {0}")]
    Source(String),

    /// An existing index document is malformed.
    #[error("Corrupt index '{path}': {reason}")]
    InvalidIndex { path: PathBuf, reason: String },

    /// The index could not be written after adding a message.
    #[error("Failed to persist index entry for message {uid} to '{path}': {source}")]
    IndexWrite {
        uid: u32,
        path: PathBuf,
        source: std::io::Error,
    },

    /// The index could not be serialized after adding a message.
    #[error("Failed to encode index entry for message {uid}: {source}")]
    IndexEncode {
        uid: u32,
        source: serde_json::Error,
    },

    /// A message that failed to parse was offered to the index or a handler.
    #[error("Message {uid} carries a parse error: {error}")]
    Unparsed { uid: u32, error: ParseError },

    /// The PDF renderer failed.
    #[error("PDF rendering failed: {0}")]
    Render(String),
}

/// Convenience alias for `Result<T, GrabError>`.
pub type Result<T> = std::result::Result<T, GrabError>;

impl GrabError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a single message could not be turned into a usable [`Mail`](crate::model::mail::Mail).
///
/// Stored on the mail itself so the failure travels with its identifier
/// through the pipeline instead of aborting it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The source delivered no body section for the message.
    #[error("no body section available")]
    MissingBody,

    /// The body is not a recognizable RFC 5322 message.
    #[error("message could not be parsed as MIME")]
    Unparseable,

    /// The envelope has no sender address.
    #[error("message has no sender")]
    MissingSender,

    /// An attachment part could not be decoded.
    #[error("attachment part {ordinal} is unreadable")]
    UnreadablePart { ordinal: usize },

    /// The source reported a read failure for this message.
    #[error("read failed: {reason}")]
    SourceRead { reason: String },

    /// The source finished without delivering this message.
    #[error("message was not delivered by the source")]
    NotDelivered,
}

/// A failure reported by a [`MessageSource`](crate::source::MessageSource) stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// One message could not be read. The stream continues.
    #[error("message {uid}: {reason}")]
    Message { uid: u32, reason: String },

    /// The connection dropped. Nothing further will be delivered.
    #[error("connection lost: {0}")]
    Connection(String),
}
