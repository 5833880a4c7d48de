//! Email parsing: envelope extraction and MIME part classification.

pub mod envelope;
pub mod mime;

pub use mime::parse_mail;
