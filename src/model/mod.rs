//! Core data model types for mails, addresses, and attachments.

pub mod address;
pub mod attachment;
pub mod mail;
