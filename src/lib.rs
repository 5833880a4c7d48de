//! `mailgrab`: fetch a mailbox over a date range and export what matters.
//!
//! Messages are pulled from a [`source::MessageSource`], parsed into
//! [`model::mail::Mail`] records, recorded in a per-account
//! [`index::MetadataIndex`], and finally passed through the
//! [`export::Dispatcher`] to save attachments, PDFs and bodies.

pub mod config;
pub mod error;
pub mod export;
pub mod index;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod run;
pub mod sniff;
pub mod source;
