//! Metadata index: document format and the persisted per-account store.

pub mod format;
pub mod store;

pub use store::MetadataIndex;
