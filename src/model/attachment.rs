//! Decoded attachment payloads.

/// An attachment extracted from a message, with its content held in memory.
///
/// The filename is already sanitized: it never contains a path separator,
/// so joining it onto an output directory cannot escape that directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Safe filename. Synthesized as `<uid>-<ordinal><ext>` when the part had none.
    pub filename: String,

    /// Decoded content.
    pub body: Vec<u8>,

    /// Type label sniffed from `body`, not the declared `Content-Type`.
    pub mimetype: String,
}

impl Attachment {
    /// Decoded size in bytes.
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }
}
