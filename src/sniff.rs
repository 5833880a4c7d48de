//! Content sniffing: classify bytes by what they contain, not by what a header claims.

use infer::MatcherType;

/// Label used when nothing more specific can be determined.
pub const OCTET_STREAM: &str = "application/octet-stream";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

/// How many leading bytes are inspected for HTML markers.
const HTML_SCAN_LEN: usize = 512;

const HTML_MARKERS: &[&str] = &[
    "<!doctype html",
    "<html",
    "<head",
    "<body",
    "<script",
    "<iframe",
    "<table",
    "<title",
    "<style",
    "<div",
    "<font",
    "<p>",
    "<p ",
    "<br",
    "<h1",
    "<a ",
    "<b>",
    "<!--",
];

/// Result of sniffing a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sniffed {
    /// Full label, possibly with parameters (`text/html; charset=utf-8`).
    pub mime: String,
    /// Suggested file extension including the dot, or empty when unknown.
    pub extension: String,
}

impl Sniffed {
    fn new(mime: &str, extension: &str) -> Self {
        Self {
            mime: mime.to_string(),
            extension: extension.to_string(),
        }
    }

    /// The label without parameters, see [`essence`].
    pub fn essence(&self) -> String {
        essence(&self.mime)
    }
}

/// Classify `bytes`. Never fails: unknown content is `application/octet-stream`.
///
/// Binary magic numbers win first; text is only considered when no binary
/// signature matches, and HTML only when a tag appears near the start.
pub fn sniff(bytes: &[u8]) -> Sniffed {
    if let Some(kind) = infer::get(bytes).filter(|k| k.matcher_type() != MatcherType::Text) {
        return Sniffed {
            mime: kind.mime_type().to_string(),
            extension: format!(".{}", kind.extension()),
        };
    }

    if looks_like_html(bytes) {
        return Sniffed::new(TEXT_HTML, ".html");
    }

    if looks_like_text(bytes) {
        return Sniffed::new(TEXT_PLAIN, ".txt");
    }

    Sniffed::new(OCTET_STREAM, "")
}

/// Strip parameters from a type label and lowercase it.
///
/// `"Text/HTML; charset=utf-8"` → `"text/html"`
pub fn essence(label: &str) -> String {
    label
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(HTML_SCAN_LEN)];
    let head = strip_bom(head);
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let lowered = String::from_utf8_lossy(&head[start..]).to_lowercase();
    HTML_MARKERS.iter().any(|marker| lowered.contains(marker))
}

fn looks_like_text(bytes: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(strip_bom(bytes)) else {
        return false;
    };
    !text.is_empty()
        && !text
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0c'))
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}
