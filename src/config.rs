//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. the path given on the command line
//! 2. `$MAILGRAB_CONFIG` (environment variable)
//! 3. `~/.config/mailgrab/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailgrab\config.toml` (Windows)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GrabError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Account the mailbox belongs to.
    pub account: AccountConfig,
    /// Where messages are read from.
    pub source: SourceConfig,
    /// Attachment export filter.
    pub attachments: AttachmentsConfig,
    /// Subject filter for PDF and body export.
    pub mails: MailsConfig,
    /// PDF rendering options.
    pub pdf: PdfConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Root under which `mail/` and `attachment/` trees are written.
    pub output_dir: PathBuf,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Account identity and server coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Account address, used in output paths and the index document.
    pub username: String,
    /// Server host name, recorded in the index document.
    pub server: String,
    /// Server port.
    pub port: Option<u16>,
    /// Ingestion-source label. Defaults to the source's own label.
    pub vendor: Option<String>,
}

/// Message source selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// MBOX file read as the mailbox.
    pub mbox: Option<PathBuf>,
}

/// Which attachments are exported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentsConfig {
    /// Accepted sniffed type labels (substring match, e.g. `"image/"`).
    pub mimetypes: Vec<String>,
    /// Match case-sensitively.
    pub case_sensitive: bool,
}

/// Which mails are rendered or saved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailsConfig {
    /// Subject tokens (substring match).
    pub subjects: Vec<String>,
    /// Match case-sensitively.
    pub case_sensitive: bool,
}

/// PDF output quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    High,
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// PDF rendering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Renderer executable.
    pub binary: PathBuf,
    pub quality: Quality,
    pub orientation: Orientation,
    /// Paper size name, e.g. "A4" or "Letter".
    pub page_size: String,
    /// Run scripts embedded in HTML bodies.
    pub javascript: bool,
    /// Input text encoding.
    pub encoding: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            output_dir: PathBuf::from("."),
            cache_dir: None,
        }
    }
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("wkhtmltopdf"),
            quality: Quality::Low,
            orientation: Orientation::Portrait,
            page_size: "A4".to_string(),
            javascript: false,
            encoding: "UTF-8".to_string(),
        }
    }
}

// ── Filters ─────────────────────────────────────────────────────

/// Allow-list match: a value passes when it contains any token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    tokens: Vec<String>,
    case_sensitive: bool,
}

impl Filter {
    /// Blank tokens are ignored. An empty filter matches nothing.
    pub fn new(tokens: &[String], case_sensitive: bool) -> Self {
        let tokens = tokens
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| {
                if case_sensitive {
                    t.to_string()
                } else {
                    t.to_lowercase()
                }
            })
            .collect();
        Self {
            tokens,
            case_sensitive,
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        if self.case_sensitive {
            self.tokens.iter().any(|t| value.contains(t.as_str()))
        } else {
            let value = value.to_lowercase();
            self.tokens.iter().any(|t| value.contains(t.as_str()))
        }
    }
}

impl AttachmentsConfig {
    pub fn filter(&self) -> Filter {
        Filter::new(&self.mimetypes, self.case_sensitive)
    }
}

impl MailsConfig {
    pub fn filter(&self) -> Filter {
        Filter::new(&self.subjects, self.case_sensitive)
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration from an explicit path.
///
/// Unlike a missing optional setting, an unreadable or malformed file is an
/// error: running with defaults would export to the wrong place.
pub fn load_config(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| GrabError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| GrabError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if config.account.username.trim().is_empty() {
        return Err(GrabError::Config {
            path: path.to_path_buf(),
            reason: "account.username is required".to_string(),
        });
    }

    Ok(config)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILGRAB_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailgrab").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailgrab")
}
