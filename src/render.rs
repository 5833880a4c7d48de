//! HTML to PDF rendering.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::config::{Orientation, PdfConfig, Quality};
use crate::error::{GrabError, Result};

/// Turns HTML pages into one PDF document.
pub trait PdfRenderer: Send + Sync {
    /// Render `pages` in order into a single document.
    fn render(&self, pages: &[&[u8]], options: &PdfConfig) -> Result<Vec<u8>>;
}

/// Renders by running the `wkhtmltopdf` executable.
///
/// Each page is written to its own temporary `.html` file; the PDF is read
/// back from the process's stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct WkhtmltopdfRenderer;

impl WkhtmltopdfRenderer {
    fn arguments(options: &PdfConfig) -> Vec<String> {
        let mut args = Vec::new();
        if options.quality == Quality::Low {
            args.push("--lowquality".to_string());
        }
        args.push("--orientation".to_string());
        args.push(
            match options.orientation {
                Orientation::Portrait => "Portrait",
                Orientation::Landscape => "Landscape",
            }
            .to_string(),
        );
        args.push("--page-size".to_string());
        args.push(options.page_size.clone());
        args
    }

    fn page_arguments(options: &PdfConfig) -> Vec<String> {
        vec![
            if options.javascript {
                "--enable-javascript"
            } else {
                "--disable-javascript"
            }
            .to_string(),
            "--encoding".to_string(),
            options.encoding.clone(),
        ]
    }
}

impl PdfRenderer for WkhtmltopdfRenderer {
    fn render(&self, pages: &[&[u8]], options: &PdfConfig) -> Result<Vec<u8>> {
        let mut files = Vec::with_capacity(pages.len());
        for page in pages {
            let mut file = tempfile::Builder::new()
                .suffix(".html")
                .tempfile()
                .map_err(|e| GrabError::Render(format!("temporary page: {e}")))?;
            file.write_all(page)
                .map_err(|e| GrabError::io(file.path(), e))?;
            files.push(file);
        }

        let mut command = Command::new(&options.binary);
        command.arg("--quiet").args(Self::arguments(options));
        for file in &files {
            command
                .arg("page")
                .arg(file.path())
                .args(Self::page_arguments(options));
        }
        command
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(binary = %options.binary.display(), pages = files.len(), "Rendering PDF");
        let output = command.output().map_err(|e| {
            GrabError::Render(format!("cannot run '{}': {e}", options.binary.display()))
        })?;

        if !output.status.success() {
            return Err(GrabError::Render(format!(
                "'{}' exited with {}: {}",
                options.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output.stdout)
    }
}
