//! Integration tests for the export handlers and a complete sync run.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tempfile::TempDir;

use mailgrab::config::{Config, PdfConfig};
use mailgrab::error::{GrabError, Result};
use mailgrab::export::Dispatcher;
use mailgrab::model::mail::Mail;
use mailgrab::parser::envelope::parse_envelope;
use mailgrab::parser::parse_mail;
use mailgrab::render::PdfRenderer;
use mailgrab::run::{sync, Phase};
use mailgrab::source::memory::MemorySource;
use mailgrab::source::{BodySection, DateRange, RawMessage};

const ACCOUNT: &str = "me@example.com";

const PLAIN_INVOICE: &str = "From: Billing <a@b.com>\r\n\
Subject: Invoice\r\n\
Date: Tue, 02 Jan 2024 09:30:00 +0000\r\n\
Message-ID: <inv@b.com>\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Amount due: 10 EUR\r\n";

const HTML_WITH_PDF: &str = "From: Shop <orders@shop.example>\r\n\
Subject: Invoice 42\r\n\
Date: Wed, 03 Jan 2024 12:00:00 +0000\r\n\
Message-ID: <42@shop.example>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><p>Thanks for your order</p></body></html>\r\n\
--XYZ\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"invoice.pdf\"\r\n\
\r\n\
%PDF-1.4 not really a pdf\r\n\
--XYZ--\r\n";

fn raw(uid: u32, text: &str) -> RawMessage {
    let bytes = text.as_bytes().to_vec();
    let envelope = parse_envelope(&bytes).unwrap();
    RawMessage::new(uid, envelope).with_section(BodySection::Full, bytes)
}

fn config(root: &Path) -> Config {
    let mut config = Config::default();
    config.account.username = ACCOUNT.to_string();
    config.general.output_dir = root.to_path_buf();
    config.mails.subjects = vec!["invoice".to_string()];
    config.attachments.mimetypes = vec!["application/pdf".to_string()];
    config
}

/// Records how many pages each render call received.
#[derive(Default)]
struct FakeRenderer {
    calls: Mutex<Vec<usize>>,
}

impl PdfRenderer for FakeRenderer {
    fn render(&self, pages: &[&[u8]], _options: &PdfConfig) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(pages.len());
        Ok(b"%PDF-1.4 fake".to_vec())
    }
}

struct FailingRenderer;

impl PdfRenderer for FailingRenderer {
    fn render(&self, _pages: &[&[u8]], _options: &PdfConfig) -> Result<Vec<u8>> {
        Err(GrabError::Render("renderer exploded".to_string()))
    }
}

fn files_under(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                out.push(
                    path.strip_prefix(root)
                        .unwrap()
                        .to_string_lossy()
                        .replace('\\', "/"),
                );
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

// ─── Complete run ──────────────────────────────────────────────────

#[tokio::test]
async fn test_plain_invoice_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let renderer = Arc::new(FakeRenderer::default());
    let source = MemorySource::new(vec![raw(17, PLAIN_INVOICE)]);

    let summary = sync(
        &config,
        Arc::new(source),
        renderer.clone(),
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        ),
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.requested, 1);
    assert_eq!(summary.indexed, 1);
    assert_eq!(summary.handler_errors, 0);

    let text = dir
        .path()
        .join("mail/me@example.com/202401/b.com/Invoice-2024-01-02-17.txt");
    assert_eq!(
        std::fs::read_to_string(text).unwrap().trim_end(),
        "Amount due: 10 EUR"
    );
    assert!(renderer.calls.lock().unwrap().is_empty());
    assert_eq!(
        files_under(dir.path()),
        vec![
            "mail/me@example.com/202401/b.com/Invoice-2024-01-02-17.txt".to_string(),
            "mail/me@example.com/data.json".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_sync_reports_both_phases() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let source = MemorySource::new(vec![raw(1, PLAIN_INVOICE), raw(2, HTML_WITH_PDF)]);
    let phases = Mutex::new(Vec::new());
    let on_progress = |phase: Phase, done: u64, total: u64| {
        phases.lock().unwrap().push((phase, done, total));
    };

    let summary = sync(
        &config,
        Arc::new(source),
        Arc::new(FakeRenderer::default()),
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        ),
        Some(&on_progress),
    )
    .await
    .unwrap();

    assert_eq!(summary.fetched, 2);
    let phases = phases.into_inner().unwrap();
    assert_eq!(phases.last(), Some(&(Phase::Processing, 2, 2)));
    assert!(phases.contains(&(Phase::Fetching, 2, 2)));
}

#[tokio::test]
async fn test_sync_aborts_when_source_is_down() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let source = MemorySource::new(vec![raw(1, PLAIN_INVOICE)]).unreachable("no route");

    let result = sync(
        &config,
        Arc::new(source),
        Arc::new(FakeRenderer::default()),
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        ),
        None,
    )
    .await;
    assert!(matches!(result, Err(GrabError::Source(_))));
}

// ─── Handlers ──────────────────────────────────────────────────────

#[test]
fn test_html_mail_with_attachment() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let renderer = Arc::new(FakeRenderer::default());
    let dispatcher = Dispatcher::for_account(dir.path(), ACCOUNT, renderer.clone());

    let names: Vec<&str> = dispatcher.handlers().iter().map(|h| h.name()).collect();
    assert_eq!(names, vec!["attachment", "pdf", "text"]);

    let mail = parse_mail(&raw(42, HTML_WITH_PDF));
    assert!(mail.is_ok(), "{:?}", mail.error);
    let report = dispatcher.dispatch(&config, &mail);
    assert!(report.is_clean(), "{:?}", report.failures);

    assert_eq!(*renderer.calls.lock().unwrap(), vec![1]);
    let files = files_under(dir.path());
    assert!(files.contains(
        &"attachment/me@example.com/202401/shop.example/invoice.pdf".to_string()
    ));
    assert!(files.contains(
        &"mail/me@example.com/202401/shop.example/Invoice 42-2024-01-03-42.pdf".to_string()
    ));
    assert!(files.contains(
        &"mail/me@example.com/202401/shop.example/Invoice 42-2024-01-03-42.html".to_string()
    ));
}

#[test]
fn test_attachment_filter_excludes_other_types() {
    let dir = TempDir::new().unwrap();
    let mut config = config(dir.path());
    config.attachments.mimetypes = vec!["image/".to_string()];
    let dispatcher =
        Dispatcher::for_account(dir.path(), ACCOUNT, Arc::new(FakeRenderer::default()));

    dispatcher.dispatch(&config, &parse_mail(&raw(42, HTML_WITH_PDF)));
    assert!(!dir.path().join("attachment").exists());
}

#[test]
fn test_subject_filter_gates_pdf_and_text() {
    let dir = TempDir::new().unwrap();
    let mut config = config(dir.path());
    config.mails.subjects = vec!["receipt".to_string()];
    let renderer = Arc::new(FakeRenderer::default());
    let dispatcher = Dispatcher::for_account(dir.path(), ACCOUNT, renderer.clone());

    dispatcher.dispatch(&config, &parse_mail(&raw(42, HTML_WITH_PDF)));
    assert!(renderer.calls.lock().unwrap().is_empty());
    assert!(!dir.path().join("mail").exists());
    // Attachments have their own filter.
    assert!(dir.path().join("attachment").exists());
}

#[test]
fn test_failing_handler_does_not_stop_the_others() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let dispatcher = Dispatcher::for_account(dir.path(), ACCOUNT, Arc::new(FailingRenderer));

    let report = dispatcher.dispatch(&config, &parse_mail(&raw(42, HTML_WITH_PDF)));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "pdf");

    let files = files_under(dir.path());
    assert!(files.iter().any(|f| f.ends_with("invoice.pdf")));
    assert!(files.iter().any(|f| f.ends_with("-42.html")));
}

#[test]
fn test_error_mail_skips_all_handlers() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let renderer = Arc::new(FakeRenderer::default());
    let dispatcher = Dispatcher::for_account(dir.path(), ACCOUNT, renderer.clone());

    let mut mail = Mail::failed(5, mailgrab::error::ParseError::MissingBody);
    mail.subject = "Invoice".to_string();
    let report = dispatcher.dispatch(&config, &mail);

    assert!(report.skipped);
    assert!(renderer.calls.lock().unwrap().is_empty());
    assert!(files_under(dir.path()).is_empty());
}

#[test]
#[cfg(unix)]
fn test_overlong_attachment_name_is_skipped() {
    let long_name = format!("{}.pdf", "a".repeat(296));
    let message = format!(
        "From: a@b.com\r\n\
Subject: Scans\r\n\
Date: Tue, 02 Jan 2024 09:30:00 +0000\r\n\
Content-Type: multipart/mixed; boundary=\"B\"\r\n\
\r\n\
--B\r\n\
Content-Type: text/plain\r\n\
\r\n\
two scans\r\n\
--B\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"{long_name}\"\r\n\
\r\n\
%PDF-1.4 long\r\n\
--B\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"ok.pdf\"\r\n\
\r\n\
%PDF-1.4 short\r\n\
--B--\r\n"
    );
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let dispatcher =
        Dispatcher::for_account(dir.path(), ACCOUNT, Arc::new(FakeRenderer::default()));

    let mail = parse_mail(&raw(21, &message));
    assert_eq!(mail.attachments.len(), 2);
    assert_eq!(mail.attachments[0].filename, long_name);

    let report = dispatcher.dispatch(&config, &mail);
    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(
        files_under(dir.path()),
        vec!["attachment/me@example.com/202401/b.com/ok.pdf".to_string()]
    );
}

#[test]
fn test_unnamed_attachment_gets_generated_name() {
    const UNNAMED: &str = "From: a@b.com\r\n\
Subject: Scan\r\n\
Date: Tue, 02 Jan 2024 09:30:00 +0000\r\n\
Content-Type: multipart/mixed; boundary=\"B\"\r\n\
\r\n\
--B\r\n\
Content-Type: text/plain\r\n\
\r\n\
see attached\r\n\
--B\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment\r\n\
\r\n\
%PDF-1.7 scan\r\n\
--B--\r\n";

    let mail = parse_mail(&raw(9, UNNAMED));
    assert!(mail.is_ok());
    assert_eq!(mail.attachments.len(), 1);
    assert_eq!(mail.attachments[0].filename, "9-1.pdf");
    assert_eq!(mail.attachments[0].mimetype, "application/pdf");
    assert_eq!(mail.attachment_mime_type, vec!["application/pdf".to_string()]);
}
