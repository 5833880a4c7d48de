//! CLI entry point for `mailgrab`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use mailgrab::config::{self, Config};
use mailgrab::render::WkhtmltopdfRenderer;
use mailgrab::run::{self, Phase};
use mailgrab::source::mbox::MboxSource;
use mailgrab::source::DateRange;

/// Download a mailbox date range: index every message, export attachments,
/// PDFs and bodies.
#[derive(Parser)]
#[command(name = "mailgrab", version, about)]
struct Cli {
    /// Configuration file (defaults to $MAILGRAB_CONFIG or the user config dir)
    #[arg(short, long, value_name = "PATH", env = "MAILGRAB_CONFIG")]
    config: Option<PathBuf>,

    /// First day to fetch (inclusive), YYYY-MM-DD
    #[arg(long, value_name = "DATE")]
    from: NaiveDate,

    /// Day to stop at (exclusive), YYYY-MM-DD
    #[arg(long, value_name = "DATE")]
    to: NaiveDate,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?,
    };
    let config = config::load_config(&config_path)?;

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);
    tracing::info!(path = %config_path.display(), "Loaded config");

    if cli.to <= cli.from {
        anyhow::bail!("--to ({}) must be after --from ({})", cli.to, cli.from);
    }

    let mbox = config
        .source
        .mbox
        .clone()
        .ok_or_else(|| anyhow::anyhow!("No message source configured (source.mbox)"))?;

    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg:<10} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .expect("valid template")
        .progress_chars("#>-");
    let bars = MultiProgress::new();
    let fetching = bars.add(ProgressBar::new(0).with_style(style.clone()));
    fetching.set_message("Fetching");
    let processing = bars.add(ProgressBar::new(0).with_style(style));
    processing.set_message("Processing");

    let on_progress = |phase: Phase, current: u64, total: u64| {
        let bar = match phase {
            Phase::Fetching => &fetching,
            Phase::Processing => &processing,
        };
        bar.set_length(total);
        bar.set_position(current);
    };

    let summary = run::sync(
        &config,
        Arc::new(MboxSource::new(mbox)),
        Arc::new(WkhtmltopdfRenderer),
        DateRange::new(cli.from, cli.to),
        Some(&on_progress),
    )
    .await?;

    fetching.finish();
    processing.finish();
    println!("Done: {summary}");

    Ok(())
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailgrab.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}
