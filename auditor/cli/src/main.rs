//! site-audit - Terminal Surface for Remote Website Audits
//!
//! Submits a URL to the audit service, shows progress while the audit runs
//! and prints the rendered report. The session, transports and timeout race
//! live in `auditor-core`; this binary only parses arguments, sets up
//! logging and draws what the driver reports.
//!
//! # Usage
//!
//! ```bash
//! # One audit, then exit (non-zero on failure or timeout)
//! site-audit example.com --mode mobile
//!
//! # Polling only, with exports
//! site-audit example.com --transport polling --export-csv audit.csv --export-doc audit.txt
//!
//! # Read URLs from stdin, one audit at a time
//! site-audit --interactive
//!
//! # Verbose logging
//! RUST_LOG=debug site-audit example.com
//! ```

mod surface;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use auditor_core::transport::{create_selector, StrategyPreference};
use auditor_core::{
    load_config_from_path, AttemptId, AttemptOutcome, AuditDriver, AuditError, AuditMode, AuditorConfig,
    ConfigOverrides, ExportFormat, ExportOptions,
};

use surface::Surface;

/// site-audit - Run website audits on a remote audit service
#[derive(Parser, Debug)]
#[command(name = "site-audit")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// URL to audit (omit to read URLs from stdin)
    url: Option<String>,

    /// Audit mode
    #[arg(short = 'm', long, default_value = "desktop")]
    mode: AuditMode,

    /// Transport strategy (auto, streaming, polling)
    #[arg(short = 't', long, value_name = "STRATEGY")]
    transport: Option<StrategyPreference>,

    /// Streaming endpoint of the audit service
    #[arg(long, value_name = "URL")]
    stream_url: Option<String>,

    /// HTTP base of the audit service (polling)
    #[arg(long, value_name = "URL")]
    http_base: Option<String>,

    /// Attempt timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Connection timeout in milliseconds
    #[arg(long, value_name = "MS")]
    connect_timeout_ms: Option<u64>,

    /// Lines per page of the document export
    #[arg(long, value_name = "N")]
    lines_per_page: Option<usize>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "SITE_AUDIT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a CSV export of the report
    #[arg(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,

    /// Write a paginated document export of the report
    #[arg(long, value_name = "PATH")]
    export_doc: Option<PathBuf>,

    /// Write the raw report as JSON
    #[arg(long, value_name = "PATH")]
    export_json: Option<PathBuf>,

    /// Read URLs from stdin, one audit at a time
    #[arg(short = 'i', long)]
    interactive: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "SITE_AUDIT_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(strategy) = self.transport {
            overrides = overrides.with_strategy(strategy);
        }
        if let Some(ref url) = self.stream_url {
            overrides = overrides.with_stream_url(url.clone());
        }
        if let Some(ref base) = self.http_base {
            overrides = overrides.with_http_base(base.clone());
        }
        if let Some(ms) = self.timeout_ms {
            overrides = overrides.with_timeout_ms(ms);
        }
        if let Some(ms) = self.connect_timeout_ms {
            overrides = overrides.with_connect_timeout_ms(ms);
        }
        if let Some(lines) = self.lines_per_page {
            overrides = overrides.with_lines_per_page(lines);
        }
        overrides
    }

    fn export_targets(&self) -> Vec<(ExportFormat, PathBuf)> {
        [
            (ExportFormat::Csv, &self.export_csv),
            (ExportFormat::Document, &self.export_doc),
            (ExportFormat::Json, &self.export_json),
        ]
        .into_iter()
        .filter_map(|(format, path)| path.clone().map(|path| (format, path)))
        .collect()
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("site_audit={level},auditor_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file and environment, then apply CLI overrides
fn build_config(args: &Args) -> Result<AuditorConfig> {
    let path = args
        .config
        .clone()
        .or_else(auditor_core::default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        source = %config.source(),
        strategy = %config.transport.strategy,
        timeout_ms = config.session_timeout.as_millis(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Print the stored report and write any requested exports
async fn publish_report(
    driver: &AuditDriver,
    targets: &[(ExportFormat, PathBuf)],
    options: &ExportOptions,
) -> Result<()> {
    if let Some(rendered) = driver.rendered() {
        println!("{rendered}");
    }

    for (format, path) in targets {
        let text = driver
            .export(*format, options)
            .with_context(|| format!("Failed to export {format}"))?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(format = %format, path = %path.display(), "Export written");
        eprintln!("Saved {format} export to {}", path.display());
    }
    Ok(())
}

/// Drive the inbox until `attempt` resolves
///
/// The attempt may already be resolved when `submit` returns (start
/// failure, budget spent on the handshake), so the outcome is checked
/// before every wait.
async fn await_outcome(
    driver: &mut AuditDriver,
    surface: &mut Surface,
    attempt: AttemptId,
) -> Result<AttemptOutcome> {
    loop {
        if let Some(outcome) = driver.outcome_of(attempt) {
            return Ok(outcome.clone());
        }
        let input = driver
            .next_input()
            .await
            .context("Driver inbox closed unexpectedly")?;
        driver.handle(input);
        surface.flush();
    }
}

/// Run one audit and exit
async fn run_once(
    driver: &mut AuditDriver,
    surface: &mut Surface,
    url: &str,
    mode: AuditMode,
    targets: &[(ExportFormat, PathBuf)],
    options: &ExportOptions,
) -> Result<()> {
    let attempt = driver.submit(url, mode).await;
    surface.flush();
    let outcome = await_outcome(driver, surface, attempt?).await?;

    match outcome {
        AttemptOutcome::Succeeded => publish_report(driver, targets, options).await,
        AttemptOutcome::Failed(e) => Err(e).context("Audit failed"),
        AttemptOutcome::TimedOut => anyhow::bail!("Audit timed out"),
    }
}

/// Read `url [mode]` lines from stdin until EOF or `quit`
async fn run_interactive(
    driver: &mut AuditDriver,
    surface: &mut Surface,
    default_mode: AuditMode,
    targets: &[(ExportFormat, PathBuf)],
    options: &ExportOptions,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    surface.prompt();

    loop {
        if !stdin_open && driver.can_submit() {
            break;
        }

        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    stdin_open = false;
                    continue;
                };
                let line = line.trim();
                if matches!(line, "quit" | "exit") {
                    stdin_open = false;
                    continue;
                }

                let mut parts = line.split_whitespace();
                let url = parts.next().unwrap_or_default();
                let mode = match parts.next().map(str::parse::<AuditMode>) {
                    None => default_mode,
                    Some(Ok(mode)) => mode,
                    Some(Err(e)) => {
                        eprintln!("⚠️  {e}");
                        surface.prompt();
                        continue;
                    }
                };

                if let Err(AuditError::Busy) = driver.submit(url, mode).await {
                    warn!("Submission ignored: audit already in progress");
                }
                surface.flush();
                surface.prompt();
            }

            Some(input) = driver.next_input() => {
                let outcome = driver.handle(input);
                surface.flush();
                if matches!(outcome, Some(AttemptOutcome::Succeeded)) {
                    if let Err(e) = publish_report(driver, targets, options).await {
                        eprintln!("❌ {e:#}");
                    }
                }
                if outcome.is_some() {
                    surface.prompt();
                }
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = build_config(&args)?;
    let selector = create_selector(&config.transport).context("Failed to set up transport")?;

    let interactive = args.interactive || args.url.is_none();
    let (tx, rx) = mpsc::unbounded_channel();
    let mut driver = AuditDriver::new(selector, config.session_timeout, tx);
    let mut surface = Surface::new(rx, interactive);
    let targets = args.export_targets();

    match (interactive, args.url.as_deref()) {
        (false, Some(url)) => {
            run_once(&mut driver, &mut surface, url, args.mode, &targets, &config.export).await
        }
        _ => run_interactive(&mut driver, &mut surface, args.mode, &targets, &config.export).await,
    }
}
