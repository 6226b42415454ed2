// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Exposure Scanner - Sensitive Artifact Discovery
 * Standalone CLI for finding exposed backups, VCS metadata and credentials
 *
 * Features:
 * - Wordlist and directory-listing driven candidate discovery
 * - Adaptive concurrency with automatic backoff
 * - Extension, path and archive-signature detection
 * - CSV (UTF-8 BOM) and JSON reports
 *
 * (c) 2026 Bountyy Oy
 */

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use exposure_scanner::config::{load_config_with_overrides, parse_target_list};
use exposure_scanner::reporting::{ReportConfig, ReportEngine, ReportFormat};
use exposure_scanner::{RiskLevel, ScanEngine};

/// Exposure Scanner - finds sensitive files left on web servers
#[derive(Parser)]
#[command(name = "exposure-scan")]
#[command(author = "Bountyy Oy <info@bountyy.fi>")]
#[command(version)]
#[command(about = "Scan web targets for exposed backups, VCS metadata and credential files", long_about = None)]
struct Cli {
    /// File with one target per line (prompted for when omitted)
    targets_file: Option<PathBuf>,

    /// Configuration file path (YAML, TOML or JSON)
    #[arg(short, long, env = "SCANNER_CONFIG")]
    config: Option<PathBuf>,

    /// Output file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "csv")]
    format: OutputFormat,

    /// Only report findings at or above this risk level
    #[arg(long)]
    min_risk: Option<RiskArg>,

    /// Leave out findings from responses that looked like error pages
    #[arg(long)]
    exclude_tentative: bool,

    /// Append-mode log file
    #[arg(long, default_value = "scan.log")]
    log_file: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - only show errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Csv => ReportFormat::Csv,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum RiskArg {
    Low,
    Medium,
    High,
}

impl From<RiskArg> for RiskLevel {
    fn from(risk: RiskArg) -> Self {
        match risk {
            RiskArg::Low => RiskLevel::Low,
            RiskArg::Medium => RiskLevel::Medium,
            RiskArg::High => RiskLevel::High,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    // Interactive mode reads the target file path from stdin
    let targets_file = match &cli.targets_file {
        Some(path) => path.clone(),
        None => prompt_target_file()?,
    };

    // Create async runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("exposure-scanner")
        .enable_all()
        .build()?;

    let result = runtime.block_on(async_main(cli, targets_file));
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.debug {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    // Dependencies stay at warn unless RUST_LOG says otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,html5ever=warn,selectors=warn",
            level
        ))
    });

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cli.log_file)
        .with_context(|| format!("Failed to open log file {}", cli.log_file.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(cli.verbose || cli.debug)
                .with_thread_ids(false),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(log_file)),
        )
        .init();

    Ok(())
}

fn prompt_target_file() -> Result<PathBuf> {
    println!("\nExposure scanner - interactive mode");
    println!("----------------------------------------");
    print!("Target file path: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read target file path")?;

    let path = line.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if path.is_empty() {
        anyhow::bail!("No target file given");
    }
    Ok(PathBuf::from(path))
}

async fn async_main(cli: Cli, targets_file: PathBuf) -> Result<()> {
    let config = load_config_with_overrides(cli.config.as_deref())?;

    let content = tokio::fs::read_to_string(&targets_file)
        .await
        .with_context(|| format!("Failed to read target file {}", targets_file.display()))?;

    let (targets, rejected) = parse_target_list(&content, &config.forbidden_ports);
    if !rejected.is_empty() {
        warn!("{} target lines rejected", rejected.len());
    }
    if targets.is_empty() {
        anyhow::bail!("No valid targets in {}", targets_file.display());
    }

    info!("Loaded {} targets from {}", targets.len(), targets_file.display());

    let engine = ScanEngine::new(config).context("Failed to initialize scan engine")?;

    let token = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping scan...");
            token.cancel();
        }
    });

    let summary = engine.run(targets).await?;

    let format: ReportFormat = cli.format.into();
    let report_config = ReportConfig {
        format,
        min_risk: cli.min_risk.map(RiskLevel::from),
        include_tentative: !cli.exclude_tentative,
    };

    // Partial results are still reported after an abort
    let reporter = ReportEngine::new();
    let output = reporter.generate_report(&summary, &report_config)?;
    let path = cli.output.unwrap_or_else(|| default_report_path(format));
    reporter.write_report(&output, &path).await?;

    print_summary(&summary, &path);
    Ok(())
}

fn default_report_path(format: ReportFormat) -> PathBuf {
    PathBuf::from(format!(
        "安全扫描报告_{}.{}",
        chrono::Local::now().format("%Y%m%d_%H%M"),
        format.extension()
    ))
}

fn print_summary(summary: &exposure_scanner::ScanSummary, report: &Path) {
    let high = summary
        .findings
        .iter()
        .filter(|f| f.risk == RiskLevel::High)
        .count();

    println!();
    println!("Targets:    {}", summary.targets);
    println!("Candidates: {} ({} duplicates skipped)", summary.stats.candidates, summary.stats.duplicates);
    println!("Fetched:    {}", summary.stats.dispatched);
    println!("Findings:   {} ({} high)", summary.findings.len(), high);
    println!("Duration:   {:.1}s", summary.duration_seconds);
    if let Some(reason) = &summary.aborted {
        println!("Aborted:    {}", reason);
    }
    println!("Report:     {}", report.display());
}
