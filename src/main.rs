//! fileinfo-logger - writes size, date and MD5 of every file in a directory
//! to an alphabetically ordered log.

use anyhow::{Context, Result};
use clap::Parser;
use fileinfo_logger::cli::{list_files, no_files_message, resolve_log_path};
use fileinfo_logger::{FileInfoLogger, LoggerConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "fileinfo-logger",
    version,
    about = "Collects file information for a directory into an alphabetically ordered log",
    after_help = "EXAMPLES:\n    \
        fileinfo-logger ./home\n    \
        fileinfo-logger ./home -o sums.log -w 8\n    \
        fileinfo-logger ./home --timeout 600 -v\n\n\
        Exits 0 on success, and >0 if an error occurs."
)]
struct CliArgs {
    /// Working directory whose files are logged
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// Log file (default: DIR/file_inf.log)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Number of worker threads (minimum 2)
    #[arg(short = 'w', long, value_name = "NUM")]
    workers: Option<usize>,

    /// Abort the run after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("An error occurred while collecting file information: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => LoggerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LoggerConfig::default(),
    };
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if let Some(secs) = args.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config.validate().context("Invalid configuration")?;

    let files = list_files(&args.dir)
        .with_context(|| format!("Cannot read directory {}", args.dir.display()))?;
    let log_path = resolve_log_path(&args.dir, args.output, &config);
    let logger = FileInfoLogger::new(files, &log_path).with_config(config);

    // The directory may hold nothing but a previous log; process() empties it.
    if logger.task_list().is_empty() {
        logger
            .process()
            .await
            .with_context(|| format!("Failed to clear {}", log_path.display()))?;
        println!("{}", no_files_message(&args.dir));
        return Ok(());
    }
    info!(files = logger.task_list().len(), log = %log_path.display(), "Collecting file information");

    let report = logger
        .process()
        .await
        .with_context(|| format!("Failed to write {}", log_path.display()))?;

    println!("Result saved to {} file", report.log_path.display());
    Ok(())
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("fileinfo_logger=debug,warn")
        } else {
            EnvFilter::new("fileinfo_logger=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
