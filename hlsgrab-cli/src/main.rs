mod cli;
mod error;

use std::process;

use chrono::Local;
use clap::Parser;
use hlsgrab_engine::{GrabReport, HlsGrabber, LogHandle};
use tracing::{error, info, warn};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::Args;
use crate::error::{AppError, Result};

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose, args.quiet) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let log = LogHandle::start(args.log_path(), args.logger_config())?;
    let result = grab(&args, &log).await;

    log.shutdown().await;
    if log.dropped() > 0 {
        warn!(dropped = log.dropped(), path = %log.path().display(), "Some log records were not written");
    }

    let report = result?;
    println!("{report}");
    if args.strict && !report.is_complete() {
        return Err(AppError::Incomplete {
            failed: report.failed(),
            total: report.segments_total,
        });
    }
    Ok(())
}

async fn grab(args: &Args, log: &LogHandle) -> Result<GrabReport> {
    let grabber = HlsGrabber::new(args.grab_config(), log.clone())?;
    info!(manifest = %args.manifest_url, output = %args.output_dir.display(), "Starting grab");

    let report = grabber.run(&args.manifest_url).await?;
    for failure in &report.failures {
        warn!(
            url = %failure.url,
            stage = %failure.stage,
            retryable = failure.retryable,
            "{}",
            failure.reason
        );
    }
    Ok(report)
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("hlsgrab=debug,hlsgrab_engine=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("hlsgrab=info,hlsgrab_engine=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}
