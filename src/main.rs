//! av-labeler - Parallel Malware Report Labeller
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use av_labeler::config::{CliArgs, Command, LabelConfig, ScanOptions};
use av_labeler::content::compact_files;
use av_labeler::discovery::scan_reports;
use av_labeler::progress::{print_compact_summary, print_header, print_summary, ProgressReporter};
use av_labeler::LabelCoordinator;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose, args.quiet)?;

    if let Some(Command::Compact {
        ref input_dir,
        ref extension,
        ref exclude_patterns,
    }) = args.command
    {
        let scan = ScanOptions::new(extension, exclude_patterns).context("Invalid configuration")?;
        return run_compact(input_dir, &scan, !args.quiet);
    }

    // Validate and create config
    let config = LabelConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(
            &config.input_dir.display().to_string(),
            config.worker_count,
            &config.classifier.display_name(),
            &config.output_path.display().to_string(),
        );
    }

    run_label(config)
}

/// Label every report and write the CSV
fn run_label(config: LabelConfig) -> Result<()> {
    let show_progress = config.show_progress;
    let coordinator = LabelCoordinator::new(config);

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let mut progress: Option<ProgressReporter> = None;
    let outcome = coordinator.run_with_progress(|snapshot| {
        if !show_progress {
            return;
        }
        progress
            .get_or_insert_with(|| ProgressReporter::new(snapshot.total))
            .update(snapshot);
    });

    if let Some(ref p) = progress {
        match &outcome {
            Ok(_) => p.finish("Labelling completed"),
            Err(_) => p.finish("Labelling stopped"),
        }
    }

    let result = outcome.context("Labelling failed")?;

    if show_progress {
        print_summary(&result);
    }

    if result.errors > 0 {
        info!(errors = result.errors, "Some reports were labelled ERROR");
    }

    Ok(())
}

/// Rewrite reports in place as compact JSON
fn run_compact(input_dir: &Path, scan: &ScanOptions, show_progress: bool) -> Result<()> {
    let start = Instant::now();

    let (files, _) = scan_reports(input_dir, scan)
        .with_context(|| format!("Cannot compact '{}'", input_dir.display()))?;

    let progress = show_progress.then(|| ProgressReporter::new(files.len() as u64));

    let stats = compact_files(&files, |_, _| {
        if let Some(ref p) = progress {
            p.inc();
        }
    });

    if let Some(ref p) = progress {
        p.finish("Compaction completed");
        print_compact_summary(&stats, start.elapsed());
    }

    info!(
        rewritten = stats.rewritten,
        unchanged = stats.unchanged,
        failed = stats.failed,
        "Compaction finished"
    );

    Ok(())
}

fn setup_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("av_labeler=debug,warn")
    } else if quiet {
        EnvFilter::new("av_labeler=warn")
    } else {
        EnvFilter::new("av_labeler=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
