//! Label coordinator - orchestrates one labelling run
//!
//! The coordinator is responsible for:
//! - Discovering the input reports
//! - Driving the worker pool and forwarding progress
//! - Signal handling (graceful shutdown)
//! - Writing the sorted report and optional timing file

use crate::classify::{Classifier, CommandClassifier};
use crate::config::LabelConfig;
use crate::content::Normalizer;
use crate::discovery::{scan_reports, DiscoveryStats};
use crate::error::{LabelerError, Result};
use crate::pool::WorkerPool;
use crate::report::{write_timing_file, ReportWriter};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of a completed run
#[derive(Debug)]
pub struct LabelRunResult {
    /// Reports discovered and submitted
    pub total_files: u64,

    /// Rows with a family label
    pub labeled: u64,

    /// Rows labelled `ERROR`
    pub errors: u64,

    /// Rows written to the report (always `total_files`)
    pub rows_written: u64,

    /// Distinct family labels
    pub families: usize,

    /// Total size of the input reports
    pub input_bytes: u64,

    /// Discovery statistics
    pub discovery: DiscoveryStats,

    /// Where the report was written
    pub output_path: PathBuf,

    /// Wall-clock time of the whole run
    pub duration: Duration,
}

/// Snapshot passed to progress callbacks
#[derive(Debug, Clone, Default)]
pub struct LabelProgress {
    pub completed: u64,
    pub total: u64,
    pub labeled: u64,
    pub errors: u64,
    pub elapsed: Duration,
}

impl LabelProgress {
    /// Completed files per second so far
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates discovery, the worker pool and report output
pub struct LabelCoordinator {
    /// Configuration
    config: Arc<LabelConfig>,

    /// Classifier shared by all workers
    classifier: Arc<dyn Classifier>,

    /// Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl LabelCoordinator {
    /// Create a coordinator that runs the configured external classifier
    pub fn new(config: LabelConfig) -> Self {
        let classifier = Arc::new(CommandClassifier::new(config.classifier.clone()));
        Self::with_classifier(config, classifier)
    }

    /// Create a coordinator with a custom classifier
    pub fn with_classifier(config: LabelConfig, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            config: Arc::new(config),
            classifier,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run without progress reporting
    pub fn run(&self) -> Result<LabelRunResult> {
        self.run_with_progress(|_| {})
    }

    /// Run, calling `on_progress` once before the first task and after every
    /// completed file
    pub fn run_with_progress<F>(&self, mut on_progress: F) -> Result<LabelRunResult>
    where
        F: FnMut(&LabelProgress),
    {
        let start_time = Instant::now();
        let start_datetime: DateTime<Utc> = Utc::now();
        let config = &self.config;

        info!(
            input = %config.input_dir.display(),
            workers = config.worker_count,
            classifier = %config.classifier.display_name(),
            started = %start_datetime.to_rfc3339(),
            "Starting labelling run"
        );

        let (files, discovery) = scan_reports(&config.input_dir, &config.scan)?;
        let total_files = files.len() as u64;
        let input_bytes = discovery.total_bytes;

        let pool = WorkerPool::new(
            config.worker_count,
            Normalizer::with_scratch_dir(config.scratch_dir.clone()),
            Arc::clone(&self.classifier),
        )
        .with_shutdown(Arc::clone(&self.shutdown));

        let mut progress = LabelProgress {
            total: total_files,
            ..Default::default()
        };
        on_progress(&progress);

        let outcome = pool.execute(files, |result| {
            progress.completed += 1;
            if result.label.is_error() {
                progress.errors += 1;
            } else {
                progress.labeled += 1;
            }
            progress.elapsed = start_time.elapsed();
            on_progress(&progress);
        })?;

        if outcome.interrupted || self.shutdown.load(Ordering::SeqCst) {
            info!(
                completed = outcome.results.len(),
                total = total_files,
                "Run interrupted, report not written"
            );
            return Err(LabelerError::Interrupted);
        }

        let mut families: Vec<&str> = outcome
            .results
            .iter()
            .filter(|r| !r.label.is_error())
            .map(|r| r.label.as_str())
            .collect();
        families.sort_unstable();
        families.dedup();
        let families = families.len();

        let summary = ReportWriter::new(&config.output_path).write(outcome.results)?;
        let duration = start_time.elapsed();

        // Report is committed by now; timing failures only warn
        if let Some(ref timing_path) = config.timing_file {
            match write_timing_file(timing_path, duration) {
                Ok(()) => debug!(path = %timing_path.display(), "Timing file written"),
                Err(e) => warn!(error = %e, "Timing file not written"),
            }
        }

        info!(
            files = total_files,
            labeled = outcome.labeled,
            errors = outcome.errors,
            families,
            output = %summary.path.display(),
            duration_ms = duration.as_millis() as u64,
            "Labelling run completed"
        );

        Ok(LabelRunResult {
            total_files,
            labeled: outcome.labeled,
            errors: outcome.errors,
            rows_written: summary.rows as u64,
            families,
            input_bytes,
            discovery,
            output_path: summary.path,
            duration,
        })
    }
}
