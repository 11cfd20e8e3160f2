//! av-labeler - Parallel Malware Report Labeller
//!
//! Labels a directory of JSON malware-analysis reports with an external
//! family classifier (AVClass by default) and writes the labels to a CSV
//! file, one row per report.
//!
//! # Features
//!
//! - **Parallel Classification**: A bounded pool of worker threads, each
//!   running its own classifier process per report.
//!
//! - **Normalized Input**: Every report is compacted to one-line JSON in a
//!   private sidecar file before the classifier sees it. Sidecars are always
//!   removed.
//!
//! - **Failure Isolation**: A report that cannot be read, parsed or
//!   classified is labelled `ERROR`; the rest of the run carries on.
//!
//! - **Deterministic Output**: Rows are sorted by file name and the CSV is
//!   replaced atomically, so repeated runs produce identical files.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Input Directory                              │
//! │                 (*.json, walked by walkdir)                      │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               │ one task per report
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Worker Threads                              │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐     │
//! │  │Worker 1 │  │Worker 2 │  │Worker 3 │  ...    │Worker N │     │
//! │  │normalize│  │normalize│  │normalize│         │normalize│     │
//! │  │classify │  │classify │  │classify │         │classify │     │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘     │
//! │       └────────────┴─────┬──────┴────────────────────┘          │
//! │                          ▼                                      │
//! │            ┌──────────────────────────┐                         │
//! │            │     Result Channel       │                         │
//! │            │  (completion order)      │                         │
//! │            └──────────────────────────┘                         │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ sort by name
//!                               ▼
//!                    ┌──────────────────┐
//!                    │   label.csv      │
//!                    │ fileName,label   │
//!                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Label every report under ./reports into ./reports/label.csv
//! av-labeler ./reports
//!
//! # Custom classifier location and output file
//! av-labeler ./reports --classifier /opt/avclass/avclass -o labels.csv -w 16
//!
//! # Rewrite reports as compact JSON once, ahead of repeated runs
//! av-labeler compact ./reports
//! ```

pub mod classify;
pub mod config;
pub mod content;
pub mod discovery;
pub mod error;
pub mod pool;
pub mod progress;
pub mod report;

pub use classify::{Classifier, CommandClassifier, Label, LabelResult, ERROR_LABEL};
pub use config::{CliArgs, ClassifierCommand, LabelConfig, ScanOptions};
pub use error::{LabelerError, Result};
pub use pool::{LabelCoordinator, LabelProgress, LabelRunResult, WorkerPool};
pub use report::ReportWriter;
