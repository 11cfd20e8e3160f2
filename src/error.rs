//! Error types for av-labeler
//!
//! This module defines the error hierarchy for a labelling run:
//! - Discovery errors (bad input directory) - fatal
//! - Per-file task errors (read, parse, sidecar, classifier) - recovered as `ERROR`
//! - Worker pool errors - fatal
//! - Report output errors - fatal
//! - Configuration and CLI errors - fatal
//!
//! Per-file errors never leave the worker that produced them. Only the
//! variants reachable from [`LabelerError`] abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the av-labeler application
#[derive(Error, Debug)]
pub enum LabelerError {
    /// Input directory is missing or unusable
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] DiscoveryError),

    /// Worker pool could not complete the run
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] WorkerError),

    /// Report could not be written
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Interrupted by signal
    #[error("Operation interrupted by signal")]
    Interrupted,
}

/// Errors raised while locating input files
#[derive(Error, Debug, Clone)]
pub enum DiscoveryError {
    /// Root path does not exist
    #[error("Input directory '{path}' does not exist")]
    NotFound { path: PathBuf },

    /// Root path exists but is a file or something else
    #[error("Input path '{path}' is not a directory")]
    NotADirectory { path: PathBuf },

    /// Root directory cannot be read
    #[error("Cannot read input directory '{path}': {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Per-file failures. Each one turns into an `ERROR` label for its file.
#[derive(Error, Debug)]
pub enum TaskError {
    /// Input file could not be read
    #[error("Failed to read '{path}': {reason}")]
    Read { path: PathBuf, reason: String },

    /// Input file is not valid JSON
    #[error("Malformed input '{path}': {reason}")]
    MalformedInput { path: PathBuf, reason: String },

    /// Normalized sidecar could not be created or written
    #[error("Failed to write normalized copy of '{path}': {reason}")]
    Sidecar { path: PathBuf, reason: String },

    /// Classifier implementation panicked on this payload
    #[error("Classifier panicked on '{path}': {message}")]
    ClassifierPanicked { path: PathBuf, message: String },

    /// Classifier invocation failed
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

impl TaskError {
    /// Short machine-friendly tag used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Read { .. } => "read",
            TaskError::MalformedInput { .. } => "malformed_input",
            TaskError::Sidecar { .. } => "sidecar",
            TaskError::ClassifierPanicked { .. } => "classifier_panicked",
            TaskError::Classifier(ClassifierError::SpawnFailed { .. }) => "spawn_failed",
            TaskError::Classifier(ClassifierError::Failed { .. }) => "classifier_failed",
            TaskError::Classifier(ClassifierError::LabelParse { .. }) => "label_parse",
        }
    }
}

/// External classifier failures
#[derive(Error, Debug, Clone)]
pub enum ClassifierError {
    /// Process could not be started (missing executable, permissions)
    #[error("Failed to start classifier '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    /// Process ran but reported failure
    #[error("Classifier exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// Process succeeded but its output has no label token
    #[error("Cannot parse label from classifier output '{output}'")]
    LabelParse { output: String },
}

/// Worker pool errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker thread could not be started
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Fewer or more results than submitted tasks
    #[error("Collected {collected} results for {expected} tasks")]
    ResultsLost { expected: usize, collected: usize },

    /// Task channel rejected a submission
    #[error("Failed to submit task: queue closed")]
    QueueSendFailed,
}

/// Report output errors
#[derive(Error, Debug)]
pub enum OutputError {
    /// Staging file could not be created next to the destination
    #[error("Cannot create report '{path}': {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    /// Writing rows failed
    #[error("Failed to write report '{path}': {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    /// Atomic rename into place failed
    #[error("Failed to commit report '{path}': {reason}")]
    CommitFailed { path: PathBuf, reason: String },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No input directory given
    #[error("An input directory is required")]
    MissingInput,

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid file extension filter
    #[error("Invalid extension '{extension}': {reason}")]
    InvalidExtension { extension: String, reason: String },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Classifier program is empty
    #[error("Classifier program must not be empty")]
    EmptyClassifier,

    /// Scratch directory missing
    #[error("Scratch directory '{path}' does not exist")]
    InvalidScratchDir { path: PathBuf },
}

/// Result type alias for LabelerError
pub type Result<T> = std::result::Result<T, LabelerError>;

/// Result type alias for TaskError
pub type TaskResult<T> = std::result::Result<T, TaskError>;
