//! CSV report writer
//!
//! The report is staged in a temporary file next to its destination and
//! renamed into place only after every row has been written and synced. A
//! failed write leaves any previous report untouched.

use crate::classify::LabelResult;
use crate::error::OutputError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Header row of every report
pub const REPORT_HEADER: [&str; 2] = ["fileName", "label"];

/// Summary of a written report
#[derive(Debug, Clone)]
pub struct ReportSummary {
    /// Final location of the report
    pub path: PathBuf,

    /// Data rows written (header excluded)
    pub rows: usize,
}

/// Writes label results as a sorted `fileName,label` CSV
#[derive(Debug, Clone)]
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sort `results` and replace the report with them
    pub fn write(&self, mut results: Vec<LabelResult>) -> Result<ReportSummary, OutputError> {
        sort_results(&mut results);

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| OutputError::CreateFailed {
                path: self.path.clone(),
                reason: "path has no file name".to_string(),
            })?
            .to_string_lossy()
            .into_owned();

        let staged = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".tmp")
            .tempfile_in(self.staging_dir())
            .map_err(|e| OutputError::CreateFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let write_failed = |reason: String| OutputError::WriteFailed {
            path: self.path.clone(),
            reason,
        };

        let mut csv_writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(staged);

        csv_writer
            .write_record(REPORT_HEADER)
            .map_err(|e| write_failed(e.to_string()))?;
        for result in &results {
            csv_writer
                .write_record([result.name.as_str(), result.label.as_str()])
                .map_err(|e| write_failed(e.to_string()))?;
        }

        let staged = csv_writer
            .into_inner()
            .map_err(|e| write_failed(e.error().to_string()))?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| write_failed(e.to_string()))?;

        // Dropping the PersistError removes the staged file
        staged
            .persist(&self.path)
            .map_err(|e| OutputError::CommitFailed {
                path: self.path.clone(),
                reason: e.error.to_string(),
            })?;

        debug!(path = %self.path.display(), rows = results.len(), "Report written");

        Ok(ReportSummary {
            path: self.path.clone(),
            rows: results.len(),
        })
    }

    fn staging_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

/// Order rows by name (byte-wise), then by source path
pub fn sort_results(results: &mut [LabelResult]) {
    results.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.source.cmp(&b.source)));
}
