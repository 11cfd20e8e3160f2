//! Report output: the label CSV and the optional timing file

mod writer;

pub use writer::{sort_results, ReportSummary, ReportWriter, REPORT_HEADER};

use crate::error::OutputError;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Record the wall-clock duration of a run as `Execution Time: <secs> seconds`
pub fn write_timing_file(path: &Path, duration: Duration) -> Result<(), OutputError> {
    let line = format!("Execution Time: {:.3} seconds\n", duration.as_secs_f64());
    fs::write(path, line).map_err(|e| OutputError::WriteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
