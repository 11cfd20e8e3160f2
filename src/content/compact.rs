//! In-place report compaction
//!
//! Rewrites report files as one-line JSON so later classifier runs can read
//! them directly. Each rewrite goes through a temporary file in the same
//! directory followed by an atomic rename, keeping the original permissions.

use super::normalize::to_compact;
use crate::discovery::InputFile;
use crate::error::{TaskError, TaskResult};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// What happened to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactOutcome {
    /// File content was replaced with its compact form
    Rewritten,

    /// File was already compact
    Unchanged,
}

/// Totals for a compaction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactStats {
    pub rewritten: u64,
    pub unchanged: u64,
    pub failed: u64,
}

impl CompactStats {
    fn record(&mut self, outcome: &TaskResult<CompactOutcome>) {
        match outcome {
            Ok(CompactOutcome::Rewritten) => self.rewritten += 1,
            Ok(CompactOutcome::Unchanged) => self.unchanged += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Replace the report at `path` with its compact JSON form
pub fn compact_in_place(path: &Path) -> TaskResult<CompactOutcome> {
    let raw = std::fs::read(path).map_err(|e| TaskError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let compact = to_compact(&raw).map_err(|e| TaskError::MalformedInput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if compact == raw {
        return Ok(CompactOutcome::Unchanged);
    }

    let write_err = |e: std::io::Error| TaskError::Sidecar {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut staged = tempfile::Builder::new()
        .prefix(".compact.")
        .suffix(super::normalize::SIDECAR_SUFFIX)
        .tempfile_in(dir)
        .map_err(write_err)?;

    let permissions = std::fs::metadata(path).map_err(write_err)?.permissions();
    staged
        .as_file()
        .set_permissions(permissions)
        .map_err(write_err)?;

    staged.write_all(&compact).map_err(write_err)?;
    staged.as_file().sync_all().map_err(write_err)?;
    staged.persist(path).map_err(|e| write_err(e.error))?;

    Ok(CompactOutcome::Rewritten)
}

/// Compact every file, calling `on_file` after each one
///
/// A file that fails is logged and counted; it never stops the pass.
pub fn compact_files<F>(files: &[InputFile], mut on_file: F) -> CompactStats
where
    F: FnMut(&InputFile, &TaskResult<CompactOutcome>),
{
    let mut stats = CompactStats::default();

    for file in files {
        let outcome = compact_in_place(&file.path);
        match &outcome {
            Ok(result) => debug!(file = %file.name, outcome = ?result, "Report compacted"),
            Err(e) => warn!(file = %file.name, kind = e.kind(), error = %e, "Report not compacted"),
        }
        stats.record(&outcome);
        on_file(file, &outcome);
    }

    stats
}
