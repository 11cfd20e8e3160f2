//! Directory scanner for report discovery

use crate::config::ScanOptions;
use crate::error::DiscoveryError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A report file found under the input directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Absolute path to the report
    pub path: PathBuf,

    /// File name with the extension removed (the CSV `fileName` column)
    pub name: String,

    /// Size in bytes at discovery time
    pub size: u64,
}

impl InputFile {
    /// Describe a report at `path`
    pub fn new(path: PathBuf, size: u64) -> Self {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name, size }
    }
}

/// Final statistics from discovery
#[derive(Debug, Clone, Default)]
pub struct DiscoveryStats {
    /// Files with the report extension
    pub matched: u64,

    /// Files skipped (other extensions, excluded, not regular files)
    pub ignored: u64,

    /// Entries that could not be read
    pub errors: u64,

    /// Sum of matched file sizes
    pub total_bytes: u64,

    /// Time spent walking
    pub duration: Duration,
}

/// Find every report file under `root`
///
/// Fails only when `root` itself is unusable. Unreadable entries below the
/// root are logged and counted in [`DiscoveryStats::errors`].
pub fn scan_reports(
    root: &Path,
    options: &ScanOptions,
) -> Result<(Vec<InputFile>, DiscoveryStats), DiscoveryError> {
    let start = Instant::now();
    let root = validate_root(root)?;

    // walkdir depth 0 is the root itself, so files directly inside it are depth 1
    let mut walker = WalkDir::new(&root).follow_links(false).sort_by_file_name();
    if let Some(depth) = options.max_depth {
        walker = walker.max_depth(depth.saturating_add(1));
    }

    let mut files = Vec::new();
    let mut stats = DiscoveryStats::default();

    // Exclude patterns see the path relative to the root
    let entries = walker.into_iter().filter_entry(|entry| {
        let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
        entry.depth() == 0 || !options.is_excluded(&relative.to_string_lossy())
    });

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                stats.errors += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if !options.matches_extension(entry.path()) {
            stats.ignored += 1;
            continue;
        }

        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "No metadata for report");
                0
            }
        };

        stats.matched += 1;
        stats.total_bytes += size;
        files.push(InputFile::new(entry.into_path(), size));
    }

    stats.duration = start.elapsed();

    info!(
        root = %root.display(),
        files = stats.matched,
        ignored = stats.ignored,
        errors = stats.errors,
        "Discovery completed"
    );

    Ok((files, stats))
}

/// Resolve the root to an absolute directory path
fn validate_root(root: &Path) -> Result<PathBuf, DiscoveryError> {
    let metadata = std::fs::metadata(root).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DiscoveryError::NotFound {
            path: root.to_path_buf(),
        },
        _ => DiscoveryError::Unreadable {
            path: root.to_path_buf(),
            reason: e.to_string(),
        },
    })?;

    if !metadata.is_dir() {
        return Err(DiscoveryError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    // Surface permission problems on the root before any work is scheduled
    std::fs::read_dir(root).map_err(|e| DiscoveryError::Unreadable {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;

    root.canonicalize().map_err(|e| DiscoveryError::Unreadable {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })
}
