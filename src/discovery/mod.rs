//! Discovery of report files to label
//!
//! Walks the input directory recursively and returns every regular file
//! carrying the configured report extension. Leftover sidecars, the report
//! CSV and any other file are skipped without comment.

mod scanner;

pub use scanner::{scan_reports, DiscoveryStats, InputFile};
