//! Report content handling
//!
//! This module provides functions for:
//! - Compacting a JSON report into its canonical one-line form
//! - Writing that form to a per-task sidecar for the classifier
//! - Rewriting report files in place (the `compact` subcommand)

pub mod compact;
pub mod normalize;

pub use compact::{compact_files, compact_in_place, CompactOutcome, CompactStats};
pub use normalize::{to_compact, NormalizedPayload, Normalizer};
