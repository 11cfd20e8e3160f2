//! Classification of normalized reports
//!
//! [`Classifier`] is the seam between the worker pool and whatever produces
//! family labels. The production implementation, [`CommandClassifier`], runs
//! an external program once per report.

pub mod command;

pub use command::{parse_label, CommandClassifier};

use crate::error::ClassifierError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Label written for files that could not be classified
pub const ERROR_LABEL: &str = "ERROR";

/// Produces a family label for one normalized report
///
/// Implementations are shared by all workers and called concurrently, so a
/// call must not depend on state left behind by another call.
pub trait Classifier: Send + Sync {
    /// Classify the payload stored at `payload`
    fn classify(&self, payload: &Path) -> Result<String, ClassifierError>;
}

/// Outcome label for one report
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    /// Family token reported by the classifier
    Family(String),

    /// Normalization or classification failed
    Error,
}

impl Label {
    /// CSV representation
    pub fn as_str(&self) -> &str {
        match self {
            Label::Family(family) => family,
            Label::Error => ERROR_LABEL,
        }
    }

    /// Returns true for the error sentinel
    pub fn is_error(&self) -> bool {
        matches!(self, Label::Error)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single result produced for one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelResult {
    /// Report name without extension
    pub name: String,

    /// Classifier label or `ERROR`
    pub label: Label,

    /// Source report; orders rows that share a name
    pub source: PathBuf,
}

impl LabelResult {
    /// A successfully labelled report
    pub fn labeled(name: impl Into<String>, family: impl Into<String>, source: PathBuf) -> Self {
        Self {
            name: name.into(),
            label: Label::Family(family.into()),
            source,
        }
    }

    /// A report that could not be labelled
    pub fn failed(name: impl Into<String>, source: PathBuf) -> Self {
        Self {
            name: name.into(),
            label: Label::Error,
            source,
        }
    }
}
