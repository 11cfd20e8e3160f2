//! External classifier process
//!
//! Each call spawns its own child process with an explicit argument vector,
//! so report paths are never interpreted by a shell. stdin is closed and
//! stdout/stderr are captured in full.

use super::Classifier;
use crate::config::ClassifierCommand;
use crate::error::ClassifierError;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, trace};

/// Longest stdout/stderr excerpt kept in error messages
const MAX_EXCERPT_CHARS: usize = 200;

/// Runs `<program> [args...] [flag] <payload>` for every report
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    command: ClassifierCommand,
}

impl CommandClassifier {
    /// Create a classifier from a command description
    pub fn new(command: ClassifierCommand) -> Self {
        Self { command }
    }
}

impl Classifier for CommandClassifier {
    fn classify(&self, payload: &Path) -> Result<String, ClassifierError> {
        let argv = self.command.argv(payload);
        trace!(program = %self.command.display_name(), args = ?argv, "Running classifier");

        let output = Command::new(&self.command.program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ClassifierError::SpawnFailed {
                program: self.command.display_name(),
                reason: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(ClassifierError::Failed {
                status: describe_status(output.status),
                stderr: excerpt(&stderr),
            });
        }

        if !stderr.trim().is_empty() {
            debug!(payload = %payload.display(), stderr = %excerpt(&stderr), "Classifier wrote to stderr");
        }

        parse_label(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Extract the label: the second whitespace-separated token of `stdout`
pub fn parse_label(stdout: &str) -> Result<String, ClassifierError> {
    stdout
        .split_whitespace()
        .nth(1)
        .map(str::to_owned)
        .ok_or_else(|| ClassifierError::LabelParse {
            output: excerpt(stdout),
        })
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => format!("{} (no exit code)", status),
    }
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_EXCERPT_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_EXCERPT_CHARS).collect();
        format!("{}...", head)
    }
}
