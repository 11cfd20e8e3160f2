//! Configuration types for av-labeler
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - The classifier command line

use crate::error::ConfigError;
use clap::Parser;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Default input file extension
pub const DEFAULT_EXTENSION: &str = "json";

/// Default report file name, placed in the input directory
pub const DEFAULT_REPORT_NAME: &str = "label.csv";

/// Batch malware-report labeller
#[derive(Parser, Debug, Clone)]
#[command(
    name = "av-labeler",
    version,
    about = "Label a directory of malware reports with an external classifier",
    long_about = "Walks a directory of JSON malware-analysis reports, compacts each report into a\n\
                  temporary one-line file, runs the classifier on it in parallel and writes\n\
                  one 'fileName,label' row per report to a CSV file.\n\n\
                  Reports the classifier cannot label are recorded as ERROR.",
    after_help = "EXAMPLES:\n    \
        av-labeler ./reports\n    \
        av-labeler ./reports -o labels.csv -w 8\n    \
        av-labeler ./reports --classifier /opt/avclass/avclass --input-flag -f\n    \
        av-labeler ./reports --exclude 'quarantine' --timing-file time.txt\n    \
        av-labeler compact ./reports  # rewrite reports as one-line JSON",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct CliArgs {
    /// Directory containing report files
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: Option<PathBuf>,

    /// Subcommand (compact)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output CSV file (default: <INPUT_DIR>/label.csv)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Number of concurrent classifier invocations
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Extension of report files to label
    #[arg(long, default_value = DEFAULT_EXTENSION, value_name = "EXT")]
    pub extension: String,

    /// Classifier executable
    #[arg(long, default_value = "avclass", value_name = "PROGRAM")]
    pub classifier: OsString,

    /// Extra classifier argument, placed before the input flag (can be repeated)
    #[arg(
        long = "classifier-arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        action = clap::ArgAction::Append
    )]
    pub classifier_args: Vec<OsString>,

    /// Flag preceding the report path (empty to pass the path alone)
    #[arg(long, default_value = "-f", value_name = "FLAG", allow_hyphen_values = true)]
    pub input_flag: String,

    /// Directory for normalized temporary files (default: next to each report)
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Exclude paths matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Maximum directory depth (unlimited if not set)
    #[arg(short = 'd', long, value_name = "NUM")]
    pub max_depth: Option<usize>,

    /// Write the total execution time to this file
    #[arg(long, value_name = "FILE")]
    pub timing_file: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose output (show per-file errors and debug logs)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// Subcommands
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Rewrite report files in place as compact one-line JSON
    Compact {
        /// Directory containing report files
        #[arg(value_name = "DIR")]
        input_dir: PathBuf,

        /// Extension of report files to rewrite
        #[arg(long, default_value = DEFAULT_EXTENSION, value_name = "EXT")]
        extension: String,

        /// Exclude paths matching pattern (can be repeated)
        #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
        exclude_patterns: Vec<String>,
    },
}

fn default_workers() -> usize {
    // Classifier runs are dominated by process start-up and I/O
    num_cpus::get().saturating_mul(2).clamp(1, MAX_WORKERS)
}

/// How to invoke the external classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierCommand {
    /// Executable name or path
    pub program: OsString,

    /// Arguments placed before the input flag
    pub args: Vec<OsString>,

    /// Flag preceding the payload path, if any
    pub input_flag: Option<String>,
}

impl ClassifierCommand {
    /// `<program> -f <path>`, the avclass calling convention
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            input_flag: Some("-f".to_string()),
        }
    }

    /// Append an argument placed before the input flag
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the input flag (`None` passes the path alone)
    pub fn input_flag(mut self, flag: Option<String>) -> Self {
        self.input_flag = flag;
        self
    }

    /// Full argument vector for one payload
    pub fn argv(&self, payload: &Path) -> Vec<OsString> {
        let mut argv = self.args.clone();
        if let Some(flag) = &self.input_flag {
            argv.push(OsString::from(flag));
        }
        argv.push(payload.as_os_str().to_owned());
        argv
    }

    /// Program name for display and logs
    pub fn display_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

/// Options shared by every directory scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extension to match, lowercase, without the leading dot
    pub extension: String,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Maximum traversal depth
    pub max_depth: Option<usize>,
}

impl ScanOptions {
    /// Build validated scan options
    pub fn new(extension: &str, exclude_patterns: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            extension: normalize_extension(extension)?,
            exclude_patterns: compile_patterns(exclude_patterns)?,
            max_depth: None,
        })
    }

    /// Set the maximum traversal depth
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Check if a path should be excluded
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude_patterns.iter().any(|re| re.is_match(path))
    }

    /// Check if a file name carries the report extension
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            exclude_patterns: Vec::new(),
            max_depth: None,
        }
    }
}

/// Validated runtime configuration for a labelling run
#[derive(Debug, Clone)]
pub struct LabelConfig {
    /// Directory containing the reports
    pub input_dir: PathBuf,

    /// Report CSV path
    pub output_path: PathBuf,

    /// Number of worker threads
    pub worker_count: usize,

    /// Discovery options
    pub scan: ScanOptions,

    /// Classifier invocation
    pub classifier: ClassifierCommand,

    /// Where normalized sidecars are created (None = next to each report)
    pub scratch_dir: Option<PathBuf>,

    /// Execution time file
    pub timing_file: Option<PathBuf>,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl LabelConfig {
    /// Minimal configuration for labelling `input_dir` with `classifier`
    pub fn new(input_dir: impl Into<PathBuf>, classifier: ClassifierCommand) -> Self {
        let input_dir = input_dir.into();
        Self {
            output_path: default_output_path(&input_dir),
            input_dir,
            worker_count: default_workers(),
            scan: ScanOptions::default(),
            classifier,
            scratch_dir: None,
            timing_file: None,
            show_progress: false,
            verbose: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let input_dir = args.input_dir.ok_or(ConfigError::MissingInput)?;

        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        if args.classifier.is_empty() {
            return Err(ConfigError::EmptyClassifier);
        }

        if let Some(ref dir) = args.scratch_dir {
            if !dir.is_dir() {
                return Err(ConfigError::InvalidScratchDir { path: dir.clone() });
            }
        }

        let scan = ScanOptions::new(&args.extension, &args.exclude_patterns)?
            .with_max_depth(args.max_depth);

        let input_flag = Some(args.input_flag).filter(|flag| !flag.is_empty());
        let classifier = ClassifierCommand {
            program: args.classifier,
            args: args.classifier_args,
            input_flag,
        };

        let output_path = args
            .output
            .unwrap_or_else(|| default_output_path(&input_dir));

        Ok(Self {
            input_dir,
            output_path,
            worker_count: args.workers,
            scan,
            classifier,
            scratch_dir: args.scratch_dir,
            timing_file: args.timing_file,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }
}

/// Report path used when none is configured
pub fn default_output_path(input_dir: &Path) -> PathBuf {
    input_dir.join(DEFAULT_REPORT_NAME)
}

fn normalize_extension(extension: &str) -> Result<String, ConfigError> {
    let ext = extension.trim().trim_start_matches('.');
    if ext.is_empty() {
        return Err(ConfigError::InvalidExtension {
            extension: extension.to_string(),
            reason: "extension must not be empty".to_string(),
        });
    }
    if ext.contains(['/', '\\', '.']) {
        return Err(ConfigError::InvalidExtension {
            extension: extension.to_string(),
            reason: "expected a single suffix such as 'json'".to_string(),
        });
    }
    Ok(ext.to_ascii_lowercase())
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("av-labeler").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = LabelConfig::from_args(parse(&["reports", "-w", "8"])).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("reports"));
        assert_eq!(config.output_path, PathBuf::from("reports").join("label.csv"));
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.scan.extension, "json");
        assert_eq!(config.classifier.program, OsString::from("avclass"));
        assert_eq!(config.classifier.input_flag.as_deref(), Some("-f"));
        assert!(config.show_progress);
    }

    #[test]
    fn test_output_override() {
        let config = LabelConfig::from_args(parse(&["reports", "-o", "out.csv", "-q"])).unwrap();
        assert_eq!(config.output_path, PathBuf::from("out.csv"));
        assert!(!config.show_progress);
    }

    #[test]
    fn test_invalid_worker_count() {
        let err = LabelConfig::from_args(parse(&["reports", "-w", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { count: 0, .. }));

        let err = LabelConfig::from_args(parse(&["reports", "-w", "10000"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { .. }));
    }

    #[test]
    fn test_default_worker_count_is_valid() {
        let workers = default_workers();
        assert!((1..=MAX_WORKERS).contains(&workers));

        let config = LabelConfig::from_args(parse(&["reports"])).unwrap();
        assert_eq!(config.worker_count, workers);
    }

    #[test]
    fn test_missing_input() {
        let err = LabelConfig::from_args(parse(&["-w", "4"])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingInput));
    }

    #[test]
    fn test_extension_normalization() {
        let scan = ScanOptions::new(".JSON", &[]).unwrap();
        assert_eq!(scan.extension, "json");
        assert!(scan.matches_extension(Path::new("/data/a.json")));
        assert!(scan.matches_extension(Path::new("/data/b.Json")));
        assert!(!scan.matches_extension(Path::new("/data/.a.x1y2.tmp")));
        assert!(!scan.matches_extension(Path::new("/data/json")));

        assert!(ScanOptions::new("", &[]).is_err());
        assert!(ScanOptions::new("tar.gz", &[]).is_err());
    }

    #[test]
    fn test_exclude_pattern() {
        let scan = ScanOptions::new("json", &[r"quarantine".to_string()]).unwrap();
        assert!(scan.is_excluded("/data/quarantine/a.json"));
        assert!(!scan.is_excluded("/data/reports/a.json"));

        let err = ScanOptions::new("json", &["(".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExcludePattern { .. }));
    }

    #[test]
    fn test_classifier_argv() {
        let config = LabelConfig::from_args(parse(&[
            "reports",
            "--classifier",
            "sh",
            "--classifier-arg",
            "label.sh",
            "--input-flag",
            "",
        ]))
        .unwrap();
        let argv = config.classifier.argv(Path::new("/tmp/x.tmp"));
        assert_eq!(argv, vec![OsString::from("label.sh"), OsString::from("/tmp/x.tmp")]);

        let cmd = ClassifierCommand::new("avclass");
        assert_eq!(
            cmd.argv(Path::new("/tmp/y.tmp")),
            vec![OsString::from("-f"), OsString::from("/tmp/y.tmp")]
        );
    }

    #[test]
    fn test_compact_subcommand() {
        let args = parse(&["compact", "reports", "--extension", "report"]);
        match args.command {
            Some(Command::Compact {
                input_dir,
                extension,
                ..
            }) => {
                assert_eq!(input_dir, PathBuf::from("reports"));
                assert_eq!(extension, "report");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
