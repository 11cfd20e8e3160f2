//! Report normalization
//!
//! Every report is parsed as JSON and re-serialized without insignificant
//! whitespace before it reaches the classifier. Object keys come out in
//! sorted order, so equal documents always produce equal bytes. Numbers keep
//! their original text, including values outside the range of `f64`/`u64`.
//!
//! The compact bytes are written to a sidecar file whose name is unique per
//! task (`.<stem>.<random>.tmp`). The sidecar lives exactly as long as the
//! [`NormalizedPayload`] that owns it.

use crate::discovery::InputFile;
use crate::error::{TaskError, TaskResult};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::trace;

/// Longest stem kept in a sidecar name
const MAX_PREFIX_CHARS: usize = 64;

/// Sidecar suffix; never matches a report extension
pub const SIDECAR_SUFFIX: &str = ".tmp";

/// Parse `raw` as JSON and return its compact form
pub fn to_compact(raw: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let document: Value = serde_json::from_slice(raw)?;
    serde_json::to_vec(&document)
}

/// A compacted report stored in a private temporary file
///
/// Dropping the payload deletes the file.
#[derive(Debug)]
pub struct NormalizedPayload {
    file: NamedTempFile,
}

impl NormalizedPayload {
    /// Location handed to the classifier
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the sidecar, reporting deletion failures
    pub fn release(self) -> std::io::Result<()> {
        self.file.close()
    }
}

/// Produces sidecar payloads for classifier runs
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    scratch_dir: Option<PathBuf>,
}

impl Normalizer {
    /// Place sidecars next to their reports
    pub fn new() -> Self {
        Self::default()
    }

    /// Place sidecars in `dir` instead of next to their reports
    pub fn with_scratch_dir(dir: Option<PathBuf>) -> Self {
        Self { scratch_dir: dir }
    }

    /// Compact one report into a fresh sidecar
    pub fn normalize(&self, input: &InputFile) -> TaskResult<NormalizedPayload> {
        let raw = std::fs::read(&input.path).map_err(|e| TaskError::Read {
            path: input.path.clone(),
            reason: e.to_string(),
        })?;

        let compact = to_compact(&raw).map_err(|e| TaskError::MalformedInput {
            path: input.path.clone(),
            reason: e.to_string(),
        })?;

        let sidecar_err = |e: std::io::Error| TaskError::Sidecar {
            path: input.path.clone(),
            reason: e.to_string(),
        };

        let mut file = tempfile::Builder::new()
            .prefix(&sidecar_prefix(&input.name))
            .suffix(SIDECAR_SUFFIX)
            .tempfile_in(self.sidecar_dir(&input.path))
            .map_err(sidecar_err)?;

        file.write_all(&compact)
            .and_then(|()| file.flush())
            .map_err(sidecar_err)?;

        trace!(
            file = %input.name,
            sidecar = %file.path().display(),
            bytes = compact.len(),
            "Report normalized"
        );

        Ok(NormalizedPayload { file })
    }

    fn sidecar_dir<'a>(&'a self, report: &'a Path) -> &'a Path {
        match &self.scratch_dir {
            Some(dir) => dir,
            None => report
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new(".")),
        }
    }
}

/// Hidden, length-limited prefix derived from the report stem
fn sidecar_prefix(name: &str) -> String {
    let stem: String = name.chars().take(MAX_PREFIX_CHARS).collect();
    format!(".{}.", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn report(dir: &Path, file_name: &str, content: &str) -> InputFile {
        let path = dir.join(file_name);
        fs::write(&path, content).unwrap();
        InputFile::new(path, content.len() as u64)
    }

    #[test]
    fn test_to_compact_strips_whitespace_and_sorts_keys() {
        let raw = br#"{
            "sha256" : "abc",
            "av_labels" : [ [ "Kaspersky", "Trojan.Win32.Generic" ] ],
            "md5": "def"
        }"#;
        let compact = to_compact(raw).unwrap();
        assert_eq!(
            String::from_utf8(compact).unwrap(),
            r#"{"av_labels":[["Kaspersky","Trojan.Win32.Generic"]],"md5":"def","sha256":"abc"}"#
        );
    }

    #[test]
    fn test_to_compact_is_idempotent() {
        let once = to_compact(br#"{ "b": 1, "a": [1, 2, {"c": null}] }"#).unwrap();
        let twice = to_compact(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_to_compact_keeps_number_text() {
        let raw = br#"{ "first_seen" : 123456789012345678901234567890, "ratio" : 1e400, "score" : 0.1 }"#;
        assert_eq!(
            String::from_utf8(to_compact(raw).unwrap()).unwrap(),
            r#"{"first_seen":123456789012345678901234567890,"ratio":1e400,"score":0.1}"#
        );
    }

    #[test]
    fn test_to_compact_rejects_malformed() {
        assert!(to_compact(b"{\"a\": ").is_err());
        assert!(to_compact(b"").is_err());
        assert!(to_compact(b"not json").is_err());
    }

    #[test]
    fn test_normalize_writes_sidecar_next_to_report() {
        let dir = tempdir().unwrap();
        let input = report(dir.path(), "a.json", "{ \"family\" : \"FAMILY1\" }");

        let payload = Normalizer::new().normalize(&input).unwrap();
        let sidecar = payload.path().to_path_buf();

        assert_eq!(sidecar.parent(), Some(dir.path()));
        let file_name = sidecar.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with(".a."));
        assert!(file_name.ends_with(".tmp"));
        assert_eq!(fs::read_to_string(&sidecar).unwrap(), r#"{"family":"FAMILY1"}"#);

        payload.release().unwrap();
        assert!(!sidecar.exists());
    }

    #[test]
    fn test_drop_removes_sidecar() {
        let dir = tempdir().unwrap();
        let input = report(dir.path(), "a.json", "{}");

        let sidecar = {
            let payload = Normalizer::new().normalize(&input).unwrap();
            payload.path().to_path_buf()
        };
        assert!(!sidecar.exists());
    }

    #[test]
    fn test_sidecars_are_unique_for_equal_stems() {
        let dir = tempdir().unwrap();
        let input = report(dir.path(), "same.json", "{}");
        let normalizer = Normalizer::with_scratch_dir(Some(dir.path().to_path_buf()));

        let first = normalizer.normalize(&input).unwrap();
        let second = normalizer.normalize(&input).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_normalize_malformed_input() {
        let dir = tempdir().unwrap();
        let input = report(dir.path(), "c.json", "{ corrupt");

        let err = Normalizer::new().normalize(&input).unwrap_err();
        assert!(matches!(err, TaskError::MalformedInput { .. }));

        // No sidecar is created for a malformed report
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(SIDECAR_SUFFIX)
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_normalize_missing_file() {
        let dir = tempdir().unwrap();
        let input = InputFile::new(dir.path().join("gone.json"), 0);
        let err = Normalizer::new().normalize(&input).unwrap_err();
        assert!(matches!(err, TaskError::Read { .. }));
    }

    #[test]
    fn test_sidecar_prefix_is_bounded() {
        let long = "x".repeat(300);
        assert_eq!(sidecar_prefix(&long).len(), MAX_PREFIX_CHARS + 2);
        assert_eq!(sidecar_prefix("a"), ".a.");
    }
}
