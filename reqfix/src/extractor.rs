//! Structured extraction of conflict diagnostics.

use std::{
    fs::{self, File},
    process::{Command, Stdio},
    time::{Duration, Instant},
};

use log::debug;
use reqfix_types::Name;
use serde::{Deserialize, Serialize};

/// How often a running extractor child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The request handed to an extractor command on stdin.
#[derive(Debug, Serialize)]
struct ExtractorRequest<'a> {
    stdout: &'a str,
    stderr: &'a str,
    direct_names: Vec<String>,
}

/// The schema-typed report returned by a [`DiagnosticExtractor`].
///
/// All fields are optional on the wire; missing fields deserialise to their
/// empty forms.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ExtractorReport {
    /// Names of direct packages implicated in the conflict.
    #[serde(default)]
    pub involved_direct: Vec<String>,
    /// The transitive package at the centre of the conflict, if one is
    /// clearly identifiable.
    #[serde(default)]
    pub culprit_name: Option<String>,
    /// A summary of the conflicting specifiers observed for the culprit.
    #[serde(default)]
    pub culprit_specs: Option<String>,
}

/// The error that can occur when running a diagnostic extractor.
///
/// Extractor errors are never surfaced to the user; the caller degrades to
/// pattern-matching on the resolver output instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExtractorError {
    /// Running the extractor command failed.
    #[error("Failed running extractor command: {0}")]
    Io(#[from] std::io::Error),

    /// The extractor did not finish within its timeout.
    #[error("Extractor timed out after {0} seconds")]
    Timeout(u64),

    /// The extractor exited unsuccessfully.
    #[error("Extractor exited with failure: {0}")]
    Failed(String),

    /// The extractor's output did not match the report schema.
    #[error("Malformed extractor report: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A capability to turn resolver diagnostics into an [`ExtractorReport`].
pub trait DiagnosticExtractor {
    /// Extracts structured conflict information from resolver output.
    ///
    /// # Errors
    ///
    /// Returns an error if the extractor is unavailable or produced output
    /// that does not match the report schema.
    fn extract(
        &self,
        stdout: &str,
        stderr: &str,
        direct_names: &[Name],
    ) -> Result<ExtractorReport, ExtractorError>;
}

/// A [`DiagnosticExtractor`] that delegates to an external command.
///
/// The command receives an `ExtractorRequest` as JSON on stdin and must
/// print an [`ExtractorReport`] as JSON on stdout. Both streams are routed
/// through files in a per-invocation temporary directory, so neither side
/// can stall on a pipe.
#[derive(Clone, Debug)]
pub struct CommandExtractor {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandExtractor {
    /// Creates a new [`CommandExtractor`] from a command line.
    ///
    /// `command_line` is split on whitespace; the first token is the
    /// program, the rest are passed as arguments. Returns [`None`] for an
    /// empty command line.
    pub fn new(command_line: &str, timeout: Duration) -> Option<Self> {
        let command: Vec<String> = command_line
            .split_whitespace()
            .map(ToString::to_string)
            .collect();
        if command.is_empty() {
            None
        } else {
            Some(CommandExtractor { command, timeout })
        }
    }
}

impl DiagnosticExtractor for CommandExtractor {
    fn extract(
        &self,
        stdout: &str,
        stderr: &str,
        direct_names: &[Name],
    ) -> Result<ExtractorReport, ExtractorError> {
        let temp_dir = tempfile::Builder::new().prefix("reqfix-extractor-").tempdir()?;
        let request_path = temp_dir.path().join("request.json");
        let report_path = temp_dir.path().join("report.json");
        let log_path = temp_dir.path().join("stderr.log");

        let request = ExtractorRequest {
            stdout,
            stderr,
            direct_names: direct_names.iter().map(ToString::to_string).collect(),
        };
        fs::write(&request_path, serde_json::to_vec(&request)?)?;

        let mut child = Command::new(&self.command[0])
            .args(&self.command[1..])
            .stdin(Stdio::from(File::open(&request_path)?))
            .stdout(Stdio::from(File::create(&report_path)?))
            .stderr(Stdio::from(File::create(&log_path)?))
            .spawn()?;
        debug!("Spawned extractor command '{}'", self.command.join(" "));

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                child.kill()?;
                child.wait()?;
                return Err(ExtractorError::Timeout(self.timeout.as_secs()));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(ExtractorError::Failed(fs::read_to_string(&log_path)?));
        }

        let report = serde_json::from_str(&fs::read_to_string(&report_path)?)?;
        Ok(report)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{path::Path, path::PathBuf, str::FromStr};

    use super::*;

    fn fake_extractor(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-extractor");
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn names() -> Vec<Name> {
        vec![Name::from_str("flask").unwrap()]
    }

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(CommandExtractor::new("  ", Duration::from_secs(1)).is_none());
    }

    #[test]
    fn report_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_extractor(
            dir.path(),
            r#"echo '{"involved_direct": ["flask"], "culprit_name": "jinja2", "culprit_specs": "<3.1; >=2.10.1"}'"#,
        );
        let extractor =
            CommandExtractor::new(script.to_str().unwrap(), Duration::from_secs(5)).unwrap();
        let report = extractor.extract("out", "err", &names()).unwrap();
        assert_eq!(report.involved_direct, vec!["flask".to_string()]);
        assert_eq!(report.culprit_name.as_deref(), Some("jinja2"));
        assert_eq!(report.culprit_specs.as_deref(), Some("<3.1; >=2.10.1"));
    }

    #[test]
    fn request_is_fed_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        // `cat` echoes the request back; it only parses as a (fully
        // defaulted) report if the request actually arrived on stdin.
        let script = fake_extractor(dir.path(), "cat");
        let extractor =
            CommandExtractor::new(script.to_str().unwrap(), Duration::from_secs(5)).unwrap();
        let report = extractor.extract("out", "err", &names()).unwrap();
        assert_eq!(report, ExtractorReport::default());
    }

    #[test]
    fn garbage_output_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_extractor(dir.path(), "echo 'this is not JSON'");
        let extractor =
            CommandExtractor::new(script.to_str().unwrap(), Duration::from_secs(5)).unwrap();
        let error = extractor.extract("out", "err", &names()).unwrap_err();
        assert!(matches!(error, ExtractorError::Malformed(_)));
    }

    #[test]
    fn nonzero_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_extractor(dir.path(), "echo broken >&2; exit 3");
        let extractor =
            CommandExtractor::new(script.to_str().unwrap(), Duration::from_secs(5)).unwrap();
        let error = extractor.extract("out", "err", &names()).unwrap_err();
        assert!(matches!(error, ExtractorError::Failed(message) if message.contains("broken")));
    }

    #[test]
    fn slow_extractor_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_extractor(dir.path(), "sleep 30");
        let extractor =
            CommandExtractor::new(script.to_str().unwrap(), Duration::from_millis(200)).unwrap();
        let error = extractor.extract("out", "err", &names()).unwrap_err();
        assert!(matches!(error, ExtractorError::Timeout(_)));
    }
}
