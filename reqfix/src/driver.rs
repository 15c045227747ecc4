//! Invocation of the external resolver.

use std::{
    fs::{self, File},
    path::PathBuf,
    process::{Command, Stdio},
    time::{Duration, Instant},
};

use log::debug;
use reqfix_types::RequirementSet;
use which::which;

use crate::Error;

/// Markers in resolver stderr that indicate a failed resolution even when
/// the process exits with code 0.
const FATAL_STDERR_MARKERS: [&str; 2] = ["ResolutionImpossible", "ERROR:"];

/// How often a running resolver child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The outcome of one resolver invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Evaluation {
    /// Whether the resolver produced a consistent lock.
    pub success: bool,
    /// Captured standard output of the resolver.
    pub stdout: String,
    /// Captured standard error of the resolver.
    pub stderr: String,
}

impl Evaluation {
    /// Creates a failed [`Evaluation`] carrying only an error message.
    pub fn failed(stderr: String) -> Self {
        Evaluation {
            success: false,
            stdout: String::new(),
            stderr,
        }
    }
}

/// A capability to evaluate one requirement set with an external resolver.
pub trait ResolverDriver {
    /// Resolves `requirements` and reports the outcome.
    ///
    /// Implementations never fail hard on a single evaluation: invocation
    /// problems are reported as a failed [`Evaluation`].
    fn run(&self, requirements: &RequirementSet) -> Evaluation;
}

/// A [`ResolverDriver`] that runs a `pip-compile` compatible command.
///
/// Each invocation serialises the requirement set (name-sorted, one per
/// line) into a fresh temporary directory, runs the resolver with the
/// configured timeout, and removes the directory again.
#[derive(Debug)]
pub struct PipCompileDriver {
    binary: PathBuf,
    timeout: Duration,
}

impl PipCompileDriver {
    /// Creates a new [`PipCompileDriver`] for the given resolver command.
    ///
    /// # Errors
    ///
    /// Returns an error if `binary` cannot be found in the `PATH`.
    pub fn new(binary: &str, timeout: Duration) -> Result<Self, Error> {
        let binary = which(binary).map_err(|source| Error::ResolverNotFound {
            binary: binary.to_string(),
            source,
        })?;
        Ok(PipCompileDriver { binary, timeout })
    }

    /// Runs the resolver on `requirements` inside a temporary directory.
    fn invoke(&self, requirements: &RequirementSet) -> Result<Evaluation, std::io::Error> {
        let temp_dir = tempfile::Builder::new().prefix("reqfix-").tempdir()?;
        let input_path = temp_dir.path().join("requirements.in");
        let output_path = temp_dir.path().join("requirements.txt");
        let stdout_path = temp_dir.path().join("stdout.log");
        let stderr_path = temp_dir.path().join("stderr.log");

        fs::write(&input_path, format!("{requirements}\n"))?;

        let mut command = Command::new(&self.binary);
        command
            .arg("--resolver=backtracking")
            .arg("--verbose")
            .arg("--output-file")
            .arg(&output_path)
            .arg(&input_path)
            .stdin(Stdio::null())
            // The resolver's output is routed through files so that a
            // chatty child can never fill a pipe and stall.
            .stdout(Stdio::from(File::create(&stdout_path)?))
            .stderr(Stdio::from(File::create(&stderr_path)?));

        debug!(
            "Spawning '{}' for {} requirements",
            self.binary.display(),
            requirements.len()
        );
        let mut child = command.spawn()?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                debug!("Resolver timed out after {}s, killing it", self.timeout.as_secs());
                child.kill()?;
                child.wait()?;
                return Ok(Evaluation::failed(format!(
                    "Error: resolver timed out after {} seconds.",
                    self.timeout.as_secs()
                )));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stdout = fs::read_to_string(&stdout_path)?;
        let stderr = fs::read_to_string(&stderr_path)?;

        let mut success = status.success();
        if success
            && FATAL_STDERR_MARKERS
                .iter()
                .any(|marker| stderr.contains(marker))
        {
            debug!("Resolver exited with 0 but stderr carries a fatal marker");
            success = false;
        }

        debug!(
            "Resolver {} (exit status: {status})",
            if success { "succeeded" } else { "failed" }
        );
        Ok(Evaluation {
            success,
            stdout,
            stderr,
        })
    }
}

impl ResolverDriver for PipCompileDriver {
    fn run(&self, requirements: &RequirementSet) -> Evaluation {
        match self.invoke(requirements) {
            Ok(evaluation) => evaluation,
            Err(error) => {
                debug!("Resolver invocation failed: {error}");
                Evaluation::failed(format!("Error: resolver invocation failed: {error}"))
            }
        }
    }
}
