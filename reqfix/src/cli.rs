//! Definition of the commandline interface.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// The commandline arguments for the `reqfix` binary.
#[derive(Clone, Debug, Parser)]
#[command(about, author, name = "reqfix", version)]
pub struct Cli {
    /// Verbosity of the output.
    ///
    /// Provide multiple times for increased verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// The top-level subcommand.
    #[command(subcommand)]
    pub command: Command,
}

/// Output format for the `check` command.
#[derive(Clone, Debug, Default, strum::Display, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    #[strum(serialize = "plain")]
    Plain,
    /// JSON.
    #[strum(serialize = "json")]
    Json,
}

/// Options shared by every command that invokes the external resolver.
#[derive(Args, Clone, Debug)]
pub struct ResolverArgs {
    /// Path to the requirements input (one requirement per line).
    #[arg(value_name = "REQUIREMENTS_FILE")]
    pub requirements_file: PathBuf,

    /// The resolver command to invoke.
    #[arg(long, env = "RESOLVER_BIN", default_value = "pip-compile")]
    pub resolver: String,

    /// Timeout for one resolver invocation, in seconds.
    #[arg(long, env = "RESOLVER_TIMEOUT_SEC", default_value_t = 120, value_name = "SECONDS")]
    pub timeout: u64,

    /// Path to a JSON file mapping package names to known versions.
    ///
    /// Without a catalog file, a small built-in catalog is used.
    #[arg(long, value_name = "JSON_FILE")]
    pub catalog: Option<PathBuf>,

    /// The diagnostic extractor command to run on resolver failures.
    ///
    /// The command receives `{stdout, stderr, direct_names}` as JSON on
    /// stdin and must answer with a conflict report as JSON on stdout.
    #[arg(long, env = "EXTRACTOR_CMD", value_name = "COMMAND")]
    pub extractor: Option<String>,

    /// Timeout for one extractor invocation, in seconds.
    #[arg(long, env = "EXTRACTOR_TIMEOUT_SEC", default_value_t = 60, value_name = "SECONDS")]
    pub extractor_timeout: u64,

    /// Consult the diagnostic extractor on resolver failures.
    ///
    /// This is the default whenever an extractor command is configured.
    #[arg(long, overrides_with = "no_extractor")]
    pub use_extractor: bool,

    /// Never consult the diagnostic extractor.
    #[arg(long)]
    pub no_extractor: bool,
}

/// The top-level subcommand for the `reqfix` binary.
#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Search for a conflict-free requirement set near the input.
    ///
    /// On success the repaired set and the sequence of edits that produced
    /// it are printed on stdout and the program exits with 0. When the
    /// search exhausts its budget or state space without a solution the
    /// program exits with 1.
    Solve {
        /// The shared resolver options.
        #[command(flatten)]
        args: ResolverArgs,

        /// Maximum number of search iterations.
        #[arg(long, env = "MAX_ITERATIONS", default_value_t = 50, value_name = "COUNT")]
        max_iterations: usize,
    },
    /// Evaluate the input once and report the parsed conflict.
    ///
    /// Exits with 0 when the set resolves and with 1 when it conflicts.
    Check {
        /// The shared resolver options.
        #[command(flatten)]
        args: ResolverArgs,

        /// Provide the output in a specific format.
        #[arg(short, long, value_name = "OUTPUT_FORMAT", default_value_t = OutputFormat::Plain)]
        output_format: OutputFormat,
    },
}
