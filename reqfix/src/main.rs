//! The `reqfix` CLI tool.

use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use reqfix::cli::{Cli, Command};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

mod commands;

use commands::{Outcome, check, solve};

/// The entry point for the `reqfix` binary.
///
/// Exits with 0 when a solution is found (or a checked set resolves), with
/// 1 when the run finishes without a solution, and with 2 on configuration
/// errors.
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbosity);

    let result = match cli.command {
        Command::Solve {
            args,
            max_iterations,
        } => solve(args, max_iterations),
        Command::Check {
            args,
            output_format,
        } => check(args, output_format),
    };

    match result {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::NoSolution) => ExitCode::from(1),
        Err(error) => {
            eprintln!("{error}");
            ExitCode::from(2)
        }
    }
}

/// Initializes a global logger once.
fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if let Err(error) = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("Failed to initialize logger:\n{error}");
    }
}
