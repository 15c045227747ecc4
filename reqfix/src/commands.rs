//! Definition of the high-level binary entry points.

use std::{fs, time::Duration};

use reqfix::{
    CommandExtractor, DiagnosticExtractor, Error, PipCompileDriver, Solver, SolverOptions,
    StaticCatalog,
    cli::{OutputFormat, ResolverArgs},
};

/// The outcome of a command, mapped to an exit code by `main`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// A solution was found (or the checked set resolves).
    Success,
    /// The run finished without a solution (or the checked set conflicts).
    NoSolution,
}

/// The collaborators instantiated from the shared resolver options.
struct Setup {
    input: String,
    catalog: StaticCatalog,
    driver: PipCompileDriver,
    extractor: Option<CommandExtractor>,
}

/// Reads the input and instantiates the configured collaborators.
fn setup(args: &ResolverArgs) -> Result<Setup, Error> {
    let input = fs::read_to_string(&args.requirements_file).map_err(|source| Error::IoPath {
        path: args.requirements_file.clone(),
        context: "reading requirements from",
        source,
    })?;

    let catalog = match args.catalog.as_deref() {
        Some(path) => StaticCatalog::from_json_file(path)?,
        None => StaticCatalog::demo(),
    };

    let driver = PipCompileDriver::new(&args.resolver, Duration::from_secs(args.timeout))?;

    let extractor = if args.no_extractor {
        None
    } else {
        args.extractor.as_deref().and_then(|command| {
            CommandExtractor::new(command, Duration::from_secs(args.extractor_timeout))
        })
    };

    Ok(Setup {
        input,
        catalog,
        driver,
        extractor,
    })
}

/// Runs the repair search and prints the solution.
///
/// # Errors
///
/// Returns an error if the input cannot be read, a collaborator cannot be
/// configured, or the input contains no valid requirement.
pub fn solve(args: ResolverArgs, max_iterations: usize) -> Result<Outcome, Error> {
    let setup = setup(&args)?;
    let extractor = setup
        .extractor
        .as_ref()
        .map(|extractor| extractor as &dyn DiagnosticExtractor);
    let solver = Solver::new(
        &setup.catalog,
        &setup.driver,
        extractor,
        SolverOptions { max_iterations },
    );

    match solver.solve(&setup.input)? {
        Some(solution) => {
            println!("{solution}");
            Ok(Outcome::Success)
        }
        None => {
            println!("No solution found within the search budget.");
            Ok(Outcome::NoSolution)
        }
    }
}

/// Evaluates the input once and prints the conflict summary.
///
/// # Errors
///
/// Returns an error if the input cannot be read, a collaborator cannot be
/// configured, or the input contains no valid requirement.
pub fn check(args: ResolverArgs, output_format: OutputFormat) -> Result<Outcome, Error> {
    let setup = setup(&args)?;
    let extractor = setup
        .extractor
        .as_ref()
        .map(|extractor| extractor as &dyn DiagnosticExtractor);
    let solver = Solver::new(
        &setup.catalog,
        &setup.driver,
        extractor,
        SolverOptions::default(),
    );

    let conflict = solver.check(&setup.input)?;
    match output_format {
        OutputFormat::Plain => println!("{conflict}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&conflict)?),
    }

    if conflict.is_conflict {
        Ok(Outcome::NoSolution)
    } else {
        Ok(Outcome::Success)
    }
}
