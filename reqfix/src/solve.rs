//! Orchestration of a repair run.

use std::fmt::{Display, Formatter};

use log::{debug, info};
use reqfix_types::{RequirementSet, parse_requirements};

use crate::{
    Error,
    actions::ActionGenerator,
    cache::{CachedEvaluation, EvaluationCache},
    catalog::{CandidateLimits, VersionCatalog},
    diagnostics::{ConflictInfo, ConflictParser},
    driver::ResolverDriver,
    extractor::DiagnosticExtractor,
    search::{SearchEngine, SearchResult, Step},
};

/// Tunables for a [`Solver`].
#[derive(Clone, Copy, Debug)]
pub struct SolverOptions {
    /// The iteration budget of the search.
    pub max_iterations: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions { max_iterations: 50 }
    }
}

/// A repaired requirement set and the edits that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    /// The conflict-free requirement set.
    pub requirements: RequirementSet,
    /// The path from the initial state to the solution.
    pub path: Vec<Step>,
    /// The accumulated edit cost of the path.
    pub total_cost: f64,
}

impl Display for Solution {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        writeln!(fmt, "Solved requirements:")?;
        for requirement in self.requirements.iter() {
            writeln!(fmt, "  {requirement}")?;
        }
        writeln!(fmt)?;
        writeln!(fmt, "Repair path (total cost {:.2}):", self.total_cost)?;
        for (index, step) in self.path.iter().enumerate() {
            writeln!(
                fmt,
                "  Step {index}: {} -> {}",
                step.action,
                step.requirements.summary(5)
            )?;
        }
        Ok(())
    }
}

/// Wires the collaborators together and runs the repair search.
///
/// The solver borrows its collaborators for the duration of the run; it
/// owns no state between [`Solver::solve`] calls and every call starts
/// with a fresh evaluation cache.
pub struct Solver<'a> {
    catalog: &'a dyn VersionCatalog,
    driver: &'a dyn ResolverDriver,
    extractor: Option<&'a dyn DiagnosticExtractor>,
    options: SolverOptions,
}

impl std::fmt::Debug for Solver<'_> {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        fmt.debug_struct("Solver")
            .field("options", &self.options)
            .field("extractor", &self.extractor.map(|_| "dyn DiagnosticExtractor"))
            .finish()
    }
}

impl<'a> Solver<'a> {
    /// Creates a new [`Solver`] over the given collaborators.
    pub fn new(
        catalog: &'a dyn VersionCatalog,
        driver: &'a dyn ResolverDriver,
        extractor: Option<&'a dyn DiagnosticExtractor>,
        options: SolverOptions,
    ) -> Self {
        Solver {
            catalog,
            driver,
            extractor,
            options,
        }
    }

    /// Parses `input` and searches for a conflict-free nearby set.
    ///
    /// Returns `Ok(None)` when the search terminates without a solution
    /// (exhausted frontier or iteration budget).
    ///
    /// # Errors
    ///
    /// Returns an error if the input contains no valid requirement.
    pub fn solve(&self, input: &str) -> Result<Option<Solution>, Error> {
        let direct = parse_requirements(input);
        if direct.is_empty() {
            return Err(Error::NoValidRequirements);
        }
        info!("Direct requirements: {}", direct.summary(5));

        let parser = ConflictParser::new(&direct, self.extractor);
        let generator = ActionGenerator::new(self.catalog, CandidateLimits::default());
        let engine = SearchEngine::new(direct.clone(), self.options.max_iterations);
        let mut cache = EvaluationCache::new();

        let result = engine.run(
            |requirements| evaluate(requirements, self.driver, &parser, &mut cache),
            |node, conflict| generator.successors(&node.requirements, &direct, conflict),
        );
        info!("Evaluation cache holds {} entries", cache.len());

        match result {
            SearchResult::Solved {
                requirements,
                path,
                total_cost,
                ..
            } => Ok(Some(Solution {
                requirements,
                path,
                total_cost,
            })),
            SearchResult::FrontierExhausted { iterations } => {
                info!("No solution, frontier exhausted after {iterations} iteration(s)");
                Ok(None)
            }
            SearchResult::BudgetExhausted {
                iterations,
                frontier_len,
            } => {
                info!(
                    "No solution within {iterations} iteration(s), {frontier_len} state(s) unexplored"
                );
                Ok(None)
            }
        }
    }

    /// Evaluates `input` once without searching and returns the summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the input contains no valid requirement.
    pub fn check(&self, input: &str) -> Result<ConflictInfo, Error> {
        let direct = parse_requirements(input);
        if direct.is_empty() {
            return Err(Error::NoValidRequirements);
        }
        let parser = ConflictParser::new(&direct, self.extractor);
        let mut cache = EvaluationCache::new();
        Ok(evaluate(&direct, self.driver, &parser, &mut cache))
    }
}

/// Evaluates one requirement set through the cache.
///
/// The first evaluation of a set invokes the resolver and parses failures;
/// later evaluations of the same set reuse the cached summary.
fn evaluate(
    requirements: &RequirementSet,
    driver: &dyn ResolverDriver,
    parser: &ConflictParser,
    cache: &mut EvaluationCache,
) -> ConflictInfo {
    if let Some(cached) = cache.get(requirements) {
        debug!("Evaluation cache hit for: {}", requirements.summary(3));
        return cached.conflict.clone();
    }

    let evaluation = driver.run(requirements);
    let conflict = if evaluation.success {
        ConflictInfo::no_conflict(&evaluation.stdout)
    } else {
        parser.parse(&evaluation.stdout, &evaluation.stderr)
    };
    cache.insert(
        requirements.clone(),
        CachedEvaluation {
            evaluation,
            conflict: conflict.clone(),
        },
    );
    conflict
}
