//! Integration tests for `reqfix`.
//!
//! The external collaborators are replaced by scripted stand-ins: a
//! resolver driven by a predicate over the requirement set, a static
//! version catalog, and a fixed-answer diagnostic extractor.

use std::{cell::Cell, str::FromStr};

use reqfix::{
    ActionGenerator, CachedEvaluation, CandidateLimits, ConflictInfo, ConflictParser,
    DiagnosticExtractor, Evaluation, EvaluationCache, ExtractorError, ExtractorReport,
    INITIAL_ACTION, ResolverDriver, SearchEngine, SearchResult, Solver, SolverOptions,
    StaticCatalog,
};
use reqfix_types::{Name, Requirement, RequirementSet, Version, parse_requirements};

/// A resolver stand-in: accepts a requirement set iff `verdict` returns
/// `Ok`, and fails with the returned message as stderr otherwise.
struct ScriptedDriver<F: Fn(&RequirementSet) -> Result<(), String>> {
    verdict: F,
    invocations: Cell<usize>,
}

impl<F: Fn(&RequirementSet) -> Result<(), String>> ScriptedDriver<F> {
    fn new(verdict: F) -> Self {
        ScriptedDriver {
            verdict,
            invocations: Cell::new(0),
        }
    }
}

impl<F: Fn(&RequirementSet) -> Result<(), String>> ResolverDriver for ScriptedDriver<F> {
    fn run(&self, requirements: &RequirementSet) -> Evaluation {
        self.invocations.set(self.invocations.get() + 1);
        match (self.verdict)(requirements) {
            Ok(()) => Evaluation {
                success: true,
                stdout: format!("# locked\n{requirements}"),
                stderr: String::new(),
            },
            Err(stderr) => Evaluation {
                success: false,
                stdout: String::new(),
                stderr,
            },
        }
    }
}

/// An extractor stand-in that always answers with the same report.
struct FixedExtractor(ExtractorReport);

impl DiagnosticExtractor for FixedExtractor {
    fn extract(
        &self,
        _stdout: &str,
        _stderr: &str,
        _direct_names: &[Name],
    ) -> Result<ExtractorReport, ExtractorError> {
        Ok(self.0.clone())
    }
}

fn name(name: &str) -> Name {
    Name::from_str(name).unwrap()
}

fn requirements(lines: &[&str]) -> RequirementSet {
    lines
        .iter()
        .map(|line| Requirement::from_str(line).unwrap())
        .collect()
}

fn exact_version(set: &RequirementSet, package: &str) -> Version {
    set.get(&name(package))
        .and_then(Requirement::exact_version)
        .unwrap_or_else(|| panic!("{package} is not pinned exactly in {set}"))
}

#[test]
fn already_solvable_input_is_returned_unchanged() {
    let catalog = StaticCatalog::demo();
    let driver = ScriptedDriver::new(|_| Ok(()));
    let solver = Solver::new(&catalog, &driver, None, SolverOptions::default());

    let solution = solver
        .solve("requests==2.31.0\nurllib3==2.0.7\n")
        .unwrap()
        .expect("a solvable input yields a solution");

    assert_eq!(
        solution.requirements,
        requirements(&["requests==2.31.0", "urllib3==2.0.7"])
    );
    assert_eq!(solution.path.len(), 1);
    assert_eq!(solution.path[0].action, INITIAL_ACTION);
    assert_eq!(solution.total_cost, 0.0);
    // The initial evaluation is served from the cache when the root is
    // popped; the resolver runs exactly once.
    assert_eq!(driver.invocations.get(), 1);
}

#[test]
fn transitive_host_is_downgraded() {
    let catalog = StaticCatalog::from_pairs([
        ("sphinx", ["5.0.0"].as_slice()),
        ("docutils", ["0.17", "0.17.1", "0.18", "0.19"].as_slice()),
    ])
    .unwrap();
    let minimum = Version::from_str("0.18").unwrap();
    let driver = ScriptedDriver::new(move |reqs: &RequirementSet| {
        let satisfied = reqs
            .get(&name("docutils"))
            .and_then(Requirement::exact_version)
            .is_some_and(|version| version >= minimum);
        if satisfied {
            Ok(())
        } else {
            Err("ERROR: Cannot install docutils==0.17.0 because these package versions \
                 have conflicting dependencies."
                .to_string())
        }
    });
    let solver = Solver::new(&catalog, &driver, None, SolverOptions::default());

    let solution = solver
        .solve("sphinx==5.0.0\ndocutils==0.17.0\n")
        .unwrap()
        .expect("a docutils change repairs the set");

    assert_eq!(
        solution.requirements.get(&name("sphinx")).unwrap().specifier(),
        "==5.0.0"
    );
    assert!(exact_version(&solution.requirements, "docutils") >= Version::from_str("0.18").unwrap());
    assert_eq!(solution.path.len(), 2);
    assert!(solution.total_cost <= 2.0);
}

#[test]
fn minor_version_jump_repairs_the_set() {
    let catalog = StaticCatalog::demo();
    let lower = Version::from_str("2.31.0").unwrap();
    let upper = Version::from_str("2.32.0").unwrap();
    let driver = ScriptedDriver::new(move |reqs: &RequirementSet| {
        let satisfied = reqs
            .get(&name("requests"))
            .and_then(Requirement::exact_version)
            .is_some_and(|version| version >= lower && version < upper);
        if satisfied {
            Ok(())
        } else {
            Err("ERROR: Cannot install requests==2.29.0 because these package versions \
                 have conflicting dependencies."
                .to_string())
        }
    });
    let solver = Solver::new(&catalog, &driver, None, SolverOptions::default());

    let solution = solver
        .solve("requests==2.29.0\nurllib3==2.0.0\n")
        .unwrap()
        .expect("a requests upgrade repairs the set");

    assert_eq!(
        exact_version(&solution.requirements, "requests"),
        Version::from_str("2.31.0").unwrap()
    );
    assert_eq!(
        solution.requirements.get(&name("urllib3")).unwrap().specifier(),
        "==2.0.0"
    );
    assert_eq!(solution.path.len(), 2);
    assert_eq!(
        solution.path[1].action,
        "Changed requests from '==2.29.0' to '==2.31.0'"
    );
    // One minor version jump.
    assert!((solution.total_cost - 2.0).abs() < 1e-9);
}

#[test]
fn transitive_culprit_is_pinned() {
    let catalog = StaticCatalog::from_pairs([
        ("flask", ["2.0.0"].as_slice()),
        ("jinja2", ["2.11.3", "3.0.0", "3.0.3"].as_slice()),
    ])
    .unwrap();
    let hint = reqfix_types::SpecifierSet::from_str("<3.1,>=2.10.1").unwrap();
    let driver = ScriptedDriver::new(move |reqs: &RequirementSet| {
        let satisfied = reqs
            .get(&name("jinja2"))
            .and_then(Requirement::exact_version)
            .is_some_and(|version| hint.contains(&version));
        if satisfied {
            Ok(())
        } else {
            Err("ResolutionImpossible".to_string())
        }
    });
    let extractor = FixedExtractor(ExtractorReport {
        involved_direct: vec!["flask".to_string()],
        culprit_name: Some("jinja2".to_string()),
        culprit_specs: Some("<3.1,>=2.10.1".to_string()),
    });
    let solver = Solver::new(
        &catalog,
        &driver,
        Some(&extractor),
        SolverOptions::default(),
    );

    let solution = solver
        .solve("flask==2.0.0\n")
        .unwrap()
        .expect("pinning jinja2 repairs the set");

    assert_eq!(solution.requirements.len(), 2);
    assert_eq!(
        solution.requirements.get(&name("flask")).unwrap().specifier(),
        "==2.0.0"
    );
    assert!(
        solution
            .path
            .iter()
            .any(|step| step.action == "Pinned transitive jinja2 to '==3.0.3'"),
        "path: {:?}",
        solution.path.iter().map(|s| s.action.clone()).collect::<Vec<_>>()
    );
}

#[test]
fn budget_exhaustion_is_reported_without_a_solution() {
    let catalog = StaticCatalog::from_pairs([
        ("left", ["0.9", "1.0", "1.1"].as_slice()),
        ("right", ["0.9", "1.0", "1.1"].as_slice()),
    ])
    .unwrap();
    let driver =
        ScriptedDriver::new(|_: &RequirementSet| Err("ResolutionImpossible".to_string()));
    let extractor = FixedExtractor(ExtractorReport::default());

    // Through the solver: the run ends without a solution and without
    // panicking.
    let solver = Solver::new(
        &catalog,
        &driver,
        Some(&extractor),
        SolverOptions { max_iterations: 10 },
    );
    assert!(solver.solve("left==1.0\nright==1.0\n").unwrap().is_none());

    // Through the engine: the budget is the reason, and states are left on
    // the frontier.
    let direct = parse_requirements("left==1.0\nright==1.0\n");
    let parser = ConflictParser::new(&direct, Some(&extractor));
    let generator = ActionGenerator::new(&catalog, CandidateLimits::default());
    let engine = SearchEngine::new(direct.clone(), 10);
    let mut cache = EvaluationCache::new();

    let result = engine.run(
        |reqs| {
            if let Some(cached) = cache.get(reqs) {
                return cached.conflict.clone();
            }
            let evaluation = driver.run(reqs);
            let conflict = if evaluation.success {
                ConflictInfo::no_conflict(&evaluation.stdout)
            } else {
                parser.parse(&evaluation.stdout, &evaluation.stderr)
            };
            cache.insert(
                reqs.clone(),
                CachedEvaluation {
                    evaluation,
                    conflict: conflict.clone(),
                },
            );
            conflict
        },
        |node, conflict| generator.successors(&node.requirements, &direct, conflict),
    );

    let SearchResult::BudgetExhausted {
        iterations,
        frontier_len,
    } = result
    else {
        panic!("expected budget exhaustion, got {result:?}");
    };
    assert_eq!(iterations, 10);
    assert!(frontier_len > 0);
}

#[test]
fn removal_is_the_last_resort() {
    let catalog = StaticCatalog::from_pairs([
        ("left", ["1.0"].as_slice()),
        ("right", ["1.0"].as_slice()),
    ])
    .unwrap();
    let driver = ScriptedDriver::new(|reqs: &RequirementSet| {
        if reqs.contains_name(&name("left")) || !reqs.contains_name(&name("right")) {
            Err("ERROR: Cannot install left==1.0 and right==1.0 because these package \
                 versions have conflicting dependencies. ResolutionImpossible"
                .to_string())
        } else {
            Ok(())
        }
    });
    let solver = Solver::new(&catalog, &driver, None, SolverOptions::default());

    let solution = solver
        .solve("left==1.0\nright==1.0\n")
        .unwrap()
        .expect("dropping left repairs the set");

    assert_eq!(solution.requirements, requirements(&["right==1.0"]));
    assert_eq!(solution.path.len(), 2);
    assert_eq!(solution.path[1].action, "Removed direct left");
    assert!((solution.total_cost - 6.0).abs() < 1e-9);
}

#[test]
fn identical_runs_return_identical_paths() {
    let catalog = StaticCatalog::demo();
    let lower = Version::from_str("2.31.0").unwrap();
    let upper = Version::from_str("2.32.0").unwrap();
    let verdict = move |reqs: &RequirementSet| {
        let satisfied = reqs
            .get(&name("requests"))
            .and_then(Requirement::exact_version)
            .is_some_and(|version| version >= lower && version < upper);
        if satisfied {
            Ok(())
        } else {
            Err("ERROR: Cannot install requests==2.29.0".to_string())
        }
    };
    let input = "requests==2.29.0\nurllib3==2.0.0\n";

    let first_driver = ScriptedDriver::new(verdict.clone());
    let first = Solver::new(&catalog, &first_driver, None, SolverOptions::default())
        .solve(input)
        .unwrap()
        .unwrap();
    let second_driver = ScriptedDriver::new(verdict);
    let second = Solver::new(&catalog, &second_driver, None, SolverOptions::default())
        .solve(input)
        .unwrap()
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first_driver.invocations.get(), second_driver.invocations.get());
}

#[test]
fn empty_input_is_a_configuration_error() {
    let catalog = StaticCatalog::demo();
    let driver = ScriptedDriver::new(|_| Ok(()));
    let solver = Solver::new(&catalog, &driver, None, SolverOptions::default());
    assert!(matches!(
        solver.solve("# only comments\n\n"),
        Err(reqfix::Error::NoValidRequirements)
    ));
}

#[test]
fn check_reports_the_parsed_conflict() {
    let catalog = StaticCatalog::demo();
    let driver = ScriptedDriver::new(|_: &RequirementSet| {
        Err("ERROR: Cannot install requests==2.29.0 because these package versions \
             have conflicting dependencies."
            .to_string())
    });
    let solver = Solver::new(&catalog, &driver, None, SolverOptions::default());

    let conflict = solver.check("requests==2.29.0\nurllib3==2.0.0\n").unwrap();
    assert!(conflict.is_conflict);
    assert!(conflict.involved_direct.contains(&name("requests")));
    assert!(conflict.error_text.contains("STDOUT:"));
}
