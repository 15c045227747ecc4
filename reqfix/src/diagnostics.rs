//! Conflict diagnostics and their two-tier parsing.

use std::{
    collections::{BTreeSet, HashMap},
    fmt::{Display, Formatter},
};

use log::debug;
use regex::Regex;
use reqfix_types::{Name, RequirementSet};
use serde::Serialize;

use crate::{
    extractor::{DiagnosticExtractor, ExtractorReport},
    macros::regex_once,
};

/// A transitive package identified as the locus of conflicting constraints.
///
/// The name is never a member of the original direct requirement set.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TransitiveCulprit {
    /// The name of the transitive package.
    pub name: Name,
    /// A summary of the conflicting specifiers observed for the package,
    /// e.g. `"<2.0; >=2.1"`. May be empty when only the name is known.
    pub specifier_hint: String,
}

/// A structured summary of a resolver evaluation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ConflictInfo {
    /// Whether the evaluation failed to resolve.
    pub is_conflict: bool,
    /// The verbatim resolver output the summary was derived from.
    pub error_text: String,
    /// Direct requirement names implicated in the failure. Always a subset
    /// of the original direct set.
    pub involved_direct: BTreeSet<Name>,
    /// The transitive package at the centre of the conflict, if known.
    pub transitive_culprit: Option<TransitiveCulprit>,
}

impl ConflictInfo {
    /// Creates the summary of a successful evaluation.
    pub fn no_conflict(output: &str) -> Self {
        ConflictInfo {
            is_conflict: false,
            error_text: output.to_string(),
            involved_direct: BTreeSet::new(),
            transitive_culprit: None,
        }
    }
}

impl Display for ConflictInfo {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        if !self.is_conflict {
            return write!(fmt, "No conflict detected.");
        }
        writeln!(fmt, "Conflict detected.")?;
        if self.involved_direct.is_empty() {
            write!(fmt, "Involved direct requirements: unknown")?;
        } else {
            write!(
                fmt,
                "Involved direct requirements: {}",
                self.involved_direct
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<String>>()
                    .join(", ")
            )?;
        }
        if let Some(culprit) = self.transitive_culprit.as_ref() {
            write!(
                fmt,
                "\nTransitive culprit: {} ({})",
                culprit.name,
                if culprit.specifier_hint.is_empty() {
                    "no specifier hint"
                } else {
                    &culprit.specifier_hint
                }
            )?;
        }
        Ok(())
    }
}

/// A two-tier parser turning resolver output into a [`ConflictInfo`].
///
/// When a [`DiagnosticExtractor`] is available it is consulted first; any
/// extractor failure silently degrades to the always-available pattern
/// matching tier.
pub struct ConflictParser<'a> {
    direct_names: BTreeSet<Name>,
    extractor: Option<&'a dyn DiagnosticExtractor>,
}

impl std::fmt::Debug for ConflictParser<'_> {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        fmt.debug_struct("ConflictParser")
            .field("direct_names", &self.direct_names)
            .field("extractor", &self.extractor.map(|_| "dyn DiagnosticExtractor"))
            .finish()
    }
}

impl<'a> ConflictParser<'a> {
    /// Creates a new [`ConflictParser`] for a set of direct requirements.
    pub fn new(
        direct: &RequirementSet,
        extractor: Option<&'a dyn DiagnosticExtractor>,
    ) -> Self {
        ConflictParser {
            direct_names: direct.names().cloned().collect(),
            extractor,
        }
    }

    /// Parses the output of a failed resolver run.
    ///
    /// The result always has `is_conflict` set; this parser is only invoked
    /// when the resolver reported failure.
    pub fn parse(&self, stdout: &str, stderr: &str) -> ConflictInfo {
        let error_text = format!("STDOUT:\n{stdout}\nSTDERR:\n{stderr}");
        if let Some(extractor) = self.extractor {
            let names: Vec<Name> = self.direct_names.iter().cloned().collect();
            match extractor.extract(stdout, stderr, &names) {
                Ok(report) => return self.from_report(&report, error_text),
                Err(error) => {
                    debug!("Extractor failed ({error}), falling back to pattern matching");
                }
            }
        }
        self.from_patterns(error_text)
    }

    /// Builds a [`ConflictInfo`] from a structured extractor report.
    ///
    /// Reported direct names outside the original direct set are dropped;
    /// a culprit naming a direct package is discarded entirely.
    fn from_report(&self, report: &ExtractorReport, error_text: String) -> ConflictInfo {
        let involved_direct: BTreeSet<Name> = report
            .involved_direct
            .iter()
            .filter_map(|name| Name::new(name).ok())
            .filter(|name| self.direct_names.contains(name))
            .collect();
        if involved_direct.len() != report.involved_direct.len() {
            debug!("Extractor reported packages outside the direct set, filtered");
        }

        let transitive_culprit = report
            .culprit_name
            .as_deref()
            .and_then(|name| Name::new(name).ok())
            .filter(|name| !self.direct_names.contains(name))
            .map(|name| TransitiveCulprit {
                name,
                specifier_hint: report.culprit_specs.clone().unwrap_or_default(),
            });

        ConflictInfo {
            is_conflict: true,
            error_text,
            involved_direct,
            transitive_culprit,
        }
    }

    /// Builds a [`ConflictInfo`] by pattern matching on the resolver output.
    fn from_patterns(&self, error_text: String) -> ConflictInfo {
        let mut involved_direct: BTreeSet<Name> = BTreeSet::new();
        for name in &self.direct_names {
            // The direct name next to a version or specifier token.
            let pattern = format!(
                r"(?i)\b{}\b\s*(?:(?:[<>=!~]=?|is)\s*)?[0-9][a-zA-Z0-9.,*+!_-]*",
                regex::escape(name.as_ref())
            );
            if let Ok(regex) = Regex::new(&pattern) {
                if regex.is_match(&error_text) {
                    involved_direct.insert(name.clone());
                }
            }
        }

        let mut transitive_culprit = None;
        if let Some(block) = regex_once!(
            r"(?is)The conflict is caused by:(.*?)(?:\n\s*\n|To fix this|Because no versions of|\n\s*ERROR:|\z)"
        )
        .captures(&error_text)
        {
            transitive_culprit = self.culprit_from_block(&block[1]);
            if transitive_culprit.is_some() && involved_direct.is_empty() {
                // The block only names transitive packages; conservatively
                // implicate every direct requirement.
                involved_direct = self.direct_names.clone();
            }
        }

        if involved_direct.is_empty()
            && (error_text.contains("ResolutionImpossible")
                || error_text.contains("Could not find a version that satisfies the requirement"))
        {
            involved_direct = self.direct_names.clone();
        }

        ConflictInfo {
            is_conflict: true,
            error_text,
            involved_direct,
            transitive_culprit,
        }
    }

    /// Extracts the first non-direct package with conflicting specifiers
    /// from a "The conflict is caused by:" block.
    fn culprit_from_block(&self, block: &str) -> Option<TransitiveCulprit> {
        let mut order: Vec<Name> = Vec::new();
        let mut observed_specs: HashMap<Name, BTreeSet<String>> = HashMap::new();
        let mut observe = |name: &str, spec: &str| {
            let Ok(name) = Name::new(name) else {
                return;
            };
            if self.direct_names.contains(&name) {
                return;
            }
            if !observed_specs.contains_key(&name) {
                order.push(name.clone());
            }
            observed_specs
                .entry(name)
                .or_default()
                .insert(spec.split_whitespace().collect::<String>());
        };

        // "<dependant> <version> depends on <name> <spec>"
        for captures in regex_once!(
            r"(?im)^\s*([A-Za-z0-9_.-]+)\s+(?:[A-Za-z0-9_.?*+!-]+|\(any\))\s+depends\s+on\s+([A-Za-z0-9_.-]+)\s*((?:[<>=!~]=?\s*[A-Za-z0-9_.*+!-]+)(?:\s*,\s*[<>=!~]=?\s*[A-Za-z0-9_.*+!-]+)*)?"
        )
        .captures_iter(block)
        {
            observe(
                &captures[2],
                captures.get(3).map(|m| m.as_str()).unwrap_or(""),
            );
        }

        // "<name> <spec> is required by <requirer>"
        for captures in regex_once!(
            r"(?im)^\s*([A-Za-z0-9_.-]+)\s*((?:[<>=!~]=?\s*[A-Za-z0-9_.*+!-]+)(?:\s*,\s*[<>=!~]=?\s*[A-Za-z0-9_.*+!-]+)*)\s+is\s+required\s+by\s+([A-Za-z0-9_.-]+)"
        )
        .captures_iter(block)
        {
            observe(&captures[1], &captures[2]);
        }

        for name in order {
            let specs = &observed_specs[&name];
            let valid: Vec<&String> = specs.iter().filter(|spec| !spec.is_empty()).collect();
            if !valid.is_empty() {
                return Some(TransitiveCulprit {
                    specifier_hint: valid
                        .iter()
                        .map(|spec| spec.as_str())
                        .collect::<Vec<&str>>()
                        .join("; "),
                    name,
                });
            }
        }
        None
    }
}
