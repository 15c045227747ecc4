//! Generation of cost-ranked successor requirement sets.

use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
};

use log::debug;
use reqfix_types::{Name, Requirement, RequirementSet};

use crate::{
    catalog::{CandidateLimits, VersionCatalog, candidates},
    diagnostics::ConflictInfo,
};

/// How many candidate versions are tried when pinning a transitive culprit.
const TRANSITIVE_PIN_CANDIDATES: usize = 2;

/// A single edit of a requirement set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RepairAction {
    /// Replace the constraint of a requirement with an exact pin.
    Change {
        /// The edited package.
        name: Name,
        /// The specifier before the edit.
        from: String,
        /// The specifier after the edit.
        to: String,
    },
    /// Widen an exact pin to a compatible release clause.
    Loosen {
        /// The edited package.
        name: Name,
        /// The specifier before the edit.
        from: String,
        /// The specifier after the edit.
        to: String,
    },
    /// Add an exact pin for a package that is not a direct requirement.
    PinTransitive {
        /// The pinned package.
        name: Name,
        /// The added exact specifier.
        specifier: String,
    },
    /// Drop a direct requirement entirely.
    RemoveDirect {
        /// The removed package.
        name: Name,
    },
}

impl Display for RepairAction {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        match self {
            RepairAction::Change { name, from, to } => {
                write!(fmt, "Changed {name} from '{from}' to '{to}'")
            }
            RepairAction::Loosen { name, from, to } => {
                write!(fmt, "Loosened {name} from '{from}' to '{to}'")
            }
            RepairAction::PinTransitive { name, specifier } => {
                write!(fmt, "Pinned transitive {name} to '{specifier}'")
            }
            RepairAction::RemoveDirect { name } => write!(fmt, "Removed direct {name}"),
        }
    }
}

/// A successor state produced by the [`ActionGenerator`].
#[derive(Clone, Debug)]
pub struct Successor {
    /// The requirement set after the edit.
    pub requirements: RequirementSet,
    /// The edit that produced it.
    pub action: RepairAction,
    /// The cost of the edit (≥ 1.0).
    pub cost: f64,
}

/// Produces the successor states of a conflicting requirement set.
///
/// Successors are generated in a stable order: strategies run in a fixed
/// sequence and each strategy visits its target names in canonical order.
pub struct ActionGenerator<'a> {
    catalog: &'a dyn VersionCatalog,
    limits: CandidateLimits,
}

impl std::fmt::Debug for ActionGenerator<'_> {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        fmt.debug_struct("ActionGenerator")
            .field("limits", &self.limits)
            .finish()
    }
}

impl<'a> ActionGenerator<'a> {
    /// Creates a new [`ActionGenerator`] over a version catalog.
    pub fn new(catalog: &'a dyn VersionCatalog, limits: CandidateLimits) -> Self {
        ActionGenerator { catalog, limits }
    }

    /// Returns the successors of `current` given the conflict parsed from
    /// its evaluation.
    ///
    /// Returns an empty list when the evaluation was not a conflict.
    pub fn successors(
        &self,
        current: &RequirementSet,
        original_direct: &RequirementSet,
        conflict: &ConflictInfo,
    ) -> Vec<Successor> {
        if !conflict.is_conflict {
            return Vec::new();
        }

        // Focus the edits on the implicated direct requirements; without
        // any localisation, fall back to every current requirement that was
        // part of the original direct set.
        let targets: BTreeSet<Name> = if conflict.involved_direct.is_empty() {
            debug!("Conflict without localisation, targeting all current direct requirements");
            current
                .names()
                .filter(|name| original_direct.contains_name(name))
                .cloned()
                .collect()
        } else {
            conflict.involved_direct.clone()
        };

        let mut successors = Vec::new();
        self.change_versions(current, &targets, &mut successors);
        self.loosen_pins(current, &targets, &mut successors);
        self.pin_transitive_culprit(current, conflict, &mut successors);
        self.remove_direct(current, original_direct, &targets, &mut successors);

        if successors.is_empty() {
            debug!(
                "No successors for conflicting requirement set: {}",
                current.summary(3)
            );
        }
        successors
    }

    /// Tries candidate versions for each targeted requirement.
    fn change_versions(
        &self,
        current: &RequirementSet,
        targets: &BTreeSet<Name>,
        successors: &mut Vec<Successor>,
    ) {
        for name in targets {
            let Some(requirement) = current.get(name) else {
                debug!("Targeted package '{name}' is not in the current set, skipping");
                continue;
            };
            for version in candidates(self.catalog, name, Some(requirement), None, self.limits) {
                let specifier = format!("=={version}");
                if specifier == requirement.specifier() {
                    continue;
                }
                let Ok(replacement) = Requirement::new(name.clone(), &specifier) else {
                    continue;
                };
                let cost = change_cost(requirement, &replacement);
                let mut requirements = current.clone();
                requirements.insert(replacement);
                successors.push(Successor {
                    requirements,
                    action: RepairAction::Change {
                        name: name.clone(),
                        from: requirement.specifier().to_string(),
                        to: specifier,
                    },
                    cost,
                });
            }
        }
    }

    /// Widens exact pins to their compatible release (`~=major.minor`).
    fn loosen_pins(
        &self,
        current: &RequirementSet,
        targets: &BTreeSet<Name>,
        successors: &mut Vec<Successor>,
    ) {
        for name in targets {
            let Some(requirement) = current.get(name) else {
                continue;
            };
            let Some(version) = requirement.exact_version() else {
                continue;
            };
            if version.release().len() < 2 {
                continue;
            }
            let specifier = format!("~={}.{}", version.major(), version.minor());
            if specifier == requirement.specifier() {
                continue;
            }
            let Ok(replacement) = Requirement::new(name.clone(), &specifier) else {
                continue;
            };
            let mut requirements = current.clone();
            requirements.insert(replacement);
            successors.push(Successor {
                requirements,
                action: RepairAction::Loosen {
                    name: name.clone(),
                    from: requirement.specifier().to_string(),
                    to: specifier,
                },
                cost: 1.0 + 1.2,
            });
        }
    }

    /// Adds an exact pin for the reported transitive culprit.
    fn pin_transitive_culprit(
        &self,
        current: &RequirementSet,
        conflict: &ConflictInfo,
        successors: &mut Vec<Successor>,
    ) {
        let Some(culprit) = conflict.transitive_culprit.as_ref() else {
            return;
        };
        if current.contains_name(&culprit.name) {
            debug!(
                "Transitive culprit '{}' is already pinned, skipping",
                culprit.name
            );
            return;
        }
        let hint = if culprit.specifier_hint.is_empty() {
            None
        } else {
            Some(culprit.specifier_hint.as_str())
        };
        for version in candidates(self.catalog, &culprit.name, None, hint, self.limits)
            .into_iter()
            .take(TRANSITIVE_PIN_CANDIDATES)
        {
            let specifier = format!("=={version}");
            let Ok(pinned) = Requirement::new(culprit.name.clone(), &specifier) else {
                continue;
            };
            let mut requirements = current.clone();
            requirements.insert(pinned);
            successors.push(Successor {
                requirements,
                action: RepairAction::PinTransitive {
                    name: culprit.name.clone(),
                    specifier,
                },
                cost: 1.0 + 3.0,
            });
        }
    }

    /// Drops targeted direct requirements as a last resort.
    fn remove_direct(
        &self,
        current: &RequirementSet,
        original_direct: &RequirementSet,
        targets: &BTreeSet<Name>,
        successors: &mut Vec<Successor>,
    ) {
        for name in targets {
            if !original_direct.contains_name(name) || !current.contains_name(name) {
                continue;
            }
            if current.len() == 1 {
                debug!("Not removing '{name}', it is the last requirement");
                continue;
            }
            let mut requirements = current.clone();
            requirements.remove(name);
            successors.push(Successor {
                requirements,
                action: RepairAction::RemoveDirect { name: name.clone() },
                cost: 1.0 + 5.0,
            });
        }
    }
}

/// The cost of replacing `before` with the exact pin `after`.
///
/// Small steps are cheap: changing only the micro version costs less than
/// a minor jump, which costs less than a major jump. Pinning a version that
/// already satisfied a loose constraint is the cheapest edit of all.
fn change_cost(before: &Requirement, after: &Requirement) -> f64 {
    let base = 1.0;
    if before.is_exact() && after.is_exact() {
        if let (Some(before), Some(after)) = (before.exact_version(), after.exact_version()) {
            return if before.major() != after.major() {
                base + 2.0
            } else if before.minor() != after.minor() {
                base + 1.0
            } else if before.micro() != after.micro() {
                base + 0.5
            } else {
                base + 0.25
            };
        }
    } else if !before.is_exact() && after.is_exact() && !before.specifier().is_empty() {
        return match (before.specifier_set(), after.exact_version()) {
            (Ok(specifier_set), Some(version)) => {
                if specifier_set.contains(&version) {
                    base + 0.1
                } else {
                    base + 1.7
                }
            }
            _ => base + 1.2,
        };
    }
    base + 1.5
}
