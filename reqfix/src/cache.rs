//! Memoisation of resolver evaluations.

use std::collections::HashMap;

use reqfix_types::RequirementSet;

use crate::{diagnostics::ConflictInfo, driver::Evaluation};

/// One fully evaluated requirement set.
#[derive(Clone, Debug)]
pub struct CachedEvaluation {
    /// The raw resolver outcome.
    pub evaluation: Evaluation,
    /// The parsed summary of the outcome (with `is_conflict` cleared for
    /// successful evaluations).
    pub conflict: ConflictInfo,
}

/// A write-through cache of resolver evaluations, keyed by the canonical
/// form of the requirement set.
///
/// One cache lives for the duration of a single solve; independent solves
/// never share evaluations.
#[derive(Debug, Default)]
pub struct EvaluationCache(HashMap<RequirementSet, CachedEvaluation>);

impl EvaluationCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        EvaluationCache::default()
    }

    /// Returns the cached evaluation of `requirements`, if present.
    pub fn get(&self, requirements: &RequirementSet) -> Option<&CachedEvaluation> {
        self.0.get(requirements)
    }

    /// Stores the evaluation of `requirements`.
    pub fn insert(&mut self, requirements: RequirementSet, evaluation: CachedEvaluation) {
        self.0.insert(requirements, evaluation);
    }

    /// Returns the number of cached evaluations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
