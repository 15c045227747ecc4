//! The search heuristic.
//!
//! The estimate is informative rather than strictly admissible: it is kept
//! below typical action costs so that the search stays guided without
//! starving cheap repairs. Implementations needing optimality guarantees
//! would have to tighten the cost model first.

use reqfix_types::RequirementSet;

use crate::diagnostics::ConflictInfo;

/// Estimates the remaining repair work for a conflicting state.
///
/// A resolved state scores 0. A conflicting state scores at least 1, even
/// when the parser could not localise the conflict, so the search keeps
/// making progress. Broader conflicts score higher: one point per
/// implicated direct requirement, plus small bumps when a transitive
/// culprit spans several packages or every direct requirement is involved.
pub fn h_score(conflict: &ConflictInfo, original_direct: &RequirementSet) -> f64 {
    if !conflict.is_conflict {
        return 0.0;
    }

    let involved = conflict.involved_direct.len();
    let mut estimate = if involved > 0 { involved as f64 } else { 1.0 };

    if conflict.transitive_culprit.is_some() && involved > 1 {
        estimate += 0.5;
    }
    if involved == original_direct.len() && involved > 1 {
        estimate += 0.2;
    }

    estimate
}
