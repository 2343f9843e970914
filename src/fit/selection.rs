//! Ranking candidate power sets by Bayesian evidence.
//!
//! The caller chooses which power sets to compare; each candidate is scored with
//! `fit::evidence` and the results are returned best first. Candidates whose
//! evidence cannot be computed are kept aside with the reason instead of failing
//! the whole comparison.

use itertools::Itertools;
use log::debug;
use rayon::prelude::*;

use crate::domain::{EvidenceResult, GaussianPrior, Power};
use crate::error::{IdentError, Result};
use crate::fit::evidence::evidence;

/// Output of `rank_power_sets`.
#[derive(Debug, Clone)]
pub struct PowerSetRanking {
    /// Evaluated candidates, highest log evidence first.
    pub ranked: Vec<EvidenceResult>,
    /// Candidates that were skipped and why (for diagnostics).
    pub skipped: Vec<(Vec<Power>, String)>,
}

impl PowerSetRanking {
    pub fn best(&self) -> Option<&EvidenceResult> {
        self.ranked.first()
    }

    /// Log Bayes factor of the best candidate over the one at `rank`.
    pub fn log_bayes_factor(&self, rank: usize) -> Option<f64> {
        let best = self.ranked.first()?;
        let other = self.ranked.get(rank)?;
        Some(best.log_evidence - other.log_evidence)
    }
}

/// Score every candidate and sort by descending log evidence.
///
/// `prior_for` builds the coefficient prior for a candidate (its dimension must
/// match the candidate's length). Ties keep candidate order.
pub fn rank_power_sets<P>(
    candidates: &[Vec<Power>],
    prior_for: P,
    likelihood_precision: f64,
    x: &[f64],
    y: &[f64],
) -> Result<PowerSetRanking>
where
    P: Fn(&[Power]) -> GaussianPrior + Sync,
{
    if candidates.is_empty() {
        return Err(IdentError::invalid("No candidate power sets to rank."));
    }

    let outcomes: Vec<Result<EvidenceResult>> = candidates
        .par_iter()
        .map(|powers| evidence(powers, &prior_for(powers), likelihood_precision, x, y))
        .collect();

    let mut ranked = Vec::with_capacity(candidates.len());
    let mut skipped = Vec::new();
    for (powers, outcome) in candidates.iter().zip(outcomes) {
        match outcome {
            Ok(result) => ranked.push(result),
            Err(e) => {
                debug!("skipping powers {powers:?}: {e}");
                skipped.push((powers.clone(), e.to_string()));
            }
        }
    }

    if ranked.is_empty() {
        let reasons = skipped.iter().map(|(p, why)| format!("{p:?}: {why}")).join("; ");
        return Err(IdentError::invalid(format!(
            "No candidate power set could be evaluated ({reasons})."
        )));
    }

    // Stable sort keeps candidate order among equal evidences.
    ranked.sort_by(|a, b| b.log_evidence.total_cmp(&a.log_evidence));

    Ok(PowerSetRanking { ranked, skipped })
}

/// `rank_power_sets` with a zero-mean isotropic prior of the given precision.
pub fn rank_power_sets_isotropic(
    candidates: &[Vec<Power>],
    prior_precision: f64,
    likelihood_precision: f64,
    x: &[f64],
    y: &[f64],
) -> Result<PowerSetRanking> {
    rank_power_sets(
        candidates,
        |powers| GaussianPrior::isotropic(powers.len(), prior_precision),
        likelihood_precision,
        x,
        y,
    )
}

/// All increasing power sets of `size` distinct powers from `0..=max_degree`.
pub fn power_subsets(max_degree: Power, size: usize) -> Vec<Vec<Power>> {
    (0..=max_degree).combinations(size).collect()
}

/// Every non-empty power set from `0..=max_degree`, smallest sets first.
pub fn all_power_subsets(max_degree: Power) -> Vec<Vec<Power>> {
    (1..=max_degree as usize + 1)
        .flat_map(|size| power_subsets(max_degree, size))
        .collect()
}
