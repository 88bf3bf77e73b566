//! Reconciliation of the surviving prompt count against the target.
//!
//! The contract is "at least the target, at most 110% of it, unless
//! generation itself under-produced". Excess beyond the tolerance band is
//! trimmed by quality; a shortfall is kept as-is (never padded) and
//! reported with an actionable hint.

use serde::Serialize;

use crate::timeline::ceil_count;
use crate::types::FilterConfig;

/// Fraction above the target that is kept without trimming.
pub const OVER_TARGET_TOLERANCE: f64 = 0.10;

/// Largest final count allowed for `target_count`: `ceil(T * 1.10)`.
pub fn max_allowed(target_count: usize) -> usize {
    ceil_count(target_count as f64 * (1.0 + OVER_TARGET_TOLERANCE))
}

// ---------------------------------------------------------------------------
// Under-target diagnostics
// ---------------------------------------------------------------------------

/// Which setting to relax to get more prompts through the filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "setting", rename_all = "snake_case")]
pub enum RelaxHint {
    /// Lower `min_quality_score` (currently `current`).
    LowerMinQualityScore { current: f64 },
    /// Raise `similarity_threshold` (currently `current`) so fewer prompts
    /// count as duplicates.
    RaiseSimilarityThreshold { current: f64 },
}

/// Warning attached to a result whose final count is below the target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderTargetWarning {
    pub target_count: usize,
    pub final_count: usize,
    pub shortfall_percent: f64,
    /// Settings to relax, most effective first.
    pub hints: Vec<RelaxHint>,
    pub message: String,
}

impl UnderTargetWarning {
    pub fn new(target_count: usize, final_count: usize, filters: &FilterConfig) -> Self {
        let shortfall_percent = if target_count == 0 {
            0.0
        } else {
            (target_count - final_count.min(target_count)) as f64 / target_count as f64 * 100.0
        };

        let mut hints = Vec::new();
        if filters.quality_enabled {
            hints.push(RelaxHint::LowerMinQualityScore {
                current: filters.min_quality_score,
            });
        }
        if filters.dedup_enabled {
            hints.push(RelaxHint::RaiseSimilarityThreshold {
                current: filters.similarity_threshold,
            });
        }

        let advice = match hints.as_slice() {
            [] => "no filters are enabled, so the generator itself returned too few prompts"
                .to_string(),
            [only] => format!("try to {}", describe(only)),
            [first, rest @ ..] => {
                let rest: Vec<String> = rest.iter().map(describe).collect();
                format!("try to {} first, then {}", describe(first), rest.join(", then "))
            }
        };

        let message = format!(
            "Generated {final_count} prompts against a target of {target_count} \
             ({shortfall_percent:.1}% short); {advice}"
        );

        Self {
            target_count,
            final_count,
            shortfall_percent,
            hints,
            message,
        }
    }
}

fn describe(hint: &RelaxHint) -> String {
    match hint {
        RelaxHint::LowerMinQualityScore { current } => {
            format!("lower the minimum quality score (currently {current:.2})")
        }
        RelaxHint::RaiseSimilarityThreshold { current } => {
            format!("raise the deduplication threshold (currently {current:.2})")
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Result of reconciling a surviving set against the target.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<T> {
    /// Kept items in their original order.
    pub kept: Vec<T>,
    /// Number of items removed to fit the tolerance band.
    pub trimmed: usize,
    pub warning: Option<UnderTargetWarning>,
}

/// Reconcile `items` (chronological order) with `target_count`.
///
/// `scores[i]` is the quality score of `items[i]`. With `n` items and
/// `cap = ceil(T * 1.10)`:
/// - `n > cap`: the `n - cap` lowest-scored items are dropped, ties
///   dropping the later item first;
/// - `T <= n <= cap`: everything is kept;
/// - `n < T`: everything is kept and an [`UnderTargetWarning`] is returned.
pub fn reconcile<T>(
    items: Vec<T>,
    scores: &[f64],
    target_count: usize,
    filters: &FilterConfig,
) -> Reconciliation<T> {
    debug_assert_eq!(items.len(), scores.len());
    let n = items.len();
    let cap = max_allowed(target_count);

    if n > cap {
        let excess = n - cap;
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(b.cmp(&a)));
        let mut drop = vec![false; n];
        for &i in &order[..excess] {
            drop[i] = true;
        }

        tracing::info!(
            surviving = n,
            target_count,
            cap,
            trimmed = excess,
            "Trimming excess prompts to the tolerance band",
        );

        let kept = items
            .into_iter()
            .zip(drop)
            .filter(|(_, dropped)| !dropped)
            .map(|(item, _)| item)
            .collect();
        return Reconciliation {
            kept,
            trimmed: excess,
            warning: None,
        };
    }

    let warning = (n < target_count).then(|| {
        let warning = UnderTargetWarning::new(target_count, n, filters);
        tracing::warn!(
            target_count,
            final_count = n,
            shortfall_percent = warning.shortfall_percent,
            "{}",
            warning.message,
        );
        warning
    });

    Reconciliation {
        kept: items,
        trimmed: 0,
        warning,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
