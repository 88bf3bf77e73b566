//! Filtering and reconciliation of the raw candidate set.
//!
//! Stages, in order:
//! 1. restore chronological order and drop empty candidates;
//! 2. near-duplicate removal (if enabled);
//! 3. quality filtering (if enabled);
//! 4. reconciliation against the target count;
//! 5. even re-spacing of timestamps over the narration;
//! 6. textual enhancement (if enabled).
//!
//! Well-formed input never produces an error; shortfalls surface as an
//! [`UnderTargetWarning`] in the diagnostics.

use serde::Serialize;

use promptline_core::enhancement::enhance;
use promptline_core::quality;
use promptline_core::reconcile::{reconcile, UnderTargetWarning};
use promptline_core::similarity::deduplicate_by;
use promptline_core::timeline::TimelineParams;
use promptline_core::types::{FilterConfig, FinalPrompt, PromptCandidate};

/// Per-stage counts for one post-processing pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostProcessDiagnostics {
    pub candidate_count: usize,
    pub malformed_removed: usize,
    pub dedup_removed: usize,
    pub quality_removed: usize,
    pub trimmed: usize,
    pub final_count: usize,
    pub under_target: Option<UnderTargetWarning>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessOutcome {
    pub prompts: Vec<FinalPrompt>,
    pub diagnostics: PostProcessDiagnostics,
}

/// Turn raw candidates into the final, evenly timed prompt sequence.
pub fn post_process(
    mut candidates: Vec<PromptCandidate>,
    timeline: &TimelineParams,
    filters: &FilterConfig,
) -> PostProcessOutcome {
    let mut diagnostics = PostProcessDiagnostics {
        candidate_count: candidates.len(),
        ..Default::default()
    };

    // Chunk results may arrive out of order; everything below relies on
    // chronological order.
    candidates.sort_by_key(|c| (c.source_chunk_index, c.intra_chunk_index));

    let (malformed, mut survivors): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(PromptCandidate::is_malformed);
    for c in &malformed {
        tracing::debug!(scene = %c.scene_id(), "Dropping empty candidate");
    }
    diagnostics.malformed_removed = malformed.len();

    if filters.dedup_enabled {
        let (kept, matches) =
            deduplicate_by(survivors, filters.similarity_threshold, |c| c.text.as_str());
        diagnostics.dedup_removed = matches.len();
        survivors = kept;
    }

    if filters.quality_enabled {
        let (kept, rejected) =
            quality::filter_by(survivors, filters.min_quality_score, |c| c.text.as_str());
        diagnostics.quality_removed = rejected.len();
        survivors = kept;
    }

    let scores: Vec<f64> = survivors.iter().map(|c| quality::score(&c.text)).collect();
    let scored: Vec<(PromptCandidate, f64)> =
        survivors.into_iter().zip(scores.iter().copied()).collect();
    let reconciled = reconcile(scored, &scores, timeline.target_count, filters);
    diagnostics.trimmed = reconciled.trimmed;
    diagnostics.under_target = reconciled.warning;

    let final_count = reconciled.kept.len();
    let spacing = if final_count == 0 {
        0.0
    } else {
        timeline.total_duration_seconds / final_count as f64
    };

    let prompts: Vec<FinalPrompt> = reconciled
        .kept
        .into_iter()
        .enumerate()
        .map(|(i, (candidate, quality_score))| FinalPrompt {
            id: candidate.scene_id(),
            text: if filters.enhancement_enabled {
                enhance(&candidate.text)
            } else {
                candidate.text
            },
            timestamp: i as f64 * spacing,
            chunk: candidate.source_chunk_index,
            index: candidate.intra_chunk_index,
            quality_score,
            derived_attributes: candidate.derived_attributes,
        })
        .collect();
    diagnostics.final_count = prompts.len();

    tracing::info!(
        candidates = diagnostics.candidate_count,
        malformed_removed = diagnostics.malformed_removed,
        dedup_removed = diagnostics.dedup_removed,
        quality_removed = diagnostics.quality_removed,
        trimmed = diagnostics.trimmed,
        final_count = diagnostics.final_count,
        target_count = timeline.target_count,
        "Post-processing complete",
    );

    PostProcessOutcome {
        prompts,
        diagnostics,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
