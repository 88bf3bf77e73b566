//! Run metadata written alongside the final prompts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use promptline_core::quality::{analyze_diversity, DiversityMetrics};
use promptline_core::reconcile::UnderTargetWarning;
use promptline_core::types::{FilterConfig, FinalPrompt};

use crate::orchestrator::{FailedChunk, GenerationRun};
use crate::post_process::PostProcessOutcome;
use crate::runner::{PipelineSettings, RunPlan};

/// Everything a reader needs to judge how a run went.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    // Timeline
    pub word_count: usize,
    pub narration_wpm: f64,
    pub frame_interval_seconds: f64,
    pub total_duration_seconds: f64,
    pub total_duration_minutes: f64,
    pub words_per_prompt: f64,
    pub target_count: usize,

    // Sizing
    pub buffer_factor: f64,
    pub generation_count: usize,

    pub visual_style: String,
    pub dense_mode: bool,

    // Generation
    pub total_chunks: usize,
    pub processed_chunks: usize,
    pub failed_chunks: Vec<FailedChunk>,
    pub skipped_chunks: Vec<usize>,
    pub cancelled: bool,

    // Post-processing
    pub candidate_count: usize,
    pub malformed_removed: usize,
    pub dedup_removed: usize,
    pub quality_removed: usize,
    pub trimmed: usize,
    pub final_count: usize,
    pub under_target: Option<UnderTargetWarning>,
    pub warnings: Vec<String>,

    pub quality: DiversityMetrics,
    pub filters: FilterConfig,
}

/// The document the worker writes: run metadata plus the prompts.
#[derive(Debug, Clone, Serialize)]
pub struct OutputDocument {
    pub metadata: RunSummary,
    pub prompts: Vec<FinalPrompt>,
}

impl RunSummary {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        settings: &PipelineSettings,
        plan: &RunPlan,
        run: &GenerationRun,
        outcome: &PostProcessOutcome,
    ) -> Self {
        let timeline = &plan.timeline;
        let diagnostics = &outcome.diagnostics;
        let texts: Vec<&str> = outcome.prompts.iter().map(|p| p.text.as_str()).collect();

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            word_count: timeline.word_count,
            narration_wpm: timeline.narration_wpm,
            frame_interval_seconds: timeline.frame_interval_seconds,
            total_duration_seconds: timeline.total_duration_seconds,
            total_duration_minutes: timeline.total_duration_minutes(),
            words_per_prompt: timeline.words_per_prompt(),
            target_count: timeline.target_count,
            buffer_factor: plan.decision.buffer_factor,
            generation_count: plan.decision.generation_count,
            visual_style: settings.visual_style.clone(),
            dense_mode: settings.dense_mode,
            total_chunks: run.total_chunks,
            processed_chunks: run.processed_chunks,
            failed_chunks: run.failed_chunks.clone(),
            skipped_chunks: run.skipped_chunks.clone(),
            cancelled: run.cancelled,
            candidate_count: diagnostics.candidate_count,
            malformed_removed: diagnostics.malformed_removed,
            dedup_removed: diagnostics.dedup_removed,
            quality_removed: diagnostics.quality_removed,
            trimmed: diagnostics.trimmed,
            final_count: diagnostics.final_count,
            under_target: diagnostics.under_target.clone(),
            warnings: collect_warnings(run, outcome),
            quality: analyze_diversity(&texts),
            filters: settings.filters,
        }
    }
}

fn collect_warnings(run: &GenerationRun, outcome: &PostProcessOutcome) -> Vec<String> {
    let mut warnings: Vec<String> = run
        .failed_chunks
        .iter()
        .map(|f| format!("Chunk {} produced no prompts: {}", f.chunk_index, f.error))
        .collect();

    if run.cancelled {
        warnings.push(format!(
            "Run cancelled after {} of {} chunks; output covers only the processed part",
            run.processed_chunks, run.total_chunks
        ));
    }
    if let Some(under) = &outcome.diagnostics.under_target {
        warnings.push(under.message.clone());
    }
    warnings
}
