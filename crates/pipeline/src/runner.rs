//! End-to-end run: plan, generate, post-process, summarize.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use promptline_core::bounds::check_at_least;
use promptline_core::buffer::{self, BufferDecision};
use promptline_core::error::CoreError;
use promptline_core::text::{count_words, split_into_chunks, TextChunk, DEFAULT_CHUNK_SIZE_WORDS};
use promptline_core::timeline::{self, TimelineParams};
use promptline_core::types::FilterConfig;
use promptline_llm::generator::TextGenerator;

use crate::error::PipelineError;
use crate::orchestrator::{AttributeTagger, GenerationRun, Orchestrator, RunCheckpoint};
use crate::post_process::post_process;
use crate::summary::{OutputDocument, RunSummary};

/// Default style directive passed to the generator.
pub const DEFAULT_VISUAL_STYLE: &str = "historical illustration";

/// User-facing knobs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub narration_wpm: f64,
    pub frame_interval_seconds: f64,
    pub chunk_size: usize,
    pub visual_style: String,
    pub dense_mode: bool,
    pub filters: FilterConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            narration_wpm: timeline::DEFAULT_NARRATION_WPM,
            frame_interval_seconds: timeline::DEFAULT_FRAME_INTERVAL_SECS,
            chunk_size: DEFAULT_CHUNK_SIZE_WORDS,
            visual_style: DEFAULT_VISUAL_STYLE.to_string(),
            dense_mode: false,
            filters: FilterConfig::default(),
        }
    }
}

impl PipelineSettings {
    /// Check every setting is inside its supported range.
    pub fn validate(&self) -> Result<(), CoreError> {
        timeline::validate_settings(self.narration_wpm, self.frame_interval_seconds)?;
        self.filters.validate()?;
        check_at_least("chunk_size", self.chunk_size, 1)
    }
}

/// Sizing decided before any generation happens.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub timeline: TimelineParams,
    pub decision: BufferDecision,
    pub chunks: Vec<TextChunk>,
}

/// Validate `settings` and size a run for `text`.
pub fn plan(text: &str, settings: &PipelineSettings) -> Result<RunPlan, PipelineError> {
    settings.validate()?;

    let word_count = count_words(text);
    let timeline = timeline::compute(
        word_count,
        settings.narration_wpm,
        settings.frame_interval_seconds,
    )?;
    let decision = buffer::decide(timeline.target_count, &settings.filters);
    let chunks = split_into_chunks(text, settings.chunk_size);

    tracing::info!(
        word_count,
        duration_minutes = timeline.total_duration_minutes(),
        target_count = timeline.target_count,
        buffer_factor = decision.buffer_factor,
        generation_count = decision.generation_count,
        chunks = chunks.len(),
        "Run planned",
    );

    Ok(RunPlan {
        timeline,
        decision,
        chunks,
    })
}

/// A configured pipeline bound to one generator.
pub struct Pipeline<G> {
    settings: PipelineSettings,
    orchestrator: Orchestrator<G>,
}

impl<G: TextGenerator> Pipeline<G> {
    pub fn new(generator: G, settings: PipelineSettings) -> Self {
        let orchestrator =
            Orchestrator::new(generator, settings.visual_style.clone(), settings.dense_mode);
        Self {
            settings,
            orchestrator,
        }
    }

    pub fn with_tagger(mut self, tagger: Box<dyn AttributeTagger>) -> Self {
        self.orchestrator = self.orchestrator.with_tagger(tagger);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the whole pipeline over `text`.
    ///
    /// A cancelled run still post-processes whatever was generated and
    /// reports `cancelled` in the summary.
    pub async fn run(
        &self,
        text: &str,
        prior: Option<GenerationRun>,
        checkpoint: &dyn RunCheckpoint,
        cancel: &CancellationToken,
    ) -> Result<OutputDocument, PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(%run_id, "Pipeline run starting");

        let plan = plan(text, &self.settings)?;
        let run = self
            .orchestrator
            .run(&plan.chunks, &plan.timeline, &plan.decision, prior, checkpoint, cancel)
            .await?;

        let outcome = post_process(
            run.candidates.clone(),
            &plan.timeline,
            &self.settings.filters,
        );
        let metadata = RunSummary::new(run_id, started_at, &self.settings, &plan, &run, &outcome);

        tracing::info!(
            %run_id,
            final_count = metadata.final_count,
            target_count = metadata.target_count,
            warnings = metadata.warnings.len(),
            "Pipeline run finished",
        );

        Ok(OutputDocument {
            metadata,
            prompts: outcome.prompts,
        })
    }
}
