//! Chunk-by-chunk candidate generation.
//!
//! The orchestrator splits the over-generation budget across chunks in
//! proportion to their word counts, asks the [`TextGenerator`] for each
//! chunk's share in order, and stamps every returned candidate with a
//! provisional timestamp inside the chunk's slice of the narration.
//!
//! Progress is tracked in a [`GenerationRun`] snapshot. It is handed to a
//! [`RunCheckpoint`] after every chunk and can be passed back in to resume
//! a run without re-requesting completed chunks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use promptline_core::buffer::BufferDecision;
use promptline_core::text::TextChunk;
use promptline_core::timeline::TimelineParams;
use promptline_core::types::{PromptCandidate, Seconds};
use promptline_llm::error::GenerationError;
use promptline_llm::generator::{ChunkRequest, TextGenerator, MAX_RECENT_CONTEXT};

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Run snapshot
// ---------------------------------------------------------------------------

/// A chunk whose request failed after retries and contributed nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedChunk {
    pub chunk_index: usize,
    pub error: String,
}

/// Resumable state of the generation phase.
///
/// Chunks `0..processed_chunks` are finished (succeeded, failed or
/// skipped) and are never requested again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRun {
    pub total_chunks: usize,
    pub generation_count: usize,
    pub processed_chunks: usize,
    pub candidates: Vec<PromptCandidate>,
    pub failed_chunks: Vec<FailedChunk>,
    /// Chunks whose share of the budget rounded down to zero.
    pub skipped_chunks: Vec<usize>,
    pub cancelled: bool,
}

impl GenerationRun {
    pub fn new(total_chunks: usize, generation_count: usize) -> Self {
        Self {
            total_chunks,
            generation_count,
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed_chunks >= self.total_chunks
    }

    /// Whether this snapshot was produced for the same chunking and budget.
    pub fn is_compatible(&self, total_chunks: usize, generation_count: usize) -> bool {
        self.total_chunks == total_chunks && self.generation_count == generation_count
    }

    /// The last `limit` usable prompts, oldest first.
    pub fn recent_prompts(&self, limit: usize) -> Vec<String> {
        let mut recent: Vec<String> = self
            .candidates
            .iter()
            .rev()
            .filter(|c| !c.is_malformed())
            .take(limit)
            .map(|c| c.text.clone())
            .collect();
        recent.reverse();
        recent
    }
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Receives the run snapshot after every processed chunk.
#[async_trait]
pub trait RunCheckpoint: Send + Sync {
    async fn save(&self, run: &GenerationRun) -> Result<(), PipelineError>;
}

/// Checkpoint sink that discards every snapshot.
pub struct NoCheckpoint;

#[async_trait]
impl RunCheckpoint for NoCheckpoint {
    async fn save(&self, _run: &GenerationRun) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Attaches opaque scene attributes (shot type, mood, objects, ...) to a
/// generated prompt.
pub trait AttributeTagger: Send + Sync {
    fn tag(&self, text: &str) -> Option<serde_json::Value>;
}

// ---------------------------------------------------------------------------
// Budget distribution
// ---------------------------------------------------------------------------

/// Split `generation_count` across chunks by word count.
///
/// Every chunk but the last gets `floor(count * words / total_words)`; the
/// last chunk takes the remainder so the shares always sum to the count.
pub fn chunk_shares(chunks: &[TextChunk], generation_count: usize) -> Vec<usize> {
    let total_words: usize = chunks.iter().map(|c| c.word_count).sum();
    if chunks.is_empty() || total_words == 0 {
        return vec![0; chunks.len()];
    }

    let mut shares: Vec<usize> = chunks
        .iter()
        .map(|c| (generation_count as u128 * c.word_count as u128 / total_words as u128) as usize)
        .collect();
    let assigned: usize = shares[..shares.len() - 1].iter().sum();
    if let Some(last) = shares.last_mut() {
        *last = generation_count - assigned;
    }
    shares
}

/// The `[start, end)` slice of the narration covered by each chunk.
pub fn chunk_spans(chunks: &[TextChunk], total_duration: Seconds) -> Vec<(Seconds, Seconds)> {
    let total_words: usize = chunks.iter().map(|c| c.word_count).sum();
    if total_words == 0 {
        return vec![(0.0, 0.0); chunks.len()];
    }

    let mut words_before = 0usize;
    chunks
        .iter()
        .map(|c| {
            let start = total_duration * words_before as f64 / total_words as f64;
            words_before += c.word_count;
            let end = total_duration * words_before as f64 / total_words as f64;
            (start, end)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives a [`TextGenerator`] over the chunks of one input text.
pub struct Orchestrator<G> {
    generator: G,
    visual_style: String,
    dense_mode: bool,
    tagger: Option<Box<dyn AttributeTagger>>,
}

impl<G: TextGenerator> Orchestrator<G> {
    pub fn new(generator: G, visual_style: impl Into<String>, dense_mode: bool) -> Self {
        Self {
            generator,
            visual_style: visual_style.into(),
            dense_mode,
            tagger: None,
        }
    }

    pub fn with_tagger(mut self, tagger: Box<dyn AttributeTagger>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    /// Generate candidates for every unprocessed chunk.
    ///
    /// Starts from `prior` when it is compatible with this chunking and
    /// budget, otherwise from scratch. Cancellation is checked between
    /// chunks; a cancelled run returns `Ok` with `cancelled` set and every
    /// finished chunk retained. A permanent collaborator failure aborts
    /// with [`PipelineError::CollaboratorPermanent`] carrying the partial
    /// run.
    pub async fn run(
        &self,
        chunks: &[TextChunk],
        timeline: &TimelineParams,
        decision: &BufferDecision,
        prior: Option<GenerationRun>,
        checkpoint: &dyn RunCheckpoint,
        cancel: &CancellationToken,
    ) -> Result<GenerationRun, PipelineError> {
        let total_chunks = chunks.len();
        let mut run = match prior {
            Some(prior) if prior.is_compatible(total_chunks, decision.generation_count) => {
                tracing::info!(
                    processed_chunks = prior.processed_chunks,
                    total_chunks,
                    candidates = prior.candidates.len(),
                    "Resuming generation from snapshot",
                );
                prior
            }
            Some(prior) => {
                tracing::warn!(
                    snapshot_chunks = prior.total_chunks,
                    snapshot_generation_count = prior.generation_count,
                    total_chunks,
                    generation_count = decision.generation_count,
                    "Ignoring incompatible snapshot, starting over",
                );
                GenerationRun::new(total_chunks, decision.generation_count)
            }
            None => GenerationRun::new(total_chunks, decision.generation_count),
        };
        run.cancelled = false;

        let shares = chunk_shares(chunks, decision.generation_count);
        let spans = chunk_spans(chunks, timeline.total_duration_seconds);

        while run.processed_chunks < total_chunks {
            if cancel.is_cancelled() {
                tracing::info!(
                    processed_chunks = run.processed_chunks,
                    total_chunks,
                    "Generation cancelled between chunks",
                );
                run.cancelled = true;
                break;
            }

            let index = run.processed_chunks;
            let chunk = &chunks[index];
            let share = shares[index];

            if share == 0 {
                tracing::debug!(chunk_index = index, "Chunk share is zero, skipping");
                run.skipped_chunks.push(index);
                run.processed_chunks += 1;
                checkpoint.save(&run).await?;
                continue;
            }

            let request = ChunkRequest {
                chunk_text: chunk.text.clone(),
                chunk_index: index,
                total_chunks,
                requested_count: share,
                recent_prompts: run.recent_prompts(MAX_RECENT_CONTEXT),
                visual_style: self.visual_style.clone(),
                dense_mode: self.dense_mode,
            };

            tracing::info!(
                chunk_index = index,
                total_chunks,
                requested = share,
                words = chunk.word_count,
                "Generating prompts for chunk",
            );

            match self.generator.generate(&request).await {
                Ok(texts) => {
                    let accepted = self.collect_chunk(&mut run, index, share, spans[index], texts);
                    tracing::info!(
                        chunk_index = index,
                        requested = share,
                        accepted,
                        "Chunk complete",
                    );
                }
                Err(GenerationError::Cancelled) => {
                    tracing::info!(chunk_index = index, "Generation cancelled during chunk");
                    run.cancelled = true;
                    break;
                }
                Err(GenerationError::Permanent(message)) => {
                    tracing::error!(
                        chunk_index = index,
                        error = %message,
                        "Permanent generation failure, aborting run",
                    );
                    return Err(PipelineError::CollaboratorPermanent {
                        chunk_index: index,
                        message,
                        partial: Box::new(run),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        chunk_index = index,
                        error = %e,
                        "Chunk failed, continuing with zero candidates",
                    );
                    run.failed_chunks.push(FailedChunk {
                        chunk_index: index,
                        error: e.to_string(),
                    });
                }
            }

            run.processed_chunks += 1;
            checkpoint.save(&run).await?;
        }

        tracing::info!(
            processed_chunks = run.processed_chunks,
            total_chunks,
            candidates = run.candidates.len(),
            failed = run.failed_chunks.len(),
            cancelled = run.cancelled,
            "Generation phase finished",
        );
        Ok(run)
    }

    /// Truncate, timestamp and tag one chunk's output. Returns the number
    /// of candidates added.
    fn collect_chunk(
        &self,
        run: &mut GenerationRun,
        chunk_index: usize,
        share: usize,
        (start, end): (Seconds, Seconds),
        mut texts: Vec<String>,
    ) -> usize {
        if texts.len() > share {
            tracing::debug!(
                chunk_index,
                returned = texts.len(),
                requested = share,
                "Truncating over-long chunk response",
            );
            texts.truncate(share);
        }

        let count = texts.len();
        let step = if count == 0 { 0.0 } else { (end - start) / count as f64 };
        for (intra, text) in texts.into_iter().enumerate() {
            let timestamp = start + step * intra as f64;
            let mut candidate = PromptCandidate::new(text, chunk_index, intra, timestamp);
            if let Some(tagger) = &self.tagger {
                candidate.derived_attributes = tagger.tag(&candidate.text);
            }
            run.candidates.push(candidate);
        }
        count
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, word_count: usize) -> TextChunk {
        TextChunk {
            index,
            text: vec!["word"; word_count].join(" "),
            word_count,
        }
    }

    // -- shares --------------------------------------------------------------

    #[test]
    fn shares_follow_word_counts_and_sum_to_budget() {
        let chunks = [chunk(0, 1000), chunk(1, 1000), chunk(2, 500)];
        let shares = chunk_shares(&chunks, 101);
        assert_eq!(shares, vec![40, 40, 21]);
        assert_eq!(shares.iter().sum::<usize>(), 101);
    }

    #[test]
    fn small_budget_leaves_zero_shares() {
        let chunks = [chunk(0, 1000), chunk(1, 1000), chunk(2, 1000)];
        assert_eq!(chunk_shares(&chunks, 2), vec![0, 0, 2]);
    }

    #[test]
    fn no_words_means_no_shares() {
        assert_eq!(chunk_shares(&[chunk(0, 0)], 10), vec![0]);
        assert!(chunk_shares(&[], 10).is_empty());
    }

    // -- spans ---------------------------------------------------------------

    #[test]
    fn spans_partition_the_duration() {
        let chunks = [chunk(0, 300), chunk(1, 100)];
        let spans = chunk_spans(&chunks, 400.0);
        assert_eq!(spans, vec![(0.0, 300.0), (300.0, 400.0)]);
    }

    // -- snapshot ------------------------------------------------------------

    #[test]
    fn recent_prompts_are_last_usable_oldest_first() {
        let mut run = GenerationRun::new(1, 10);
        for (i, text) in ["a", "b", "c", " ", "d"].iter().enumerate() {
            run.candidates.push(PromptCandidate::new(*text, 0, i, 0.0));
        }
        assert_eq!(run.recent_prompts(3), vec!["b", "c", "d"]);
    }

    #[test]
    fn compatibility_requires_same_chunking_and_budget() {
        let run = GenerationRun::new(4, 100);
        assert!(run.is_compatible(4, 100));
        assert!(!run.is_compatible(5, 100));
        assert!(!run.is_compatible(4, 120));
    }

    #[test]
    fn snapshot_survives_json() {
        let mut run = GenerationRun::new(2, 8);
        run.processed_chunks = 1;
        run.candidates.push(PromptCandidate::new("a lone rider", 0, 0, 0.0));
        run.failed_chunks.push(FailedChunk {
            chunk_index: 1,
            error: "timeout".into(),
        });
        let json = serde_json::to_string(&run).unwrap();
        let back: GenerationRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back, run);
    }
}
