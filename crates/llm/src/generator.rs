//! The per-chunk text-generation contract.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::GenerationError;

/// Maximum number of recent prompts passed as an anti-repetition hint.
pub const MAX_RECENT_CONTEXT: usize = 3;

/// Everything the collaborator needs to produce prompts for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRequest {
    pub chunk_text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub requested_count: usize,
    /// Up to [`MAX_RECENT_CONTEXT`] previously accepted prompts. Advisory
    /// only: the generator is asked to avoid them, nothing enforces it.
    pub recent_prompts: Vec<String>,
    pub visual_style: String,
    pub dense_mode: bool,
}

/// Produces candidate prompt strings for a chunk of source text.
///
/// Implementations return the candidates in narrative order. They may
/// return more or fewer than requested; the caller truncates.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &ChunkRequest) -> Result<Vec<String>, GenerationError>;
}

#[async_trait]
impl<G: TextGenerator + ?Sized> TextGenerator for std::sync::Arc<G> {
    async fn generate(&self, request: &ChunkRequest) -> Result<Vec<String>, GenerationError> {
        (**self).generate(request).await
    }
}

#[async_trait]
impl<G: TextGenerator + ?Sized> TextGenerator for &G {
    async fn generate(&self, request: &ChunkRequest) -> Result<Vec<String>, GenerationError> {
        (**self).generate(request).await
    }
}

/// Leading list marker on a completion line: `1.`, `2)`, `3:`, `-`, `*`, `•`.
static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{1,4}[.):]\s+|[-*•]\s+)").expect("valid regex"));

/// Split a raw completion into one prompt per line.
///
/// Blank lines and `#` comment/heading lines are dropped, and a leading
/// list marker (`1.`, `2)`, `-`, `*`) is stripped.
pub fn parse_prompt_lines(completion: &str) -> Vec<String> {
    completion
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| LIST_MARKER_RE.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
