//! Word counting and word-bounded chunking of the source text.

use std::sync::LazyLock;

use regex::Regex;

/// Default number of words per generation chunk.
pub const DEFAULT_CHUNK_SIZE_WORDS: usize = 1000;

/// Matches one word for counting purposes.
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid regex"));

/// Count words (`\w+` runs) in `text`.
pub fn count_words(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

/// One word-bounded slice of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

/// Split `text` into chunks of `chunk_size` whitespace-separated words.
///
/// Words inside a chunk are re-joined with single spaces. The final chunk
/// holds the remainder and may be shorter. Empty text yields no chunks; a
/// `chunk_size` of zero is treated as one.
pub fn split_into_chunks(text: &str, chunk_size: usize) -> Vec<TextChunk> {
    let chunk_size = chunk_size.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();

    let chunks: Vec<TextChunk> = words
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, group)| TextChunk {
            index,
            text: group.join(" "),
            word_count: group.len(),
        })
        .collect();

    tracing::info!(
        chunk_count = chunks.len(),
        chunk_size,
        "Split text into chunks",
    );
    chunks
}
