//! Textual similarity between prompts and order-preserving deduplication.
//!
//! Similarity blends a character-level longest-common-subsequence ratio
//! with a word-level Jaccard index so that both small edits and reordered
//! phrasing are caught. Lexical only: two prompts that mean the same thing
//! in different words are not duplicates.

use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Weight of the character sequence ratio in the blended score.
pub const SEQUENCE_WEIGHT: f64 = 0.6;
/// Weight of the token Jaccard index in the blended score.
pub const TOKEN_WEIGHT: f64 = 0.4;

/// Characters trimmed from both ends of a normalized prompt.
const BOUNDARY_CHARS: &[char] = &[' ', '.', ',', ';', ':', '!', '?'];

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Case-fold, collapse whitespace runs and trim boundary punctuation.
pub fn normalize(text: &str) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed.trim_matches(BOUNDARY_CHARS).to_string()
}

/// A normalized prompt with the derived data every comparison needs.
///
/// Deduplication compares each candidate with every kept prompt, so the
/// normalization work is done once per prompt rather than once per pair.
#[derive(Debug, Clone)]
pub struct PreparedText {
    normalized: String,
    chars: Vec<char>,
    tokens: HashSet<String>,
    histogram: HashMap<char, usize>,
}

impl PreparedText {
    pub fn new(text: &str) -> Self {
        let normalized = normalize(text);
        let chars: Vec<char> = normalized.chars().collect();
        let tokens = normalized.split_whitespace().map(str::to_string).collect();
        let mut histogram = HashMap::new();
        for c in &chars {
            *histogram.entry(*c).or_insert(0) += 1;
        }
        Self {
            normalized,
            chars,
            tokens,
            histogram,
        }
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Component measures
// ---------------------------------------------------------------------------

/// Length of the longest common subsequence of two character slices.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];
    for lc in long {
        for (j, sc) in short.iter().enumerate() {
            curr[j + 1] = if lc == sc {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[short.len()]
}

/// `2 * LCS / (|a| + |b|)` over the normalized characters.
fn sequence_ratio(a: &PreparedText, b: &PreparedText) -> f64 {
    let total = a.chars.len() + b.chars.len();
    if total == 0 {
        return 0.0;
    }
    2.0 * lcs_len(&a.chars, &b.chars) as f64 / total as f64
}

/// Upper bound on [`sequence_ratio`] from shared character counts alone.
fn sequence_ratio_bound(a: &PreparedText, b: &PreparedText) -> f64 {
    let total = a.chars.len() + b.chars.len();
    if total == 0 {
        return 0.0;
    }
    let shared: usize = a
        .histogram
        .iter()
        .map(|(c, n)| (*n).min(b.histogram.get(c).copied().unwrap_or(0)))
        .sum();
    2.0 * shared as f64 / total as f64
}

/// Jaccard index of the two token sets.
fn jaccard(a: &PreparedText, b: &PreparedText) -> f64 {
    if a.tokens.is_empty() || b.tokens.is_empty() {
        return 0.0;
    }
    let intersection = a.tokens.intersection(&b.tokens).count();
    let union = a.tokens.len() + b.tokens.len() - intersection;
    intersection as f64 / union as f64
}

// ---------------------------------------------------------------------------
// Public scoring API
// ---------------------------------------------------------------------------

/// Blended similarity of two prepared prompts in `[0.0, 1.0]`.
pub fn prepared_similarity(a: &PreparedText, b: &PreparedText) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.normalized == b.normalized {
        return 1.0;
    }
    let score = SEQUENCE_WEIGHT * sequence_ratio(a, b) + TOKEN_WEIGHT * jaccard(a, b);
    score.clamp(0.0, 1.0)
}

/// Blended similarity of two raw prompt strings in `[0.0, 1.0]`.
///
/// Symmetric; `similarity(a, a) == 1.0` for any `a` that is non-empty
/// after normalization; an empty side (including punctuation only) scores
/// `0.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    prepared_similarity(&PreparedText::new(a), &PreparedText::new(b))
}

/// Whether `a` and `b` score strictly above `threshold`.
pub fn is_duplicate(a: &str, b: &str, threshold: f64) -> bool {
    similarity(a, b) > threshold
}

/// Return the blended score only if it can exceed `threshold`.
///
/// Skips the quadratic LCS whenever the cheap upper bound already rules a
/// duplicate out. `None` means "not above threshold".
fn score_above(a: &PreparedText, b: &PreparedText, threshold: f64) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    if a.normalized == b.normalized {
        return (1.0 > threshold).then_some(1.0);
    }
    let token = jaccard(a, b);
    let bound = SEQUENCE_WEIGHT * sequence_ratio_bound(a, b) + TOKEN_WEIGHT * token;
    if bound <= threshold {
        return None;
    }
    let score = (SEQUENCE_WEIGHT * sequence_ratio(a, b) + TOKEN_WEIGHT * token).clamp(0.0, 1.0);
    (score > threshold).then_some(score)
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// A candidate dropped as a near-duplicate of an earlier kept one.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    /// Position (in the input) of the earlier prompt that was kept.
    pub kept_index: usize,
    /// Position (in the input) of the dropped prompt.
    pub dropped_index: usize,
    pub score: f64,
}

/// Find the input positions to drop, in a single left-to-right pass.
///
/// Each prompt is compared with every prompt kept so far; the first match
/// above `threshold` marks it a duplicate. Earlier prompts always win.
pub fn find_duplicates<S: AsRef<str>>(texts: &[S], threshold: f64) -> Vec<DuplicateMatch> {
    let mut kept: Vec<(usize, PreparedText)> = Vec::new();
    let mut dropped = Vec::new();

    for (index, text) in texts.iter().enumerate() {
        let prepared = PreparedText::new(text.as_ref());
        let hit = kept.iter().find_map(|(kept_index, other)| {
            score_above(other, &prepared, threshold).map(|score| (*kept_index, score))
        });

        match hit {
            Some((kept_index, score)) => {
                tracing::debug!(
                    kept_index,
                    dropped_index = index,
                    score,
                    kept = %kept_preview(texts[kept_index].as_ref()),
                    dropped = %kept_preview(text.as_ref()),
                    "Dropping near-duplicate prompt",
                );
                dropped.push(DuplicateMatch {
                    kept_index,
                    dropped_index: index,
                    score,
                });
            }
            None => kept.push((index, prepared)),
        }
    }

    dropped
}

/// Remove near-duplicates, keeping first occurrences in their original order.
pub fn deduplicate<S: AsRef<str> + Clone>(texts: &[S], threshold: f64) -> Vec<S> {
    deduplicate_by(texts.to_vec(), threshold, |t| t.as_ref()).0
}

/// Deduplicate arbitrary items by the text `key` extracts.
///
/// Returns the kept items (original order) and the matches that caused
/// each removal.
pub fn deduplicate_by<T, F>(items: Vec<T>, threshold: f64, key: F) -> (Vec<T>, Vec<DuplicateMatch>)
where
    F: Fn(&T) -> &str,
{
    let texts: Vec<&str> = items.iter().map(&key).collect();
    let matches = find_duplicates(&texts, threshold);
    if matches.is_empty() {
        return (items, matches);
    }

    let dropped: HashSet<usize> = matches.iter().map(|m| m.dropped_index).collect();
    let kept = items
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !dropped.contains(i))
        .map(|(_, item)| item)
        .collect();

    tracing::info!(removed = matches.len(), threshold, "Removed duplicate prompts");
    (kept, matches)
}

fn kept_preview(text: &str) -> String {
    text.chars().take(80).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "Wide shot of a young man walking through a misty forest at dawn, cinematic";
    const B: &str = "Close-up portrait of an elderly woman reading a letter by candlelight";

    // -- normalize -----------------------------------------------------------

    #[test]
    fn normalize_folds_case_and_whitespace() {
        assert_eq!(normalize("  Hello   WORLD.  "), "hello world");
        assert_eq!(normalize("...?"), "");
    }

    // -- lcs -----------------------------------------------------------------

    #[test]
    fn lcs_of_known_strings() {
        let a: Vec<char> = "abcbdab".chars().collect();
        let b: Vec<char> = "bdcaba".chars().collect();
        assert_eq!(lcs_len(&a, &b), 4);
        assert_eq!(lcs_len(&a, &[]), 0);
    }

    // -- similarity ----------------------------------------------------------

    #[test]
    fn identical_text_scores_one() {
        assert_eq!(similarity(A, A), 1.0);
        assert_eq!(similarity("x", "x"), 1.0);
    }

    #[test]
    fn case_and_spacing_do_not_matter() {
        assert_eq!(similarity("A Man  Walks.", "a man walks"), 1.0);
    }

    #[test]
    fn empty_side_scores_zero() {
        assert_eq!(similarity("", A), 0.0);
        assert_eq!(similarity(A, "   "), 0.0);
    }

    #[test]
    fn punctuation_only_agrees_with_deduplicate() {
        assert_eq!(similarity("...", "!!!"), 0.0);
        assert!(!is_duplicate("...", "...", 0.85));
        assert_eq!(deduplicate(&["...", "!!!"], 0.85).len(), 2);
    }

    #[test]
    fn similarity_is_symmetric() {
        let pairs = [(A, B), ("a man at dawn", "dawn, a man"), (A, "wide shot of a man")];
        for (x, y) in pairs {
            assert!((similarity(x, y) - similarity(y, x)).abs() < 1e-12);
        }
    }

    #[test]
    fn unrelated_prompts_score_low() {
        let s = similarity(A, B);
        assert!(s < 0.6, "score {s}");
        assert!(s >= 0.0);
    }

    #[test]
    fn small_edit_is_a_duplicate() {
        let edited = "Wide shot of a young man walking through a misty forest at dusk, cinematic";
        assert!(is_duplicate(A, edited, 0.85));
    }

    #[test]
    fn blend_matches_hand_computation() {
        // "ab cd" vs "ab ce": LCS = 4 of 10 chars -> 0.8; tokens {ab,cd} vs {ab,ce} -> 1/3.
        let expected = 0.6 * 0.8 + 0.4 * (1.0 / 3.0);
        assert!((similarity("ab cd", "ab ce") - expected).abs() < 1e-12);
    }

    #[test]
    fn pruned_score_agrees_with_exact_score() {
        let texts = [A, B, "wide shot of a young man", "a misty forest at dawn"];
        for x in texts {
            for y in texts {
                let (px, py) = (PreparedText::new(x), PreparedText::new(y));
                let exact = prepared_similarity(&px, &py);
                for t in [0.0, 0.3, 0.5, 0.85, 0.99] {
                    assert_eq!(score_above(&px, &py, t).is_some(), exact > t);
                }
            }
        }
    }

    // -- deduplicate ---------------------------------------------------------

    #[test]
    fn keeps_first_occurrence_in_order() {
        let input = vec![A, B, A, "something else entirely, a quiet harbor"];
        let out = deduplicate(&input, 0.85);
        assert_eq!(out, vec![A, B, "something else entirely, a quiet harbor"]);
    }

    #[test]
    fn duplicate_of_an_older_prompt_is_caught() {
        // The repeat of A is compared with every kept prompt, not only the last.
        let input = vec![A, B, "An aerial view of a harbour town", A];
        let matches = find_duplicates(&input, 0.85);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kept_index, 0);
        assert_eq!(matches[0].dropped_index, 3);
        assert_eq!(matches[0].score, 1.0);
    }

    #[test]
    fn deduplicate_is_idempotent() {
        let input = vec![
            A,
            "Wide shot of a young man walking through a misty forest at dusk, cinematic",
            B,
            "Close-up portrait of an elderly woman reading a letter by lamplight",
            "A crowded market square at noon",
        ];
        for t in [0.5, 0.7, 0.85, 0.95] {
            let once = deduplicate(&input, t);
            let twice = deduplicate(&once, t);
            assert_eq!(once, twice, "threshold {t}");
        }
    }

    #[test]
    fn threshold_one_never_drops() {
        let input = vec![A, A, A];
        assert_eq!(deduplicate(&input, 1.0).len(), 3);
    }

    #[test]
    fn deduplicate_by_reports_matches() {
        let items = vec![(1, A.to_string()), (2, A.to_uppercase()), (3, B.to_string())];
        let (kept, matches) = deduplicate_by(items, 0.85, |(_, t)| t.as_str());
        assert_eq!(kept.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(matches.len(), 1);
    }
}
