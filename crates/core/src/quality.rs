//! Prompt quality scoring, validation and filtering.
//!
//! The score is a weighted sum of independent heuristic signals, each
//! clamped to `[0.0, 1.0]` before weighting, so the total is always in
//! `[0.0, 1.0]`. Keyword signals match whole tokens (multi-word phrases
//! match on token boundaries).

use std::collections::{HashMap, HashSet};

use serde::Serialize;

// ---------------------------------------------------------------------------
// Weights and limits
// ---------------------------------------------------------------------------

pub const WEIGHT_LENGTH: f64 = 0.10;
pub const WEIGHT_VISUAL: f64 = 0.30;
pub const WEIGHT_SUBJECT: f64 = 0.10;
pub const WEIGHT_DESCRIPTIVE: f64 = 0.20;
pub const WEIGHT_COLOR_LIGHTING: f64 = 0.10;
pub const WEIGHT_VARIETY: f64 = 0.10;
pub const WEIGHT_TECHNICAL: f64 = 0.10;

/// Character length at which the length signal saturates.
pub const MIN_PROMPT_LENGTH: usize = 50;
/// Descriptive keyword hits at which the richness signal saturates.
pub const DESCRIPTIVE_SATURATION: usize = 4;
/// Words longer than this are checked for repetition by [`validate`].
const REPETITION_MIN_WORD_LEN: usize = 4;
/// A word repeated more often than this is reported by [`validate`].
const REPETITION_MAX_OCCURRENCES: usize = 3;

// ---------------------------------------------------------------------------
// Keyword vocabularies
// ---------------------------------------------------------------------------

/// Visual-element categories; the visual signal is the fraction present.
pub const VISUAL_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "shot_type",
        &[
            "shot", "close-up", "closeup", "wide", "medium", "aerial", "angle", "tracking",
            "over-the-shoulder", "framing", "camera", "panoramic",
        ],
    ),
    (
        "lighting",
        &[
            "lighting", "lit", "backlit", "illuminated", "glow", "glowing", "sunlight",
            "candlelight", "moonlight", "lamplight", "firelight", "rim light",
        ],
    ),
    (
        "composition",
        &[
            "composition", "rule of thirds", "foreground", "background", "symmetrical",
            "centered", "framed", "perspective", "leading lines", "depth of field",
        ],
    ),
    (
        "mood",
        &[
            "mood", "atmosphere", "atmospheric", "melancholic", "somber", "tense", "serene",
            "joyful", "nostalgic", "ominous", "peaceful", "hopeful", "triumphant", "emotional",
        ],
    ),
    (
        "style",
        &[
            "style", "illustration", "painting", "photograph", "photorealistic", "watercolor",
            "oil", "engraving", "sketch", "historical", "cinematic", "realistic",
        ],
    ),
];

const SUBJECT_KEYWORDS: &[&str] = &[
    "man", "men", "woman", "women", "person", "people", "character", "figure", "figures",
    "subject", "boy", "girl", "child", "children", "crowd", "soldier", "soldiers", "family",
    "couple", "king", "queen",
];

const DESCRIPTIVE_KEYWORDS: &[&str] = &[
    "detailed", "cinematic", "professional", "realistic", "atmospheric", "dramatic", "vivid",
    "rich", "intricate", "refined",
];

const COLOR_LIGHTING_KEYWORDS: &[&str] = &[
    "light", "shadow", "shadows", "color", "colors", "colour", "warm", "cool", "bright", "dark",
    "golden", "blue", "red", "green", "amber", "crimson", "silver", "sepia", "muted", "pastel",
    "illuminated",
];

const TECHNICAL_KEYWORDS: &[&str] = &[
    "8k", "4k", "hd", "uhd", "high quality", "professional", "highly detailed", "sharp focus",
    "ultra detailed",
];

// ---------------------------------------------------------------------------
// Token view
// ---------------------------------------------------------------------------

/// Lower-cased token view of a prompt used for keyword matching.
struct TokenView {
    tokens: HashSet<String>,
    padded: String,
}

impl TokenView {
    fn new(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let ordered: Vec<&str> = lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .map(|t| t.trim_matches('-'))
            .filter(|t| !t.is_empty())
            .collect();
        let padded = format!(" {} ", ordered.join(" "));
        Self {
            tokens: ordered.into_iter().map(str::to_string).collect(),
            padded,
        }
    }

    fn contains(&self, keyword: &str) -> bool {
        if keyword.contains(' ') {
            self.padded.contains(&format!(" {keyword} "))
        } else {
            self.tokens.contains(keyword)
        }
    }

    fn any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.contains(k))
    }

    fn hits(&self, keywords: &[&str]) -> usize {
        keywords.iter().filter(|k| self.contains(k)).count()
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Individual sub-scores, each in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityBreakdown {
    pub length: f64,
    pub visual: f64,
    pub subject: f64,
    pub descriptive: f64,
    pub color_lighting: f64,
    pub variety: f64,
    pub technical: f64,
}

impl QualityBreakdown {
    /// Weighted composite score in `[0.0, 1.0]`.
    pub fn total(&self) -> f64 {
        let total = WEIGHT_LENGTH * self.length
            + WEIGHT_VISUAL * self.visual
            + WEIGHT_SUBJECT * self.subject
            + WEIGHT_DESCRIPTIVE * self.descriptive
            + WEIGHT_COLOR_LIGHTING * self.color_lighting
            + WEIGHT_VARIETY * self.variety
            + WEIGHT_TECHNICAL * self.technical;
        total.clamp(0.0, 1.0)
    }
}

fn flag(present: bool) -> f64 {
    if present {
        1.0
    } else {
        0.0
    }
}

/// Compute every sub-score for `text`.
pub fn breakdown(text: &str) -> QualityBreakdown {
    let view = TokenView::new(text);

    let length = (text.chars().count() as f64 / MIN_PROMPT_LENGTH as f64).min(1.0);

    let categories_present = VISUAL_CATEGORIES
        .iter()
        .filter(|(_, keywords)| view.any(keywords))
        .count();
    let visual = (categories_present as f64 / VISUAL_CATEGORIES.len() as f64).min(1.0);

    let descriptive =
        (view.hits(DESCRIPTIVE_KEYWORDS) as f64 / DESCRIPTIVE_SATURATION as f64).min(1.0);

    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    let variety = if words.is_empty() {
        0.0
    } else {
        let unique: HashSet<&String> = words.iter().collect();
        unique.len() as f64 / words.len() as f64
    };

    QualityBreakdown {
        length,
        visual,
        subject: flag(view.any(SUBJECT_KEYWORDS)),
        descriptive,
        color_lighting: flag(view.any(COLOR_LIGHTING_KEYWORDS)),
        variety,
        technical: flag(view.any(TECHNICAL_KEYWORDS)),
    }
}

/// Composite quality score of `text` in `[0.0, 1.0]`; empty text scores 0.
pub fn score(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    breakdown(text).total()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check a prompt for structural problems.
///
/// Returns `(is_valid, issues)`; `is_valid` is true only when no issue
/// was found.
pub fn validate(text: &str) -> (bool, Vec<String>) {
    let mut issues = Vec::new();

    if text.chars().count() < MIN_PROMPT_LENGTH {
        issues.push(format!(
            "Prompt too short (minimum {MIN_PROMPT_LENGTH} characters)"
        ));
    }
    if text.trim().is_empty() {
        issues.push("Prompt is empty or whitespace-only".to_string());
    }

    let view = TokenView::new(text);
    let has_visual = VISUAL_CATEGORIES
        .iter()
        .any(|(_, keywords)| view.any(keywords));
    if !has_visual {
        issues.push("Prompt lacks visual element keywords".to_string());
    }
    if !view.any(SUBJECT_KEYWORDS) {
        issues.push("Prompt lacks clear subject or character".to_string());
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    for word in text.split_whitespace().map(str::to_lowercase) {
        if word.chars().count() > REPETITION_MIN_WORD_LEN {
            let count = counts.entry(word.clone()).or_insert(0);
            if *count == 0 {
                first_seen.push(word);
            }
            *count += 1;
        }
    }
    let repetitive: Vec<&str> = first_seen
        .iter()
        .filter(|w| counts[*w] > REPETITION_MAX_OCCURRENCES)
        .take(3)
        .map(String::as_str)
        .collect();
    if !repetitive.is_empty() {
        issues.push(format!(
            "Repetitive words detected: {}",
            repetitive.join(", ")
        ));
    }

    (issues.is_empty(), issues)
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// An item rejected by the quality filter, with the score it got.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected<T> {
    pub item: T,
    pub score: f64,
}

/// Split `items` into `(kept, rejected)` by `score >= min_score`.
///
/// `kept` preserves input order. Each rejection is logged with its score.
pub fn filter_by<T, F>(items: Vec<T>, min_score: f64, key: F) -> (Vec<T>, Vec<Rejected<T>>)
where
    F: Fn(&T) -> &str,
{
    let mut kept = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();

    for item in items {
        let s = score(key(&item));
        if s >= min_score {
            kept.push(item);
        } else {
            tracing::debug!(
                score = s,
                min_score,
                prompt = %key(&item).chars().take(100).collect::<String>(),
                "Rejected low-quality prompt",
            );
            rejected.push(Rejected { item, score: s });
        }
    }

    if !rejected.is_empty() {
        tracing::info!(
            removed = rejected.len(),
            min_score,
            "Filtered out low-quality prompts"
        );
    }
    (kept, rejected)
}

/// [`filter_by`] over plain strings.
pub fn filter(texts: Vec<String>, min_score: f64) -> (Vec<String>, Vec<Rejected<String>>) {
    filter_by(texts, min_score, String::as_str)
}

// ---------------------------------------------------------------------------
// Diversity metrics
// ---------------------------------------------------------------------------

/// Aggregate metrics over a set of prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiversityMetrics {
    pub avg_length: f64,
    pub avg_unique_words: f64,
    pub vocabulary_size: usize,
    pub avg_quality_score: f64,
    pub min_quality_score: f64,
    pub max_quality_score: f64,
}

/// Compute [`DiversityMetrics`]; all zero for an empty set.
pub fn analyze_diversity<S: AsRef<str>>(prompts: &[S]) -> DiversityMetrics {
    if prompts.is_empty() {
        return DiversityMetrics::default();
    }
    let n = prompts.len() as f64;

    let mut vocabulary: HashSet<String> = HashSet::new();
    let mut total_length = 0usize;
    let mut total_unique = 0usize;
    let mut scores = Vec::with_capacity(prompts.len());

    for prompt in prompts {
        let prompt = prompt.as_ref();
        total_length += prompt.chars().count();
        let words: HashSet<String> = prompt.split_whitespace().map(str::to_lowercase).collect();
        total_unique += words.len();
        vocabulary.extend(words);
        scores.push(score(prompt));
    }

    DiversityMetrics {
        avg_length: total_length as f64 / n,
        avg_unique_words: total_unique as f64 / n,
        vocabulary_size: vocabulary.len(),
        avg_quality_score: scores.iter().sum::<f64>() / n,
        min_quality_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
        max_quality_score: scores.iter().copied().fold(0.0, f64::max),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
