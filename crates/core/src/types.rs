//! Shared value types passed between the pipeline stages.

use serde::{Deserialize, Serialize};

use crate::bounds::check_fraction;
use crate::error::CoreError;

/// Default similarity threshold above which two prompts are duplicates.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;
/// Default minimum quality score a prompt must reach to be kept.
pub const DEFAULT_MIN_QUALITY_SCORE: f64 = 0.5;

/// Seconds from the start of the narration.
pub type Seconds = f64;

// ---------------------------------------------------------------------------
// Prompt candidate
// ---------------------------------------------------------------------------

/// A single unfiltered prompt produced by the text-generation collaborator.
///
/// Only `text` participates in similarity comparison. The chunk/intra-chunk
/// indices define chronological order and are used to restore it before
/// any order-sensitive stage runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptCandidate {
    pub text: String,
    pub source_chunk_index: usize,
    pub intra_chunk_index: usize,
    pub provisional_timestamp: Seconds,
    /// Opaque scene tags (shot type, emotions, objects, ...) attached by an
    /// external tagger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_attributes: Option<serde_json::Value>,
}

impl PromptCandidate {
    pub fn new(
        text: impl Into<String>,
        source_chunk_index: usize,
        intra_chunk_index: usize,
        provisional_timestamp: Seconds,
    ) -> Self {
        Self {
            text: text.into(),
            source_chunk_index,
            intra_chunk_index,
            provisional_timestamp,
            derived_attributes: None,
        }
    }

    /// Stable scene identifier, e.g. `scene_3_12`.
    pub fn scene_id(&self) -> String {
        format!("scene_{}_{}", self.source_chunk_index, self.intra_chunk_index)
    }

    /// Whether the candidate has no usable text.
    pub fn is_malformed(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A surviving prompt with its final, evenly spaced timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPrompt {
    pub id: String,
    pub text: String,
    pub timestamp: Seconds,
    pub chunk: usize,
    pub index: usize,
    pub quality_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_attributes: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Filter configuration
// ---------------------------------------------------------------------------

/// Per-run switches and thresholds for the post-processing filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub dedup_enabled: bool,
    pub similarity_threshold: f64,
    pub quality_enabled: bool,
    pub min_quality_score: f64,
    /// Light textual clean-up of the surviving prompts after reconciliation.
    pub enhancement_enabled: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            dedup_enabled: true,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            quality_enabled: true,
            min_quality_score: DEFAULT_MIN_QUALITY_SCORE,
            enhancement_enabled: true,
        }
    }
}

impl FilterConfig {
    /// Configuration with every filter switched off.
    pub fn disabled() -> Self {
        Self {
            dedup_enabled: false,
            quality_enabled: false,
            enhancement_enabled: false,
            ..Self::default()
        }
    }

    /// Validate both thresholds lie within `[0.0, 1.0]`.
    pub fn validate(&self) -> Result<(), CoreError> {
        check_fraction("similarity_threshold", self.similarity_threshold)?;
        check_fraction("min_quality_score", self.min_quality_score)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_id_combines_chunk_and_position() {
        let c = PromptCandidate::new("wide shot", 3, 12, 0.0);
        assert_eq!(c.scene_id(), "scene_3_12");
    }

    #[test]
    fn whitespace_only_candidate_is_malformed() {
        assert!(PromptCandidate::new("  \n\t", 0, 0, 0.0).is_malformed());
        assert!(!PromptCandidate::new("a figure", 0, 0, 0.0).is_malformed());
    }

    #[test]
    fn default_filter_config_is_valid() {
        assert!(FilterConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let config = FilterConfig {
            similarity_threshold: 1.2,
            ..FilterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn candidate_without_attributes_omits_field() {
        let c = PromptCandidate::new("a man", 0, 0, 1.5);
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("derived_attributes").is_none());
        assert_eq!(json["provisional_timestamp"], 1.5);
    }
}
