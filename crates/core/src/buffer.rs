//! Over-generation sizing for the lossy post-processing filters.
//!
//! Deduplication and quality filtering each discard a share of the
//! generated candidates, and the two losses compound. The estimator picks
//! a multiplier per enabled filter from a threshold-banded table, combines
//! them multiplicatively, adds a safety margin and caps the result so the
//! number of collaborator calls stays bounded. There is no feedback from
//! the attrition actually observed in a run.

use serde::Serialize;

use crate::timeline::ceil_count;
use crate::types::FilterConfig;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fixed safety margin applied after combining the filter multipliers.
pub const SAFETY_MARGIN: f64 = 1.15;
/// Hard ceiling on the buffer factor.
pub const MAX_BUFFER_FACTOR: f64 = 4.0;
/// Floor on the buffer factor: never request fewer than the target.
pub const MIN_BUFFER_FACTOR: f64 = 1.0;

// ---------------------------------------------------------------------------
// Band tables
// ---------------------------------------------------------------------------

/// Lower bound of a threshold band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandFloor {
    /// Matches thresholds `>= value`.
    AtLeast(f64),
    /// Matches thresholds `> value`.
    Above(f64),
    /// Matches every threshold; terminates a table.
    Any,
}

impl BandFloor {
    fn matches(self, threshold: f64) -> bool {
        match self {
            Self::AtLeast(v) => threshold >= v,
            Self::Above(v) => threshold > v,
            Self::Any => true,
        }
    }
}

/// One row of a banded multiplier table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub name: &'static str,
    pub floor: BandFloor,
    pub multiplier: f64,
}

/// Dedup multipliers, evaluated top-down. A stricter (higher) similarity
/// threshold drops fewer prompts and needs less headroom.
pub const DEDUP_BANDS: &[Band] = &[
    Band {
        name: "strict",
        floor: BandFloor::AtLeast(0.9),
        multiplier: 1.8,
    },
    Band {
        name: "default",
        floor: BandFloor::Above(0.8),
        multiplier: 2.2,
    },
    Band {
        name: "loose",
        floor: BandFloor::Any,
        multiplier: 2.5,
    },
];

/// Quality multipliers, evaluated top-down. A higher minimum score rejects
/// more prompts and needs more headroom.
pub const QUALITY_BANDS: &[Band] = &[
    Band {
        name: "high",
        floor: BandFloor::AtLeast(0.6),
        multiplier: 2.0,
    },
    Band {
        name: "default",
        floor: BandFloor::Above(0.4),
        multiplier: 1.6,
    },
    Band {
        name: "low",
        floor: BandFloor::Any,
        multiplier: 1.4,
    },
];

/// First band in `table` whose floor admits `threshold`.
pub fn lookup_band(table: &'static [Band], threshold: f64) -> Option<&'static Band> {
    table.iter().find(|band| band.floor.matches(threshold))
}

fn band_multiplier(table: &'static [Band], enabled: bool, threshold: f64) -> f64 {
    if !enabled {
        return 1.0;
    }
    lookup_band(table, threshold).map_or(1.0, |band| band.multiplier)
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

/// Predicted over-generation factor in `[1.0, 4.0]`.
pub fn estimate(config: &FilterConfig) -> f64 {
    let dedup = band_multiplier(DEDUP_BANDS, config.dedup_enabled, config.similarity_threshold);
    let quality = band_multiplier(QUALITY_BANDS, config.quality_enabled, config.min_quality_score);
    let factor = (dedup * quality * SAFETY_MARGIN).clamp(MIN_BUFFER_FACTOR, MAX_BUFFER_FACTOR);

    tracing::debug!(dedup, quality, factor, "Buffer factor estimated");
    factor
}

/// How many candidates to request for a target, and why.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BufferDecision {
    pub target_count: usize,
    pub buffer_factor: f64,
    pub generation_count: usize,
}

/// Size a run: `generation_count = ceil(target_count * buffer_factor)`.
pub fn decide(target_count: usize, config: &FilterConfig) -> BufferDecision {
    let buffer_factor = estimate(config);
    BufferDecision {
        target_count,
        buffer_factor,
        generation_count: ceil_count(target_count as f64 * buffer_factor),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dedup: Option<f64>, quality: Option<f64>) -> FilterConfig {
        FilterConfig {
            dedup_enabled: dedup.is_some(),
            similarity_threshold: dedup.unwrap_or(0.85),
            quality_enabled: quality.is_some(),
            min_quality_score: quality.unwrap_or(0.5),
            enhancement_enabled: false,
        }
    }

    // -- band lookup ---------------------------------------------------------

    #[test]
    fn dedup_band_edges() {
        assert_eq!(lookup_band(DEDUP_BANDS, 0.9).unwrap().name, "strict");
        assert_eq!(lookup_band(DEDUP_BANDS, 0.89).unwrap().name, "default");
        assert_eq!(lookup_band(DEDUP_BANDS, 0.8).unwrap().name, "loose");
        assert_eq!(lookup_band(DEDUP_BANDS, 0.0).unwrap().name, "loose");
    }

    #[test]
    fn quality_band_edges() {
        assert_eq!(lookup_band(QUALITY_BANDS, 0.6).unwrap().name, "high");
        assert_eq!(lookup_band(QUALITY_BANDS, 0.5).unwrap().name, "default");
        assert_eq!(lookup_band(QUALITY_BANDS, 0.4).unwrap().name, "low");
    }

    // -- estimate ------------------------------------------------------------

    #[test]
    fn default_filters_hit_the_cap() {
        // 2.2 * 1.6 * 1.15 = 4.048 -> 4.0
        assert_eq!(estimate(&FilterConfig::default()), 4.0);
    }

    #[test]
    fn no_filters_is_margin_only() {
        assert!((estimate(&config(None, None)) - 1.15).abs() < 1e-12);
    }

    #[test]
    fn single_filter_products() {
        assert!((estimate(&config(Some(0.95), None)) - 1.8 * 1.15).abs() < 1e-12);
        assert!((estimate(&config(None, Some(0.3))) - 1.4 * 1.15).abs() < 1e-12);
        assert!((estimate(&config(Some(0.95), Some(0.3))) - 1.8 * 1.4 * 1.15).abs() < 1e-12);
    }

    #[test]
    fn factor_stays_within_bounds() {
        for d in [None, Some(0.0), Some(0.5), Some(0.85), Some(0.9), Some(1.0)] {
            for q in [None, Some(0.0), Some(0.4), Some(0.5), Some(0.6), Some(1.0)] {
                let f = estimate(&config(d, q));
                assert!((MIN_BUFFER_FACTOR..=MAX_BUFFER_FACTOR).contains(&f));
            }
        }
    }

    #[test]
    fn loosening_dedup_never_lowers_factor() {
        let thresholds = [1.0, 0.95, 0.9, 0.89, 0.85, 0.81, 0.8, 0.5, 0.0];
        for q in [None, Some(0.3), Some(0.5)] {
            let mut previous = 0.0;
            for t in thresholds {
                let f = estimate(&config(Some(t), q));
                assert!(f >= previous, "threshold {t}: {f} < {previous}");
                previous = f;
            }
        }
    }

    #[test]
    fn raising_quality_bar_never_lowers_factor() {
        let bars = [0.0, 0.3, 0.4, 0.41, 0.5, 0.59, 0.6, 0.9];
        let mut previous = 0.0;
        for bar in bars {
            let f = estimate(&config(Some(0.95), Some(bar)));
            assert!(f >= previous, "bar {bar}: {f} < {previous}");
            previous = f;
        }
    }

    // -- decide --------------------------------------------------------------

    #[test]
    fn generation_count_rounds_up() {
        let d = decide(836, &FilterConfig::default());
        assert_eq!(d.generation_count, 3344);
        let d = decide(100, &config(None, None));
        assert_eq!(d.generation_count, 115);
        let d = decide(101, &config(None, None));
        assert_eq!(d.generation_count, 117);
    }

    #[test]
    fn zero_target_requests_nothing() {
        assert_eq!(decide(0, &FilterConfig::default()).generation_count, 0);
    }
}
