//! Timeline calculation: narrated duration and target prompt count.
//!
//! Converts a word count, a narration speed and a display cadence into the
//! number of prompts required to cover the narrated duration.

use serde::Serialize;

use crate::error::CoreError;
use crate::bounds::check_within;
use crate::types::Seconds;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default narration speed (words per minute).
pub const DEFAULT_NARRATION_WPM: f64 = 150.0;
/// Default seconds each image stays on screen.
pub const DEFAULT_FRAME_INTERVAL_SECS: f64 = 6.0;

/// Accepted range for the configured frame interval.
pub const MIN_FRAME_INTERVAL_SECS: f64 = 3.0;
pub const MAX_FRAME_INTERVAL_SECS: f64 = 30.0;

/// Accepted range for the configured narration speed.
pub const MIN_NARRATION_WPM: f64 = 100.0;
pub const MAX_NARRATION_WPM: f64 = 200.0;

/// Tolerance absorbed before rounding up, so `400.0 * 1.1` rounds to 440.
const CEIL_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Timeline parameters
// ---------------------------------------------------------------------------

/// Immutable timeline for one input text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelineParams {
    pub word_count: usize,
    pub narration_wpm: f64,
    pub frame_interval_seconds: Seconds,
    pub total_duration_seconds: Seconds,
    pub target_count: usize,
}

impl TimelineParams {
    pub fn total_duration_minutes(&self) -> f64 {
        self.total_duration_seconds / 60.0
    }

    /// Average number of source words covered by one prompt.
    pub fn words_per_prompt(&self) -> f64 {
        if self.target_count == 0 {
            self.word_count as f64
        } else {
            self.word_count as f64 / self.target_count as f64
        }
    }
}

/// Compute duration and target prompt count.
///
/// `duration = word_count / wpm * 60`, `target = ceil(duration / interval)`.
/// A zero word count yields a zero target; a non-positive or non-finite
/// `wpm` or `interval` is an [`CoreError::InvalidParameter`].
pub fn compute(
    word_count: usize,
    narration_wpm: f64,
    frame_interval_seconds: Seconds,
) -> Result<TimelineParams, CoreError> {
    if !narration_wpm.is_finite() || narration_wpm <= 0.0 {
        return Err(CoreError::InvalidParameter(format!(
            "narration speed must be positive, got {narration_wpm} wpm"
        )));
    }
    if !frame_interval_seconds.is_finite() || frame_interval_seconds <= 0.0 {
        return Err(CoreError::InvalidParameter(format!(
            "frame interval must be positive, got {frame_interval_seconds}s"
        )));
    }

    let total_duration_seconds = word_count as f64 / narration_wpm * 60.0;
    let target_count = ceil_count(total_duration_seconds / frame_interval_seconds);

    tracing::debug!(
        word_count,
        narration_wpm,
        frame_interval_seconds,
        total_duration_seconds,
        target_count,
        "Timeline computed",
    );

    Ok(TimelineParams {
        word_count,
        narration_wpm,
        frame_interval_seconds,
        total_duration_seconds,
        target_count,
    })
}

/// Validate the user-facing timeline settings against their allowed ranges.
pub fn validate_settings(narration_wpm: f64, frame_interval_seconds: f64) -> Result<(), CoreError> {
    check_within(
        "frame_interval_seconds",
        frame_interval_seconds,
        MIN_FRAME_INTERVAL_SECS..=MAX_FRAME_INTERVAL_SECS,
    )?;
    check_within(
        "narration_wpm",
        narration_wpm,
        MIN_NARRATION_WPM..=MAX_NARRATION_WPM,
    )
}

/// Round a non-negative quantity up to a whole count.
///
/// Floating-point noise just above an integer (`440.00000000000006`) does
/// not round up to the next count. Negative or NaN input yields zero.
pub fn ceil_count(value: f64) -> usize {
    if !(value > 0.0) {
        return 0;
    }
    (value - CEIL_EPSILON).ceil().max(0.0) as usize
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
