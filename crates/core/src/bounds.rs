//! Range checks for user-supplied settings.

use std::ops::RangeInclusive;

use crate::error::CoreError;

/// `value` must be a fraction in `[0.0, 1.0]`. NaN is rejected.
pub fn check_fraction(name: &str, value: f64) -> Result<(), CoreError> {
    check_within(name, value, 0.0..=1.0)
}

/// `value` must lie inside `allowed` (inclusive). NaN is rejected.
pub fn check_within(name: &str, value: f64, allowed: RangeInclusive<f64>) -> Result<(), CoreError> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(CoreError::Validation(format!(
        "{name} must be in {}..={}, got {value}",
        allowed.start(),
        allowed.end()
    )))
}

/// `value` must be at least `min`.
pub fn check_at_least(name: &str, value: usize, min: usize) -> Result<(), CoreError> {
    if value >= min {
        return Ok(());
    }
    Err(CoreError::Validation(format!(
        "{name} must be at least {min}, got {value}"
    )))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn fraction_edges_are_inclusive() {
        for v in [0.0, 0.85, 1.0] {
            assert!(check_fraction("similarity_threshold", v).is_ok(), "{v}");
        }
        for v in [-0.01, 1.01, f64::NAN] {
            assert!(check_fraction("similarity_threshold", v).is_err(), "{v}");
        }
    }

    #[test]
    fn errors_name_the_setting() {
        assert_matches!(
            check_within("frame_interval_seconds", 2.0, 3.0..=30.0),
            Err(CoreError::Validation(msg)) if msg.contains("frame_interval_seconds") && msg.contains("3..=30")
        );
        assert_matches!(
            check_at_least("chunk_size", 0, 1),
            Err(CoreError::Validation(msg)) if msg.contains("chunk_size")
        );
        assert!(check_at_least("chunk_size", 1, 1).is_ok());
    }
}
