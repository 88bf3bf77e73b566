//! Errors raised by the pure domain logic.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A timeline or sizing input that can never produce a valid result
    /// (non-positive narration speed, non-positive frame interval, NaN).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
