/// Errors from ranking and reputation configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RankError {
    /// A weight or constant is NaN or infinite.
    #[error("{name} must be a finite number, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    /// A constant that must be positive is not.
    #[error("{name} must be greater than zero, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    /// The contradiction penalty must stay within `[0, 1]`.
    #[error("contradiction_penalty must be within [0, 1], got {0}")]
    PenaltyOutOfRange(f64),
}

/// Result alias for ranking operations.
pub type RankResult<T> = Result<T, RankError>;
