//! Error taxonomy for redo.
//!
//! Only configuration problems surface as errors. Launch failures, timeouts
//! and signals are per-stage outcomes recorded in a round, not errors.

/// Errors produced while building or running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RedoError {
    #[error("invalid time format '{0}': expected <number>[s|m|h]")]
    InvalidTimeout(String),

    #[error("invalid time unit '{unit}' in '{value}': only 's', 'm' and 'h' are supported")]
    InvalidTimeUnit { value: String, unit: char },

    #[error("invalid repeat count '{0}': expected a positive integer")]
    InvalidRepeat(String),

    #[error("no command given")]
    EmptyPipeline,

    #[error("stage {index} has no command")]
    EmptyStage { index: usize },

    #[error("too many command arguments for '{program}' (limit {limit})")]
    TooManyArguments { program: String, limit: usize },

    #[error("too many pipeline stages (limit {limit})")]
    TooManyStages { limit: usize },
}

/// Result type for redo operations.
pub type Result<T> = std::result::Result<T, RedoError>;
