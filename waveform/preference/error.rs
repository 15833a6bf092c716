use thiserror::Error;

/// Errors raised at the edges of the engine. Core operations report them
/// through their outcomes instead of failing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PreferenceError {
    /// A feedback label was neither 0 (skipped) nor 1 (liked).
    #[error("invalid feedback label {0}: expected 0 (skipped) or 1 (liked)")]
    InvalidLabel(i64),
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The solver could not fit the feedback log.
    #[error("training failed: {0}")]
    Training(String),
}
