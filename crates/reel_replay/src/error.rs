//! Replay executor errors.

use reel_core::CoreError;

/// Result type for executor operations
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Errors returned by the replay executor.
///
/// A replayed error step is not one of these: it yields a `Failed` step
/// result, since the executor replayed it faithfully.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// `execute_next` called with the cursor at or past the last step
    #[error("No more steps to execute (session has {len} steps)")]
    Exhausted {
        /// Number of steps in the session
        len: usize,
    },

    /// `jump_to` called with an index outside the session
    #[error("Step index {index} out of range [0, {len})")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Number of steps in the session
        len: usize,
    },

    /// The step could not be replayed in the active mode
    #[error("Step {index} cannot be replayed: {reason}")]
    InvalidStep {
        /// Cursor index of the step
        index: usize,
        /// Why it was rejected
        reason: String,
    },

    /// Session data error
    #[error("Session error: {0}")]
    Session(#[from] CoreError),
}

impl From<ReplayError> for CoreError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::Session(inner) => inner,
            other => CoreError::Validation {
                field: "replay".to_string(),
                reason: other.to_string(),
            },
        }
    }
}
