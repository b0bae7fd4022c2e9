use thiserror::Error;

/// Caller-facing failures of the timer operations.
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("No active timer found")]
    NoActiveTimer,
    #[error("No paused timer found")]
    NoPausedTimer,
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    /// Store or history backend failure, passed through untouched.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl TimerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        TimerError::InvalidParameters(message.into())
    }
}
