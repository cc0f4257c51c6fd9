use super::TransportError;
use crate::types::SubmissionHandle;
use std::time::Duration;
use thiserror::Error;

/// Errors returned while waiting for inclusion.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// The submission was not included in time.
    ///
    /// The submission may still be included later. Re-check it through the handle instead of
    /// resubmitting.
    #[error("user operation {handle} not included after {waited:?}")]
    Timeout {
        /// The submission being tracked.
        handle: SubmissionHandle,
        /// How long the tracker waited.
        waited: Duration,
    },
    /// Polling failed with a non-retryable transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl TrackingError {
    /// Whether waiting again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(err) => err.is_retryable(),
        }
    }
}
