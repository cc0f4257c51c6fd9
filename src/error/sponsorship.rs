use super::TransportError;
use thiserror::Error;

/// Errors returned by the sponsorship policy gateway.
#[derive(Debug, Error)]
pub enum SponsorshipError {
    /// The policy denied sponsorship of the submission.
    #[error("sponsorship denied by policy {policy_id}: {reason}")]
    Denied {
        /// The policy that was consulted.
        policy_id: String,
        /// Reason given by the sponsor.
        reason: String,
    },
    /// The sponsor granted gas, but the grant is unusable.
    #[error("invalid sponsorship grant: {0}")]
    InvalidGrant(String),
    /// The sponsor could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SponsorshipError {
    /// Whether the request may succeed when repeated. Denials need a policy change first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            Self::Denied { .. } | Self::InvalidGrant(_) => false,
        }
    }
}
