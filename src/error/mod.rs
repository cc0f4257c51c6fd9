//! Delegator error types.
use thiserror::Error;

mod auth;
pub use auth::AuthError;

mod config;
pub use config::ConfigError;

mod intent;
pub use intent::IntentError;

mod signer;
pub use signer::SignerError;

mod sponsorship;
pub use sponsorship::SponsorshipError;

mod tracking;
pub use tracking::TrackingError;

mod transport;
pub use transport::TransportError;

/// The overarching error type returned by the [`SmartAccountClient`](crate::client::SmartAccountClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Errors raised by the signer adapter.
    #[error(transparent)]
    Signer(#[from] SignerError),
    /// Errors related to 7702 authorizations.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// An intent failed local validation.
    #[error(transparent)]
    Intent(#[from] IntentError),
    /// The sponsorship gateway did not grant sponsorship.
    #[error(transparent)]
    Sponsorship(#[from] SponsorshipError),
    /// Errors talking to the node or bundler.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Errors while waiting for inclusion.
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether the failed operation may succeed when attempted again without changing inputs.
    ///
    /// Note that a retryable error never makes it safe to resubmit a signed authorization: its
    /// nonce may already have been consumed on-chain.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Signer(err) => err.is_retryable(),
            Self::Sponsorship(err) => err.is_retryable(),
            Self::Transport(err) => err.is_retryable(),
            Self::Tracking(err) => err.is_retryable(),
            Self::Auth(_) | Self::Intent(_) | Self::Config(_) => false,
        }
    }
}
