use alloy::primitives::Address;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the signer adapter.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The user rejected the signature request.
    #[error("signing request denied: {0}")]
    Denied(String),
    /// The identity is not resolved yet, e.g. the wallet is not loaded.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    /// The signer did not answer in time.
    #[error("signing request timed out after {0:?}")]
    Timeout(Duration),
    /// The produced signature does not recover to the identity.
    #[error("signature recovers to {recovered}, expected {expected}")]
    InvalidSignature {
        /// The identity address.
        expected: Address,
        /// The recovered address.
        recovered: Address,
    },
    /// Error of the underlying signing provider.
    #[error(transparent)]
    Provider(#[from] alloy::signers::Error),
}

impl SignerError {
    /// Whether the request may succeed when repeated, possibly after the user reconnects.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Denied(_) | Self::Unavailable(_) | Self::Timeout(_))
    }
}
