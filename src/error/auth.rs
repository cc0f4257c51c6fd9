use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Errors related to 7702 authorizations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The authorization was signed by someone other than the identity.
    #[error("invalid authorization authority, expected {expected}, got {got}")]
    AuthorityMismatch {
        /// The identity address.
        expected: Address,
        /// The recovered authority.
        got: Address,
    },
    /// The authorization was signed for another chain.
    #[error("invalid authorization chain id, expected {expected}, got {got}")]
    ChainMismatch {
        /// The configured chain id.
        expected: u64,
        /// The chain id in the authorization.
        got: U256,
    },
    /// The authorization delegates to a contract other than the configured delegate.
    #[error("invalid authorization delegate, expected {expected}, got {got}")]
    UnexpectedDelegate {
        /// The configured delegate.
        expected: Address,
        /// The delegate in the authorization.
        got: Address,
    },
    /// The authorization, or one with a higher nonce, was already submitted by this client.
    #[error("authorization for {authority} with nonce {nonce} was already submitted")]
    AlreadySubmitted {
        /// The authority of the authorization.
        authority: Address,
        /// The nonce of the authorization.
        nonce: u64,
    },
    /// The signature of the authorization could not be recovered.
    #[error("could not recover authorization authority: {0}")]
    Recovery(String),
}
