use thiserror::Error;

/// Errors raised while validating a [`ClientConfig`](crate::config::ClientConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The sponsorship policy id is empty.
    #[error("sponsorship policy id is empty")]
    EmptyPolicyId,
    /// No API key was provided for a remote endpoint.
    #[error("missing API key for endpoint {0}")]
    MissingApiKey(String),
    /// The delegate contract is the zero address.
    #[error("delegate address is the zero address")]
    ZeroDelegate,
    /// The chain id is zero.
    #[error("chain id must be non-zero")]
    ZeroChainId,
    /// A timeout or interval is zero.
    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),
    /// The tracker would poll slower at first than at most.
    #[error("max poll interval must not be lower than the initial poll interval")]
    PollIntervals,
    /// The endpoint URL can not carry an API key.
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),
    /// At least one transport attempt is needed.
    #[error("transport attempts must be at least 1")]
    ZeroAttempts,
}
