use alloy::transports::{RpcError, TransportErrorKind};
use std::time::Duration;
use thiserror::Error;

/// Errors talking to the node, bundler or sponsor endpoints.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection level failure.
    #[error("network error: {0}")]
    Network(String),
    /// The request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The endpoint answered with an error.
    #[error("rpc error {code}: {message}")]
    Rejected {
        /// JSON-RPC error code, or the HTTP status.
        code: i64,
        /// Error message.
        message: String,
    },
    /// The response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// Any other error of the node provider.
    #[error(transparent)]
    Rpc(RpcError<TransportErrorKind>),
}

impl TransportError {
    /// Whether the request may succeed when repeated with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Rpc(RpcError::Transport(kind)) => kind.is_retry_err(),
            Self::Rejected { .. } | Self::InvalidResponse(_) | Self::Rpc(_) => false,
        }
    }

    /// Returns true if the endpoint reported the request as a duplicate of one it already
    /// accepted.
    pub fn is_already_known(&self) -> bool {
        match self {
            Self::Rejected { message, .. } => {
                let message = message.to_ascii_lowercase();
                message.contains("already known") || message.contains("already in mempool")
            }
            _ => false,
        }
    }
}

impl From<RpcError<TransportErrorKind>> for TransportError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err {
            RpcError::ErrorResp(payload) => {
                Self::Rejected { code: payload.code, message: payload.message.into_owned() }
            }
            RpcError::Transport(TransportErrorKind::HttpError(http)) => {
                if matches!(http.status, 429 | 502 | 503 | 504) {
                    Self::Network(format!("http {}: {}", http.status, http.body))
                } else {
                    Self::Rejected { code: http.status.into(), message: http.body }
                }
            }
            RpcError::Transport(
                kind @ (TransportErrorKind::BackendGone | TransportErrorKind::Custom(_)),
            ) => Self::Network(kind.to_string()),
            RpcError::NullResp => Self::InvalidResponse("null response".into()),
            RpcError::DeserError { err, .. } => Self::InvalidResponse(err.to_string()),
            err => Self::Rpc(err),
        }
    }
}

impl From<jsonrpsee::core::ClientError> for TransportError {
    fn from(err: jsonrpsee::core::ClientError) -> Self {
        use jsonrpsee::core::ClientError;

        match err {
            // Internal errors and exceeded limits are faults of the endpoint, not of the request.
            ClientError::Call(err) if matches!(err.code(), -32603 | -32005) => {
                Self::Network(format!("rpc error {}: {}", err.code(), err.message()))
            }
            ClientError::Call(err) => {
                Self::Rejected { code: err.code().into(), message: err.message().to_string() }
            }
            ClientError::Transport(err) => Self::Network(err.to_string()),
            ClientError::RestartNeeded(err) => Self::Network(err.to_string()),
            ClientError::ParseError(err) => Self::InvalidResponse(err.to_string()),
            // The client's own request timeout. The configured timeout is applied on top of it.
            ClientError::RequestTimeout => Self::Network("request timed out".into()),
            err => Self::InvalidResponse(err.to_string()),
        }
    }
}
