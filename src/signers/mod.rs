//! Signer adapter.
//!
//! The client never talks to a concrete wallet. Wallet integrations implement
//! [`SigningProvider`], and the caller resolves the active [`Identity`] once per session and
//! passes it into the client.

mod r#dyn;
pub use r#dyn::DynSigner;

use crate::{error::SignerError, types::UnsignedAuthorization};
use alloy::{
    dyn_abi::TypedData,
    eips::eip7702::{Authorization, SignedAuthorization},
    primitives::{Address, Signature},
};
use std::{fmt::Debug, future::Future, sync::Arc, time::Duration};
use tracing::debug;

/// An external signing capability, e.g. an embedded or custodial wallet.
///
/// Implementations return [`SignerError::Denied`] when the user rejects a request and
/// [`SignerError::Unavailable`] when the wallet is not ready.
#[async_trait::async_trait]
pub trait SigningProvider: Debug + Send + Sync {
    /// Returns the address of the key.
    async fn address(&self) -> Result<Address, SignerError>;

    /// Signs `message` with an [EIP-191] prefix.
    ///
    /// [EIP-191]: https://eips.ethereum.org/EIPS/eip-191
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SignerError>;

    /// Signs an [EIP-712] payload.
    ///
    /// [EIP-712]: https://eips.ethereum.org/EIPS/eip-712
    async fn sign_typed_data(&self, payload: &TypedData) -> Result<Signature, SignerError>;

    /// Signs an [EIP-7702] authorization tuple.
    ///
    /// [EIP-7702]: https://eips.ethereum.org/EIPS/eip-7702
    async fn sign_authorization(
        &self,
        authorization: &Authorization,
    ) -> Result<Signature, SignerError>;
}

/// The resolved key-holding identity of a session.
///
/// Every request is bounded by the signing timeout.
#[derive(Debug, Clone)]
pub struct Identity {
    address: Address,
    provider: Arc<dyn SigningProvider>,
    timeout: Duration,
}

impl Identity {
    /// Resolves the identity behind `provider` by querying its address once.
    pub async fn resolve(
        provider: Arc<dyn SigningProvider>,
        timeout: Duration,
    ) -> Result<Self, SignerError> {
        let address = bounded(timeout, provider.address()).await?;
        debug!(%address, "resolved identity");
        Ok(Self { address, provider, timeout })
    }

    /// The address of the identity.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Signs `message` with an EIP-191 prefix.
    pub async fn sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        bounded(self.timeout, self.provider.sign_message(message)).await
    }

    /// Signs an EIP-712 payload.
    pub async fn sign_typed_data(&self, payload: &TypedData) -> Result<Signature, SignerError> {
        bounded(self.timeout, self.provider.sign_typed_data(payload)).await
    }

    /// Signs an authorization tuple, consuming it.
    ///
    /// The signature is verified to recover to this identity.
    pub async fn sign_authorization(
        &self,
        authorization: UnsignedAuthorization,
    ) -> Result<SignedAuthorization, SignerError> {
        let signature = bounded(
            self.timeout,
            self.provider.sign_authorization(&authorization.as_authorization()),
        )
        .await?;

        let signed = authorization.into_signed(signature);
        let recovered = signed.recover_authority().map_err(|_| SignerError::InvalidSignature {
            expected: self.address,
            recovered: Address::ZERO,
        })?;
        if recovered != self.address {
            return Err(SignerError::InvalidSignature { expected: self.address, recovered });
        }

        debug!(
            address = %self.address,
            chain_id = %signed.chain_id(),
            delegate = %signed.address(),
            nonce = signed.nonce(),
            "signed authorization"
        );
        Ok(signed)
    }
}

/// Bounds a signing request by `timeout`.
async fn bounded<T>(
    timeout: Duration,
    request: impl Future<Output = Result<T, SignerError>>,
) -> Result<T, SignerError> {
    tokio::time::timeout(timeout, request).await.map_err(|_| SignerError::Timeout(timeout))?
}
