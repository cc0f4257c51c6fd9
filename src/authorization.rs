//! Authorization builder.
//!
//! Builds EIP-7702 authorization tuples for the session identity and signs them. An account that
//! is already delegated to the requested delegate never gets a new authorization.

use crate::{
    chain::ChainStateReader,
    error::{AuthError, ClientError},
    nonce::NonceReservations,
    signers::Identity,
    types::UnsignedAuthorization,
};
use alloy::{
    eips::eip7702::SignedAuthorization,
    primitives::{Address, ChainId, U256},
};
use dashmap::DashSet;
use std::sync::Arc;
use tracing::debug;

/// Builds and signs authorizations for one [`Identity`].
#[derive(Debug, Clone)]
pub struct AuthorizationBuilder {
    identity: Identity,
    chain_state: Arc<dyn ChainStateReader>,
    nonces: NonceReservations,
    /// `(chain, account, delegate)` triples known to be delegated in this session.
    delegated: Arc<DashSet<(ChainId, Address, Address)>>,
}

impl AuthorizationBuilder {
    /// Creates a new [`AuthorizationBuilder`].
    pub fn new(identity: Identity, chain_state: Arc<dyn ChainStateReader>) -> Self {
        Self {
            identity,
            chain_state,
            nonces: NonceReservations::default(),
            delegated: Default::default(),
        }
    }

    /// The identity authorizations are built for.
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Builds an authorization delegating the identity to `delegate` on `chain_id`.
    ///
    /// Returns `None` if the account is already delegated to `delegate`. Concurrent calls never
    /// return the same nonce.
    pub async fn build(
        &self,
        chain_id: ChainId,
        delegate: Address,
    ) -> Result<Option<UnsignedAuthorization>, ClientError> {
        let address = self.identity.address();

        if chain_id != self.chain_state.chain_id() {
            return Err(AuthError::ChainMismatch {
                expected: self.chain_state.chain_id(),
                got: U256::from(chain_id),
            }
            .into());
        }

        if self.is_known_delegated(chain_id, address, delegate) {
            debug!(%address, %delegate, chain_id, "delegation cached, skipping authorization");
            return Ok(None);
        }

        if self.chain_state.is_delegated(address, delegate).await? {
            debug!(%address, %delegate, chain_id, "already delegated, skipping authorization");
            self.mark_delegated(chain_id, address, delegate);
            return Ok(None);
        }

        let nonce = self
            .nonces
            .reserve(chain_id, address, || self.chain_state.nonce(address, chain_id))
            .await?;

        debug!(%address, %delegate, chain_id, nonce, "built authorization");
        Ok(Some(UnsignedAuthorization::new(chain_id, delegate, nonce)))
    }

    /// Signs an authorization built by [`AuthorizationBuilder::build`].
    ///
    /// If signing fails, the nonce is released for the next build.
    pub async fn sign(
        &self,
        authorization: UnsignedAuthorization,
    ) -> Result<SignedAuthorization, ClientError> {
        let UnsignedAuthorization { chain_id, nonce, .. } = authorization;
        match self.identity.sign_authorization(authorization).await {
            Ok(signed) => Ok(signed),
            Err(err) => {
                self.nonces.release(chain_id, self.identity.address(), nonce).await;
                Err(err.into())
            }
        }
    }

    /// Returns the nonce of an authorization that was never submitted, so the next build can use
    /// it again.
    pub async fn release(&self, authorization: &SignedAuthorization) {
        let Ok(chain_id) = ChainId::try_from(*authorization.chain_id()) else { return };
        self.nonces.release(chain_id, self.identity.address(), authorization.nonce()).await;
    }

    /// Records that `address` delegates to `delegate` on `chain_id`.
    pub fn mark_delegated(&self, chain_id: ChainId, address: Address, delegate: Address) {
        self.delegated.insert((chain_id, address, delegate));
    }

    /// Whether `address` is known to delegate to `delegate` on `chain_id` in this session.
    pub fn is_known_delegated(
        &self,
        chain_id: ChainId,
        address: Address,
        delegate: Address,
    ) -> bool {
        self.delegated.contains(&(chain_id, address, delegate))
    }
}
