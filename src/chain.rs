//! Chain state reader.

use crate::{error::TransportError, transport::with_timeout, types::IEntryPoint};
use alloy::{
    eips::eip7702::constants::EIP7702_DELEGATION_DESIGNATOR,
    primitives::{Address, ChainId, U256, aliases::U192},
    providers::{DynProvider, Provider},
};
use std::{fmt::Debug, time::Duration};
use tracing::trace;

/// Read access to the account state the client depends on.
#[async_trait::async_trait]
pub trait ChainStateReader: Debug + Send + Sync {
    /// The chain this reader reads from.
    fn chain_id(&self) -> ChainId;

    /// Returns the transaction nonce of `address` on `chain_id`, including pending transactions.
    async fn nonce(&self, address: Address, chain_id: ChainId) -> Result<u64, TransportError>;

    /// Whether `address` currently delegates its code to `delegate`.
    async fn is_delegated(
        &self,
        address: Address,
        delegate: Address,
    ) -> Result<bool, TransportError>;

    /// Returns the entrypoint nonce of `sender` for nonce key 0.
    async fn user_op_nonce(
        &self,
        sender: Address,
        entry_point: Address,
    ) -> Result<U256, TransportError>;
}

/// A [`ChainStateReader`] backed by a node provider.
#[derive(Debug, Clone)]
pub struct RpcChainState {
    provider: DynProvider,
    chain_id: ChainId,
    request_timeout: Duration,
}

impl RpcChainState {
    /// Creates a new [`RpcChainState`], checking that the provider serves `chain_id`.
    pub async fn new(
        provider: DynProvider,
        chain_id: ChainId,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let actual = with_timeout(request_timeout, provider.get_chain_id()).await?;
        if actual != chain_id {
            return Err(TransportError::InvalidResponse(format!(
                "endpoint serves chain {actual}, expected {chain_id}"
            )));
        }
        Ok(Self { provider, chain_id, request_timeout })
    }
}

#[async_trait::async_trait]
impl ChainStateReader for RpcChainState {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn nonce(&self, address: Address, chain_id: ChainId) -> Result<u64, TransportError> {
        if chain_id != self.chain_id {
            return Err(TransportError::InvalidResponse(format!(
                "reader serves chain {}, requested {chain_id}",
                self.chain_id
            )));
        }
        with_timeout(self.request_timeout, self.provider.get_transaction_count(address).pending())
            .await
    }

    async fn is_delegated(
        &self,
        address: Address,
        delegate: Address,
    ) -> Result<bool, TransportError> {
        let code = with_timeout(self.request_timeout, self.provider.get_code_at(address)).await?;
        let delegated = is_delegation_to(&code, delegate);
        trace!(%address, %delegate, delegated, "checked delegation");
        Ok(delegated)
    }

    async fn user_op_nonce(
        &self,
        sender: Address,
        entry_point: Address,
    ) -> Result<U256, TransportError> {
        let entry_point = IEntryPoint::new(entry_point, &self.provider);
        with_timeout(self.request_timeout, async {
            entry_point.getNonce(sender, U192::ZERO).call().await.map_err(|err| match err {
                alloy::contract::Error::TransportError(err) => TransportError::from(err),
                err => TransportError::InvalidResponse(err.to_string()),
            })
        })
        .await
    }
}

/// Whether `code` is an EIP-7702 delegation designator pointing at `delegate`.
pub fn is_delegation_to(code: &[u8], delegate: Address) -> bool {
    code.strip_prefix(EIP7702_DELEGATION_DESIGNATOR.as_slice())
        .is_some_and(|target| target == delegate.as_slice())
}
