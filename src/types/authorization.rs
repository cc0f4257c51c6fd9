//! Unsigned EIP-7702 authorization tuples.

use alloy::{
    eips::eip7702::{Authorization, SignedAuthorization},
    primitives::{Address, B256, ChainId, Signature, U256},
};
use serde::{Deserialize, Serialize};

/// An EIP-7702 authorization tuple waiting to be signed.
///
/// Signing consumes the tuple, so one tuple yields at most one [`SignedAuthorization`].
///
/// Wallet tooling names the delegate field `address` or `contractAddress`; both are accepted when
/// deserializing.
#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedAuthorization {
    /// The chain the authorization is valid on.
    pub chain_id: ChainId,
    /// The contract the account delegates its code to.
    #[serde(
        rename = "delegateAddress",
        alias = "delegate",
        alias = "address",
        alias = "contractAddress"
    )]
    pub delegate: Address,
    /// The account nonce the authorization is valid for.
    pub nonce: u64,
}

impl UnsignedAuthorization {
    /// Creates a new [`UnsignedAuthorization`].
    pub const fn new(chain_id: ChainId, delegate: Address, nonce: u64) -> Self {
        Self { chain_id, delegate, nonce }
    }

    /// Returns the alloy [`Authorization`] for this tuple.
    pub fn as_authorization(&self) -> Authorization {
        Authorization { chain_id: U256::from(self.chain_id), address: self.delegate, nonce: self.nonce }
    }

    /// The hash the authority has to sign.
    pub fn signature_hash(&self) -> B256 {
        self.as_authorization().signature_hash()
    }

    /// Attaches a signature, consuming the tuple.
    pub fn into_signed(self, signature: Signature) -> SignedAuthorization {
        self.as_authorization().into_signed(signature)
    }
}
