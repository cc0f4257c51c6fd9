//! ERC-4337 v0.7 user operations carrying an optional EIP-7702 authorization.

use super::SponsorshipGrant;
use alloy::{
    eips::eip7702::SignedAuthorization,
    primitives::{Address, B256, Bytes, ChainId, U256, keccak256},
    sol,
    sol_types::SolValue,
};
use serde::{Deserialize, Serialize};

sol! {
    /// The subset of the v0.7 entrypoint the client reads from.
    #[sol(rpc)]
    interface IEntryPoint {
        /// Returns the next nonce of `sender` for the given nonce `key`.
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
    }
}

/// A user operation in the unpacked JSON-RPC form bundlers accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// The account sending the operation. For a 7702 account this is the EOA itself.
    pub sender: Address,
    /// Entrypoint nonce of the account.
    pub nonce: U256,
    /// Account factory, unused for delegated EOAs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    /// Account factory calldata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,
    /// The calldata executed by the account.
    pub call_data: Bytes,
    /// Gas for the execution phase.
    pub call_gas_limit: U256,
    /// Gas for the validation phase.
    pub verification_gas_limit: U256,
    /// Gas paid to the bundler for overhead.
    pub pre_verification_gas: U256,
    /// Max fee per gas.
    pub max_fee_per_gas: U256,
    /// Max priority fee per gas.
    pub max_priority_fee_per_gas: U256,
    /// The sponsoring paymaster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    /// Gas for the paymaster validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    /// Gas for the paymaster post-op.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
    /// Paymaster specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
    /// Signature over [`UserOperation::hash`].
    pub signature: Bytes,
    /// Authorization delegating `sender`, attached while the account is not delegated yet.
    #[serde(default, rename = "eip7702Auth", skip_serializing_if = "Option::is_none")]
    pub eip7702_auth: Option<SignedAuthorization>,
}

impl UserOperation {
    /// Creates an operation with empty gas fields.
    pub fn new(sender: Address, nonce: U256, call_data: Bytes) -> Self {
        Self {
            sender,
            nonce,
            factory: None,
            factory_data: None,
            call_data,
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            paymaster: None,
            paymaster_verification_gas_limit: None,
            paymaster_post_op_gas_limit: None,
            paymaster_data: None,
            signature: Bytes::new(),
            eip7702_auth: None,
        }
    }

    /// Attaches an authorization.
    pub fn with_authorization(mut self, authorization: Option<SignedAuthorization>) -> Self {
        self.eip7702_auth = authorization;
        self
    }

    /// Sets the signature.
    pub fn with_signature(mut self, signature: impl Into<Bytes>) -> Self {
        self.signature = signature.into();
        self
    }

    /// Applies gas limits, fees and paymaster fields of a sponsorship grant.
    pub fn apply_grant(&mut self, grant: &SponsorshipGrant) {
        self.call_gas_limit = grant.call_gas_limit;
        self.verification_gas_limit = grant.verification_gas_limit;
        self.pre_verification_gas = grant.pre_verification_gas;
        self.max_fee_per_gas = grant.max_fee_per_gas;
        self.max_priority_fee_per_gas = grant.max_priority_fee_per_gas;
        self.paymaster = Some(grant.paymaster);
        self.paymaster_verification_gas_limit = Some(grant.paymaster_verification_gas_limit);
        self.paymaster_post_op_gas_limit = Some(grant.paymaster_post_op_gas_limit);
        self.paymaster_data = Some(grant.paymaster_data.clone());
    }

    /// Whether a paymaster pays for this operation.
    pub fn is_sponsored(&self) -> bool {
        self.paymaster.is_some_and(|paymaster| !paymaster.is_zero())
    }

    /// `factory ++ factoryData`, or empty.
    fn init_code(&self) -> Vec<u8> {
        match self.factory {
            Some(factory) => [factory.as_slice(), self.factory_data.as_deref().map(|d| &d[..]).unwrap_or_default()]
                .concat(),
            None => Vec::new(),
        }
    }

    /// `paymaster ++ uint128(verificationGas) ++ uint128(postOpGas) ++ paymasterData`, or empty.
    fn paymaster_and_data(&self) -> Vec<u8> {
        let Some(paymaster) = self.paymaster else { return Vec::new() };

        let mut out = Vec::with_capacity(52 + self.paymaster_data.as_ref().map_or(0, |d| d.len()));
        out.extend_from_slice(paymaster.as_slice());
        out.extend_from_slice(
            &self.paymaster_verification_gas_limit.unwrap_or_default().saturating_to::<u128>().to_be_bytes(),
        );
        out.extend_from_slice(
            &self.paymaster_post_op_gas_limit.unwrap_or_default().saturating_to::<u128>().to_be_bytes(),
        );
        out.extend_from_slice(self.paymaster_data.as_deref().map(|d| &d[..]).unwrap_or_default());
        out
    }

    /// The user operation hash for the given entrypoint and chain.
    ///
    /// The signature is not part of the hash.
    pub fn hash(&self, entrypoint: Address, chain_id: ChainId) -> B256 {
        let packed = (
            self.sender,
            self.nonce,
            keccak256(self.init_code()),
            keccak256(&self.call_data),
            pack_u128_pair(self.verification_gas_limit, self.call_gas_limit),
            self.pre_verification_gas,
            pack_u128_pair(self.max_priority_fee_per_gas, self.max_fee_per_gas),
            keccak256(self.paymaster_and_data()),
        )
            .abi_encode();

        keccak256((keccak256(packed), entrypoint, U256::from(chain_id)).abi_encode())
    }
}

/// Packs two values into one word as `high << 128 | low`, each truncated to 128 bits.
fn pack_u128_pair(high: U256, low: U256) -> B256 {
    let high = U256::from(high.saturating_to::<u128>());
    let low = U256::from(low.saturating_to::<u128>());
    B256::from((high << 128) | low)
}
