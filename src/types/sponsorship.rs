//! Sponsorship policy types.

use super::UserOperation;
use crate::error::{ConfigError, SponsorshipError};
use alloy::primitives::{Address, Bytes, ChainId, U256};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Identifier of an off-chain sponsorship policy.
///
/// The core does not interpret it beyond requiring it to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(String);

impl PolicyId {
    /// Creates a new [`PolicyId`], rejecting empty or blank identifiers.
    pub fn new(id: impl Into<String>) -> Result<Self, ConfigError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ConfigError::EmptyPolicyId);
        }
        Ok(Self(id))
    }

    /// The identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty or blank.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl FromStr for PolicyId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the sponsor gets to see before granting sponsorship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPreview {
    /// Chain the bundle is submitted on.
    pub chain_id: ChainId,
    /// Entrypoint the operation is submitted to.
    pub entry_point: Address,
    /// The operation, signed with a dummy signature.
    pub user_operation: UserOperation,
}

/// Gas and paymaster data granted by the sponsor.
///
/// Matches the result of `alchemy_requestGasAndPaymasterAndData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipGrant {
    /// The paymaster paying for gas.
    pub paymaster: Address,
    /// Paymaster data, usually carrying the sponsor's signature.
    pub paymaster_data: Bytes,
    /// Gas for the paymaster validation.
    pub paymaster_verification_gas_limit: U256,
    /// Gas for the paymaster post-op.
    pub paymaster_post_op_gas_limit: U256,
    /// Gas for the execution phase.
    pub call_gas_limit: U256,
    /// Gas for the validation phase.
    pub verification_gas_limit: U256,
    /// Bundler overhead gas.
    pub pre_verification_gas: U256,
    /// Max fee per gas.
    pub max_fee_per_gas: U256,
    /// Max priority fee per gas.
    pub max_priority_fee_per_gas: U256,
}

impl SponsorshipGrant {
    /// Checks that the grant actually sponsors the operation.
    ///
    /// A grant without a paymaster would make the account pay for gas.
    pub fn validate(&self) -> Result<(), SponsorshipError> {
        if self.paymaster.is_zero() {
            return Err(SponsorshipError::InvalidGrant("grant has no paymaster".into()));
        }
        if self.call_gas_limit.is_zero() || self.verification_gas_limit.is_zero() {
            return Err(SponsorshipError::InvalidGrant("grant has zero gas limits".into()));
        }
        Ok(())
    }
}
