//! User operation intents and their encoding for the delegated account.

use crate::{
    constants::{MAX_INTENT_CALLDATA_SIZE, MAX_INTENTS_PER_BUNDLE},
    error::IntentError,
};
use alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};

sol! {
    /// ERC-7579 call struct.
    #[sol(all_derives)]
    #[derive(Debug, PartialEq, Eq)]
    struct Call {
        /// The call target.
        address target;
        /// Amount of native value to send to the target.
        uint256 value;
        /// The calldata bytes.
        bytes data;
    }

    /// Execution interface of the modular account EOAs delegate to.
    interface IModularAccount {
        /// Executes a single call.
        function execute(address target, uint256 value, bytes calldata data) external payable returns (bytes memory result);

        /// Executes a batch of calls.
        function executeBatch(Call[] calldata calls) external payable returns (bytes[] memory results);
    }
}

/// A call the delegated smart account should perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOperationIntent {
    /// The call target.
    pub target: Address,
    /// Native value to send, in wei.
    #[serde(default)]
    pub value: U256,
    /// The calldata.
    #[serde(with = "crate::serde::call_data", default)]
    pub data: Bytes,
}

impl UserOperationIntent {
    /// Creates a new [`UserOperationIntent`].
    pub const fn new(target: Address, value: U256, data: Bytes) -> Self {
        Self { target, value, data }
    }

    /// Checks the intent at position `index` of a bundle.
    pub fn validate(&self, index: usize) -> Result<(), IntentError> {
        if self.target.is_zero() {
            return Err(IntentError::ZeroTarget { index });
        }
        if self.data.len() > MAX_INTENT_CALLDATA_SIZE {
            return Err(IntentError::CalldataTooLarge {
                index,
                size: self.data.len(),
                max: MAX_INTENT_CALLDATA_SIZE,
            });
        }
        Ok(())
    }
}

impl From<UserOperationIntent> for Call {
    fn from(intent: UserOperationIntent) -> Self {
        Self { target: intent.target, value: intent.value, data: intent.data }
    }
}

/// Validates a bundle of intents.
pub fn validate_intents(intents: &[UserOperationIntent]) -> Result<(), IntentError> {
    if intents.is_empty() {
        return Err(IntentError::Empty);
    }
    if intents.len() > MAX_INTENTS_PER_BUNDLE {
        return Err(IntentError::TooMany { count: intents.len(), max: MAX_INTENTS_PER_BUNDLE });
    }
    intents.iter().enumerate().try_for_each(|(index, intent)| intent.validate(index))
}

/// Encodes intents as the account's call data.
///
/// A single intent is encoded as `execute`, several as `executeBatch`.
pub fn encode_calls(intents: Vec<UserOperationIntent>) -> Bytes {
    if let [intent] = intents.as_slice() {
        return IModularAccount::executeCall {
            target: intent.target,
            value: intent.value,
            data: intent.data.clone(),
        }
        .abi_encode()
        .into();
    }

    IModularAccount::executeBatchCall { calls: intents.into_iter().map(Into::into).collect() }
        .abi_encode()
        .into()
}
