//! Delegator constants.

use alloy::primitives::{Address, address};
use std::time::Duration;

/// ERC-4337 v0.7 entrypoint address, identical on every supported chain.
pub const ENTRYPOINT_V07: Address = address!("0x0000000071727De22E5E9d8BAf0edAc6f37da032");

/// Modular account implementation EOAs delegate to by default.
pub const DEFAULT_DELEGATE: Address = address!("0x69007702764179f14F51cdce752f4f775d74E139");

/// The call target used by the demo flow.
pub const DEMO_TARGET: Address = address!("0xc0ffee254729296a45a3885639AC7E10F9d54979");

/// Sepolia chain id.
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// Default time the signer has to answer a signature request.
pub const DEFAULT_SIGNING_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout of a single RPC request to the bundler, sponsor or node.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of attempts made when submitting a bundle over a flaky transport.
pub const DEFAULT_TRANSPORT_ATTEMPTS: u32 = 3;

/// Default backoff between bundle submission attempts. Doubles on each retry.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Default time to wait for a user operation to be included.
pub const DEFAULT_TRACKING_TIMEOUT: Duration = Duration::from_secs(120);

/// Default first poll interval of the tracker. Doubles on each empty poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound for the tracker poll interval.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(8);

/// Maximum number of intents accepted in one bundle.
pub const MAX_INTENTS_PER_BUNDLE: usize = 32;

/// Maximum calldata size of a single intent.
pub const MAX_INTENT_CALLDATA_SIZE: usize = 128 * 1024;

/// Signature placed on user operations sent for sponsorship, before the real signature exists.
///
/// It is a well-formed 65 byte ECDSA signature, so gas estimation of the validation phase matches
/// the real signature closely.
pub const DUMMY_SIGNATURE: [u8; 65] = {
    let mut sig = [0xff; 65];
    sig[64] = 0x1c;
    sig
};
