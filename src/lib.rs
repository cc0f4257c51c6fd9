//! # Delegator
//!
//! Client library delegating an externally owned account to a smart account with an [EIP-7702]
//! authorization and sending gas-sponsored [ERC-4337] user operations on its behalf.
//!
//! The [`SmartAccountClient`](client::SmartAccountClient) ties together a resolved
//! [`Identity`](signers::Identity), an [`AuthorizationBuilder`](authorization::AuthorizationBuilder),
//! a [`SponsorshipGateway`](sponsor::SponsorshipGateway), a
//! [`BundlerTransport`](transport::BundlerTransport) and a
//! [`TransactionTracker`](tracker::TransactionTracker).
//!
//! [EIP-7702]: https://eips.ethereum.org/EIPS/eip-7702
//! [ERC-4337]: https://eips.ethereum.org/EIPS/eip-4337

pub mod authorization;
pub mod chain;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod nonce;
pub mod serde;
pub mod signers;
pub mod sponsor;
pub mod tracker;
pub mod transport;
pub mod types;
