//! # Delegator CLI
use crate::{
    client::SmartAccountClient,
    config::ClientConfig,
    constants::DEMO_TARGET,
    metrics::setup_exporter,
    signers::{DynSigner, Identity},
    types::{ReceiptStatus, SubmissionHandle, UserOperationIntent},
};
use alloy::{
    primitives::{Address, Bytes, U256},
    signers::local::coins_bip39::{English, Mnemonic},
};
use alloy_chains::Chain;
use clap::{Parser, Subcommand};
use eyre::{OptionExt, bail};
use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tracing::info;
use url::Url;

/// Delegates an EOA to a smart account with EIP-7702 and sends sponsored user operations.
#[derive(Debug, Parser)]
#[command(author, about = "Delegator", long_about = None)]
pub struct Args {
    /// The configuration file.
    ///
    /// If missing, one is created from the CLI values under `delegator.yaml`. The API key is never
    /// written to it.
    #[arg(long, value_name = "CONFIG", env = "DELEGATOR_CONFIG", default_value = "delegator.yaml")]
    pub config: PathBuf,
    /// The node and bundler endpoint.
    #[arg(long, value_name = "RPC_ENDPOINT", env = "DELEGATOR_ENDPOINT")]
    pub endpoint: Option<Url>,
    /// The sponsor endpoint. Defaults to the node endpoint.
    #[arg(long = "sponsor-endpoint", value_name = "RPC_ENDPOINT")]
    pub sponsor_endpoint: Option<Url>,
    /// The API key of the endpoints.
    #[arg(long = "api-key", value_name = "KEY", env = "DELEGATOR_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// The gas sponsorship policy.
    #[arg(long = "policy-id", value_name = "POLICY", env = "DELEGATOR_POLICY_ID")]
    pub policy_id: Option<String>,
    /// The chain to submit on, by name or id.
    #[arg(long, value_name = "CHAIN")]
    pub chain: Option<Chain>,
    /// The contract the account delegates to.
    #[arg(long, value_name = "ADDRESS")]
    pub delegate: Option<Address>,
    /// The ERC-4337 entrypoint.
    #[arg(long = "entry-point", value_name = "ADDRESS")]
    pub entry_point: Option<Address>,
    /// How long to wait for inclusion.
    #[arg(long = "tracking-timeout", value_name = "SECONDS", value_parser = parse_duration_secs)]
    pub tracking_timeout: Option<Duration>,
    /// The private key of the account.
    #[arg(
        long = "private-key",
        value_name = "SECRET_KEY",
        env = "DELEGATOR_PRIVATE_KEY",
        hide_env_values = true,
        conflicts_with = "mnemonic"
    )]
    pub private_key: Option<String>,
    /// The mnemonic to derive the account from.
    #[arg(long, value_name = "MNEMONIC", env = "DELEGATOR_MNEMONIC", hide_env_values = true)]
    pub mnemonic: Option<Mnemonic<English>>,
    /// The index of the account derived from the mnemonic.
    #[arg(long = "mnemonic-index", value_name = "NUM", default_value_t = 0)]
    pub mnemonic_index: usize,
    /// Serve Prometheus metrics on this port.
    #[arg(long = "metrics-port", value_name = "PORT")]
    pub metrics_port: Option<u16>,
    /// The command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Commands of the CLI.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Delegates the account if needed and sends one sponsored call.
    Send {
        /// The call target.
        #[arg(long, value_name = "ADDRESS", default_value_t = DEMO_TARGET)]
        target: Address,
        /// Native value to send, in wei.
        #[arg(long, value_name = "WEI", default_value_t = U256::ZERO)]
        value: U256,
        /// The calldata. Odd-length hex is left-padded.
        #[arg(long, value_name = "HEX", default_value = "0x0", value_parser = parse_call_data)]
        data: Bytes,
    },
    /// Checks the status of a submission once.
    Status {
        /// The handle returned on submission.
        handle: SubmissionHandle,
    },
}

impl Args {
    /// Runs the command.
    pub async fn run(self) -> eyre::Result<()> {
        if let Some(port) = self.metrics_port {
            setup_exporter((IpAddr::V4(Ipv4Addr::LOCALHOST), port))?;
            info!(port, "serving metrics");
        }

        let config = self.load_client_config()?;

        let signer = self.signer()?;
        let identity = Identity::resolve(Arc::new(signer), config.signing_timeout).await?;
        let client = SmartAccountClient::connect(config, identity).await?;

        match self.command {
            Command::Send { target, value, data } => {
                let receipt = client
                    .delegate_and_send(vec![UserOperationIntent::new(target, value, data)])
                    .await?;
                match receipt.status {
                    ReceiptStatus::Included => {
                        let tx_hash = receipt.transaction_hash.ok_or_eyre("receipt has no hash")?;
                        info!(handle = %receipt.handle, %tx_hash, "transaction included");
                        println!("{tx_hash}");
                    }
                    ReceiptStatus::Failed { reason } => {
                        bail!("user operation {} reverted: {reason:?}", receipt.handle)
                    }
                    ReceiptStatus::Pending => bail!("user operation {} pending", receipt.handle),
                }
            }
            Command::Status { handle } => {
                let receipt = client.tracker().check(handle).await?;
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            }
        }

        Ok(())
    }

    /// Loads the config file and merges the CLI values over it.
    ///
    /// A missing file is created from the CLI values, but only once they form a valid
    /// configuration.
    pub fn load_client_config(&self) -> eyre::Result<ClientConfig> {
        if self.config.exists() {
            let config = self.merge_client_config(ClientConfig::load_from_file(&self.config)?);
            config.validate()?;
            return Ok(config);
        }

        let endpoint = self.endpoint.clone().ok_or_eyre("missing --endpoint")?;
        let config = self.merge_client_config(ClientConfig::new(endpoint));
        config.validate()?;
        config.save_to_file(&self.config)?;
        Ok(config)
    }

    /// Merges [`Args`] values into an existing [`ClientConfig`] instance.
    pub fn merge_client_config(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(chain) = self.chain {
            config = config.with_chain_id(chain.id());
        }
        if let Some(policy_id) = &self.policy_id {
            config = config.with_policy_id(policy_id.clone());
        }
        if let Some(timeout) = self.tracking_timeout {
            config = config.with_tracking_timeout(timeout);
        }
        config
            .with_sponsor_endpoint(self.sponsor_endpoint.clone())
            .with_api_key(self.api_key.clone())
            .with_delegate(self.delegate)
            .with_entry_point(self.entry_point)
    }

    fn signer(&self) -> eyre::Result<DynSigner> {
        match (&self.private_key, &self.mnemonic) {
            (Some(key), _) => DynSigner::from_signing_key(key),
            (None, Some(mnemonic)) => {
                DynSigner::derive_from_mnemonic(mnemonic.clone(), self.mnemonic_index + 1)?
                    .pop()
                    .ok_or_eyre("no key derived")
            }
            (None, None) => bail!("either --private-key or --mnemonic is required"),
        }
    }
}

/// Parses a string representing seconds to a [`Duration`].
fn parse_duration_secs(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    let seconds = arg.parse()?;
    Ok(Duration::from_secs(seconds))
}

/// Parses call data, accepting odd-length hex.
fn parse_call_data(arg: &str) -> eyre::Result<Bytes> {
    Ok(crate::serde::call_data::parse(arg)?)
}
