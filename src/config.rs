//! Client configuration.
use crate::{
    constants::{
        DEFAULT_DELEGATE, DEFAULT_MAX_POLL_INTERVAL, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT,
        DEFAULT_RETRY_BACKOFF, DEFAULT_SIGNING_TIMEOUT, DEFAULT_TRACKING_TIMEOUT,
        DEFAULT_TRANSPORT_ATTEMPTS, ENTRYPOINT_V07, SEPOLIA_CHAIN_ID,
    },
    error::ConfigError,
    types::PolicyId,
};
use alloy::primitives::{Address, ChainId};
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::{net::IpAddr, path::Path, time::Duration};
use url::{Host, Url};

/// Smart account client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// The chain to submit on.
    #[serde(default = "default_chain_id")]
    pub chain_id: ChainId,
    /// Node and bundler endpoint.
    pub endpoint: Url,
    /// Sponsor endpoint. Defaults to [`ClientConfig::endpoint`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor_endpoint: Option<Url>,
    /// API key of the endpoints, appended to their path.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    /// Sponsorship policy.
    #[serde(default)]
    pub policy_id: String,
    /// Contract the account delegates to.
    #[serde(default = "default_delegate")]
    pub delegate: Address,
    /// ERC-4337 entrypoint.
    #[serde(default = "default_entry_point")]
    pub entry_point: Address,
    /// Inclusion tracking configuration.
    #[serde(default)]
    pub tracking: TrackingConfig,
    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Time the signer has to answer a signature request.
    #[serde(with = "crate::serde::duration", default = "default_signing_timeout")]
    pub signing_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for `endpoint` with defaults for everything else.
    pub fn new(endpoint: Url) -> Self {
        Self {
            chain_id: SEPOLIA_CHAIN_ID,
            endpoint,
            sponsor_endpoint: None,
            api_key: None,
            policy_id: String::new(),
            delegate: DEFAULT_DELEGATE,
            entry_point: ENTRYPOINT_V07,
            tracking: TrackingConfig::default(),
            transport: TransportConfig::default(),
            signing_timeout: DEFAULT_SIGNING_TIMEOUT,
        }
    }

    /// Sets the chain id.
    pub fn with_chain_id(mut self, chain_id: ChainId) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the sponsor endpoint.
    pub fn with_sponsor_endpoint(mut self, endpoint: Option<Url>) -> Self {
        if let Some(endpoint) = endpoint {
            self.sponsor_endpoint = Some(endpoint);
        }
        self
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.or(self.api_key);
        self
    }

    /// Sets the sponsorship policy.
    pub fn with_policy_id(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = policy_id.into();
        self
    }

    /// Sets the delegate contract.
    pub fn with_delegate(mut self, delegate: Option<Address>) -> Self {
        if let Some(delegate) = delegate {
            self.delegate = delegate;
        }
        self
    }

    /// Sets the entrypoint.
    pub fn with_entry_point(mut self, entry_point: Option<Address>) -> Self {
        if let Some(entry_point) = entry_point {
            self.entry_point = entry_point;
        }
        self
    }

    /// Sets how long to wait for inclusion.
    pub fn with_tracking_timeout(mut self, timeout: Duration) -> Self {
        self.tracking.timeout = timeout;
        self
    }

    /// Sets the poll intervals of the tracker.
    pub fn with_poll_intervals(mut self, initial: Duration, max: Duration) -> Self {
        self.tracking.initial_poll_interval = initial;
        self.tracking.max_poll_interval = max;
        self
    }

    /// Sets the timeout of a single RPC request.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.transport.request_timeout = timeout;
        self
    }

    /// Sets the number of bundle submission attempts and the initial backoff between them.
    pub fn with_retries(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.transport.max_attempts = max_attempts;
        self.transport.retry_backoff = backoff;
        self
    }

    /// Sets the signing timeout.
    pub fn with_signing_timeout(mut self, timeout: Duration) -> Self {
        self.signing_timeout = timeout;
        self
    }

    /// Checks the configuration, failing on the first invalid option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id == 0 {
            return Err(ConfigError::ZeroChainId);
        }
        self.policy_id()?;
        if self.delegate.is_zero() {
            return Err(ConfigError::ZeroDelegate);
        }
        let endpoints = [Some(&self.endpoint), self.sponsor_endpoint.as_ref()];
        for endpoint in endpoints.into_iter().flatten() {
            if self.api_key.as_deref().is_none_or(str::is_empty) && !is_local(endpoint) {
                return Err(ConfigError::MissingApiKey(endpoint.to_string()));
            }
        }
        for (name, duration) in [
            ("signing timeout", self.signing_timeout),
            ("tracking timeout", self.tracking.timeout),
            ("initial poll interval", self.tracking.initial_poll_interval),
            ("request timeout", self.transport.request_timeout),
        ] {
            if duration.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        if self.tracking.max_poll_interval < self.tracking.initial_poll_interval {
            return Err(ConfigError::PollIntervals);
        }
        if self.transport.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }

    /// The sponsorship policy.
    pub fn policy_id(&self) -> Result<PolicyId, ConfigError> {
        PolicyId::new(self.policy_id.as_str())
    }

    /// The node and bundler URL, including the API key.
    pub fn rpc_url(&self) -> Result<Url, ConfigError> {
        self.with_key(&self.endpoint)
    }

    /// The sponsor URL, including the API key.
    pub fn sponsor_url(&self) -> Result<Url, ConfigError> {
        self.with_key(self.sponsor_endpoint.as_ref().unwrap_or(&self.endpoint))
    }

    fn with_key(&self, endpoint: &Url) -> Result<Url, ConfigError> {
        let Some(key) = self.api_key.as_deref().filter(|key| !key.is_empty()) else {
            return Ok(endpoint.clone());
        };

        let mut url = endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| ConfigError::InvalidEndpoint(endpoint.to_string()))?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }

    /// Load from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to a YAML file.
    ///
    /// The API key is never written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Inclusion tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// How long to wait for inclusion.
    #[serde(with = "crate::serde::duration")]
    pub timeout: Duration,
    /// The first poll interval. Doubles after every poll without a receipt.
    #[serde(with = "crate::serde::duration")]
    pub initial_poll_interval: Duration,
    /// Upper bound of the poll interval.
    #[serde(with = "crate::serde::duration")]
    pub max_poll_interval: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TRACKING_TIMEOUT,
            initial_poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Timeout of a single request.
    #[serde(with = "crate::serde::duration")]
    pub request_timeout: Duration,
    /// Attempts made to submit a bundle while the transport fails with retryable errors.
    pub max_attempts: u32,
    /// Backoff before the second attempt. Doubles on each further attempt.
    #[serde(with = "crate::serde::duration")]
    pub retry_backoff: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_attempts: DEFAULT_TRANSPORT_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

fn is_local(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => true,
    }
}

const fn default_chain_id() -> ChainId {
    SEPOLIA_CHAIN_ID
}

const fn default_delegate() -> Address {
    DEFAULT_DELEGATE
}

const fn default_entry_point() -> Address {
    ENTRYPOINT_V07
}

const fn default_signing_timeout() -> Duration {
    DEFAULT_SIGNING_TIMEOUT
}
