//! Delegator end-to-end test environment
//!
//! In-memory stand-ins for the chain, the sponsor and the bundler. The bundler applies included
//! operations to the chain, so delegation and nonces evolve the way they would on a real network.

use super::EOA_PRIVATE_KEY;
use alloy::{
    dyn_abi::TypedData,
    eips::eip7702::Authorization,
    primitives::{Address, ChainId, Signature, U256, address, bytes, keccak256},
    signers::local::PrivateKeySigner,
};
use delegator::{
    chain::ChainStateReader,
    client::SmartAccountClient,
    config::ClientConfig,
    constants::SEPOLIA_CHAIN_ID,
    error::{SignerError, SponsorshipError, TransportError},
    signers::{DynSigner, Identity, SigningProvider},
    sponsor::SponsorshipGateway,
    transport::BundlerTransport,
    types::{
        InclusionReceipt, PolicyId, SponsorshipGrant, SubmissionHandle, SubmissionPreview,
        UserOperation, UserOperationReceipt,
    },
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

/// The paymaster of [`grant`].
pub const PAYMASTER: Address = address!("0x2cc0c7981D846b9F2a16276556f6e8cb52BfB633");

/// The sponsorship policy used by the environment.
pub const POLICY_ID: &str = "test-policy";

/// The grant handed out by [`MockSponsor`].
pub fn grant() -> SponsorshipGrant {
    SponsorshipGrant {
        paymaster: PAYMASTER,
        paymaster_data: bytes!("0xdeadbeef"),
        paymaster_verification_gas_limit: U256::from(60_000),
        paymaster_post_op_gas_limit: U256::from(10_000),
        call_gas_limit: U256::from(50_000),
        verification_gas_limit: U256::from(120_000),
        pre_verification_gas: U256::from(45_000),
        max_fee_per_gas: U256::from(2_000_000_000u64),
        max_priority_fee_per_gas: U256::from(1_000_000_000u64),
    }
}

/// Account state of an in-memory chain.
#[derive(Debug)]
pub struct MockChain {
    chain_id: ChainId,
    state: Mutex<ChainState>,
    delegation_reads: AtomicUsize,
}

#[derive(Debug, Default)]
struct ChainState {
    nonces: HashMap<Address, u64>,
    user_op_nonces: HashMap<Address, u64>,
    delegations: HashMap<Address, Address>,
}

impl MockChain {
    pub fn new(chain_id: ChainId) -> Arc<Self> {
        Arc::new(Self { chain_id, state: Default::default(), delegation_reads: Default::default() })
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().unwrap().nonces.insert(address, nonce);
    }

    pub fn delegate(&self, address: Address, delegate: Address) {
        self.state.lock().unwrap().delegations.insert(address, delegate);
    }

    pub fn delegation(&self, address: Address) -> Option<Address> {
        self.state.lock().unwrap().delegations.get(&address).copied()
    }

    pub fn nonce_of(&self, address: Address) -> u64 {
        self.state.lock().unwrap().nonces.get(&address).copied().unwrap_or_default()
    }

    /// Number of delegation lookups served.
    pub fn delegation_reads(&self) -> usize {
        self.delegation_reads.load(Ordering::SeqCst)
    }

    /// Applies an included operation: its authorization is processed even if execution reverts.
    fn include(&self, user_op: &UserOperation) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        *state.user_op_nonces.entry(user_op.sender).or_default() += 1;

        let Some(auth) = &user_op.eip7702_auth else { return };
        let Ok(authority) = auth.recover_authority() else { return };
        let nonce = state.nonces.entry(authority).or_default();
        if *nonce == auth.nonce() {
            *nonce += 1;
            state.delegations.insert(authority, *auth.address());
        }
    }
}

#[async_trait::async_trait]
impl ChainStateReader for MockChain {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn nonce(&self, address: Address, chain_id: ChainId) -> Result<u64, TransportError> {
        assert_eq!(chain_id, self.chain_id);
        Ok(self.nonce_of(address))
    }

    async fn is_delegated(
        &self,
        address: Address,
        delegate: Address,
    ) -> Result<bool, TransportError> {
        self.delegation_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.delegation(address) == Some(delegate))
    }

    async fn user_op_nonce(
        &self,
        sender: Address,
        _entry_point: Address,
    ) -> Result<U256, TransportError> {
        let state = self.state.lock().unwrap();
        Ok(U256::from(state.user_op_nonces.get(&sender).copied().unwrap_or_default()))
    }
}

/// A sponsor granting every request until told to deny.
#[derive(Debug, Default)]
pub struct MockSponsor {
    denial: Mutex<Option<String>>,
    latency: Mutex<Duration>,
    requests: Mutex<Vec<(PolicyId, SubmissionPreview)>>,
}

impl MockSponsor {
    /// Delays every answer by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn deny(&self, reason: &str) {
        *self.denial.lock().unwrap() = Some(reason.to_string());
    }

    pub fn allow(&self) {
        *self.denial.lock().unwrap() = None;
    }

    pub fn requests(&self) -> Vec<(PolicyId, SubmissionPreview)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SponsorshipGateway for MockSponsor {
    async fn authorize(
        &self,
        policy_id: &PolicyId,
        preview: &SubmissionPreview,
    ) -> Result<SponsorshipGrant, SponsorshipError> {
        self.requests.lock().unwrap().push((policy_id.clone(), preview.clone()));
        let latency = *self.latency.lock().unwrap();
        tokio::time::sleep(latency).await;
        match self.denial.lock().unwrap().clone() {
            Some(reason) => Err(SponsorshipError::Denied { policy_id: policy_id.to_string(), reason }),
            None => Ok(grant()),
        }
    }
}

/// A wallet the user can refuse requests in.
#[derive(Debug)]
pub struct Wallet {
    signer: DynSigner,
    refusing: AtomicBool,
}

impl Wallet {
    pub fn new(signer: DynSigner) -> Arc<Self> {
        Arc::new(Self { signer, refusing: AtomicBool::new(false) })
    }

    /// Makes the user reject every following request.
    pub fn refuse(&self) {
        self.refusing.store(true, Ordering::SeqCst);
    }

    pub fn approve(&self) {
        self.refusing.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SignerError> {
        if self.refusing.load(Ordering::SeqCst) {
            return Err(SignerError::Denied("user rejected the request".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SigningProvider for Wallet {
    async fn address(&self) -> Result<Address, SignerError> {
        Ok(self.signer.address())
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        self.check()?;
        SigningProvider::sign_message(&self.signer, message).await
    }

    async fn sign_typed_data(&self, payload: &TypedData) -> Result<Signature, SignerError> {
        self.check()?;
        SigningProvider::sign_typed_data(&self.signer, payload).await
    }

    async fn sign_authorization(
        &self,
        authorization: &Authorization,
    ) -> Result<Signature, SignerError> {
        self.check()?;
        SigningProvider::sign_authorization(&self.signer, authorization).await
    }
}

/// An injected bundler failure.
#[derive(Debug)]
pub enum Failure {
    /// The request never reaches the bundler.
    Dropped(TransportError),
    /// The bundler accepts the operation but the response is lost.
    Lost(TransportError),
}

/// A bundler accepting operations into an in-memory mempool.
#[derive(Debug)]
pub struct MockBundler {
    chain: Arc<MockChain>,
    failures: Mutex<VecDeque<Failure>>,
    mempool: Mutex<Vec<(SubmissionHandle, UserOperation)>>,
    receipts: Mutex<HashMap<SubmissionHandle, UserOperationReceipt>>,
    polls: Mutex<HashMap<SubmissionHandle, usize>>,
    /// Pending polls before an operation is included.
    inclusion_delay: AtomicUsize,
    halted: AtomicBool,
    revert: AtomicBool,
    send_attempts: AtomicUsize,
    receipt_polls: AtomicUsize,
}

impl MockBundler {
    pub fn new(chain: Arc<MockChain>) -> Arc<Self> {
        Arc::new(Self {
            chain,
            failures: Default::default(),
            mempool: Default::default(),
            receipts: Default::default(),
            polls: Default::default(),
            inclusion_delay: AtomicUsize::new(1),
            halted: Default::default(),
            revert: Default::default(),
            send_attempts: Default::default(),
            receipt_polls: Default::default(),
        })
    }

    pub fn fail_next(&self, failure: Failure) {
        self.failures.lock().unwrap().push_back(failure);
    }

    /// Stops including operations until [`MockBundler::resume`].
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.halted.store(false, Ordering::SeqCst);
    }

    /// Makes included operations revert.
    pub fn revert_execution(&self) {
        self.revert.store(true, Ordering::SeqCst);
    }

    pub fn mempool(&self) -> Vec<(SubmissionHandle, UserOperation)> {
        self.mempool.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<UserOperation> {
        self.mempool().into_iter().map(|(_, user_op)| user_op).collect()
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn receipt_polls(&self) -> usize {
        self.receipt_polls.load(Ordering::SeqCst)
    }

    fn accept(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<SubmissionHandle, TransportError> {
        let handle = SubmissionHandle::new(user_op.hash(entry_point, self.chain.chain_id).0);
        let mut mempool = self.mempool.lock().unwrap();
        if mempool.iter().any(|(known, _)| *known == handle) {
            return Err(TransportError::Rejected { code: -32602, message: "already known".into() });
        }
        mempool.push((handle, user_op.clone()));
        Ok(handle)
    }
}

#[async_trait::async_trait]
impl BundlerTransport for MockBundler {
    async fn send_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<SubmissionHandle, TransportError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        let failure = self.failures.lock().unwrap().pop_front();
        match failure {
            Some(Failure::Dropped(err)) => Err(err),
            Some(Failure::Lost(err)) => {
                self.accept(user_op, entry_point)?;
                Err(err)
            }
            None => self.accept(user_op, entry_point),
        }
    }

    async fn user_operation_receipt(
        &self,
        handle: SubmissionHandle,
    ) -> Result<Option<UserOperationReceipt>, TransportError> {
        self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        if let Some(receipt) = self.receipts.lock().unwrap().get(&handle) {
            return Ok(Some(receipt.clone()));
        }
        if self.halted.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let Some(user_op) = self
            .mempool
            .lock()
            .unwrap()
            .iter()
            .find_map(|(known, user_op)| (*known == handle).then(|| user_op.clone()))
        else {
            return Ok(None);
        };

        {
            let mut polls = self.polls.lock().unwrap();
            let polled = polls.entry(handle).or_default();
            if *polled < self.inclusion_delay.load(Ordering::SeqCst) {
                *polled += 1;
                return Ok(None);
            }
        }

        self.chain.include(&user_op);
        let mut receipts = self.receipts.lock().unwrap();
        let success = !self.revert.load(Ordering::SeqCst);
        let receipt = UserOperationReceipt {
            user_op_hash: handle.0,
            success,
            reason: (!success).then(|| "execution reverted".to_string()),
            receipt: InclusionReceipt {
                transaction_hash: keccak256(handle.as_slice()),
                block_hash: keccak256(handle.0),
                block_number: receipts.len() as u64 + 1,
            },
        };
        receipts.insert(handle, receipt.clone());
        Ok(Some(receipt))
    }
}

/// A client wired to in-memory collaborators.
#[derive(Debug)]
pub struct Environment {
    pub chain: Arc<MockChain>,
    pub sponsor: Arc<MockSponsor>,
    pub bundler: Arc<MockBundler>,
    pub signer: DynSigner,
    pub config: ClientConfig,
    pub client: SmartAccountClient,
}

impl Environment {
    /// Sets up an environment on Sepolia with the default test configuration.
    pub async fn setup() -> eyre::Result<Self> {
        Self::setup_with(|config| config).await
    }

    /// Sets up an environment, letting `f` adjust the test configuration.
    pub async fn setup_with(f: impl FnOnce(ClientConfig) -> ClientConfig) -> eyre::Result<Self> {
        let config = f(Self::config()?);
        let chain = MockChain::new(config.chain_id);
        let sponsor = Arc::new(MockSponsor::default());
        let bundler = MockBundler::new(chain.clone());

        let signer = DynSigner::from_signing_key(EOA_PRIVATE_KEY)?;
        let identity = Identity::resolve(Arc::new(signer.clone()), config.signing_timeout).await?;
        let client = SmartAccountClient::new(
            config.clone(),
            identity,
            chain.clone(),
            sponsor.clone(),
            bundler.clone(),
        )?;

        Ok(Self { chain, sponsor, bundler, signer, config, client })
    }

    /// The test configuration: fast polling and retries against a local endpoint.
    pub fn config() -> eyre::Result<ClientConfig> {
        Ok(ClientConfig::new("http://localhost:8545".parse()?)
            .with_chain_id(SEPOLIA_CHAIN_ID)
            .with_policy_id(POLICY_ID)
            .with_poll_intervals(Duration::from_millis(10), Duration::from_millis(50))
            .with_retries(3, Duration::from_millis(10))
            .with_request_timeout(Duration::from_secs(1))
            .with_tracking_timeout(Duration::from_secs(5)))
    }

    /// The address of the account under test.
    pub fn eoa(&self) -> Address {
        self.signer.address()
    }

    /// A second client sharing the collaborators but signing with `signer`.
    pub async fn client_for(&self, signer: PrivateKeySigner) -> eyre::Result<SmartAccountClient> {
        self.client_with(Arc::new(DynSigner(Arc::new(signer)))).await
    }

    /// A second client sharing the collaborators but signing through `provider`.
    pub async fn client_with(
        &self,
        provider: Arc<dyn SigningProvider>,
    ) -> eyre::Result<SmartAccountClient> {
        let identity = Identity::resolve(provider, self.config.signing_timeout).await?;
        Ok(SmartAccountClient::new(
            self.config.clone(),
            identity,
            self.chain.clone(),
            self.sponsor.clone(),
            self.bundler.clone(),
        )?)
    }
}
