//! Smart account client.
//!
//! Submits intents of a delegated EOA as one sponsored ERC-4337 user operation. While the account
//! is not delegated yet, the operation carries the EIP-7702 authorization that delegates it.

use crate::{
    authorization::AuthorizationBuilder,
    chain::{ChainStateReader, RpcChainState},
    config::ClientConfig,
    constants::DUMMY_SIGNATURE,
    error::{AuthError, ClientError, SponsorshipError, TrackingError, TransportError},
    metrics::ClientMetrics,
    nonce::NonceReservations,
    signers::Identity,
    sponsor::{RpcSponsor, SponsorshipGateway},
    tracker::TransactionTracker,
    transport::{self, BundlerTransport, RpcBundler, with_timeout},
    types::{
        PolicyId, SponsorshipGrant, Submission, SubmissionHandle, SubmissionPreview,
        SubmissionState, TransactionReceipt, UserOperation, UserOperationIntent, encode_calls,
        validate_intents,
    },
};
use alloy::{
    eips::eip7702::SignedAuthorization,
    primitives::{Address, B256, U256},
};
use dashmap::{DashMap, mapref::entry::Entry};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

/// A client submitting sponsored user operations for one [`Identity`].
///
/// The client is cheap to clone and can drive several submissions concurrently.
#[derive(Debug, Clone)]
pub struct SmartAccountClient {
    config: Arc<ClientConfig>,
    policy_id: PolicyId,
    authorizations: AuthorizationBuilder,
    chain_state: Arc<dyn ChainStateReader>,
    sponsor: Arc<dyn SponsorshipGateway>,
    transport: Arc<dyn BundlerTransport>,
    tracker: TransactionTracker,
    /// Entrypoint nonces handed to in-flight operations.
    op_nonces: NonceReservations,
    /// The last authorization nonce submitted per authority.
    submitted_authorizations: Arc<DashMap<Address, u64>>,
    metrics: Arc<ClientMetrics>,
}

impl SmartAccountClient {
    /// Creates a new [`SmartAccountClient`] from its collaborators.
    ///
    /// The configuration is validated eagerly.
    pub fn new(
        config: ClientConfig,
        identity: Identity,
        chain_state: Arc<dyn ChainStateReader>,
        sponsor: Arc<dyn SponsorshipGateway>,
        transport: Arc<dyn BundlerTransport>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let policy_id = config.policy_id()?;

        let metrics = Arc::new(ClientMetrics::default());
        let tracker =
            TransactionTracker::new(transport.clone(), config.tracking.clone(), metrics.clone());

        Ok(Self {
            policy_id,
            authorizations: AuthorizationBuilder::new(identity, chain_state.clone()),
            chain_state,
            sponsor,
            transport,
            tracker,
            op_nonces: NonceReservations::default(),
            submitted_authorizations: Default::default(),
            metrics,
            config: Arc::new(config),
        })
    }

    /// Connects to the endpoints in `config`.
    pub async fn connect(config: ClientConfig, identity: Identity) -> Result<Self, ClientError> {
        config.validate()?;
        let request_timeout = config.transport.request_timeout;

        let provider = transport::connect(&config.rpc_url()?).await.map_err(TransportError::from)?;
        let chain_state = RpcChainState::new(provider.clone(), config.chain_id, request_timeout).await?;
        let bundler = RpcBundler::new(provider, request_timeout);
        let sponsor = RpcSponsor::new(&config.sponsor_url()?, request_timeout)?;

        info!(
            chain = %alloy_chains::Chain::from_id(config.chain_id),
            address = %identity.address(),
            delegate = %config.delegate,
            "connected smart account client"
        );

        Self::new(config, identity, Arc::new(chain_state), Arc::new(sponsor), Arc::new(bundler))
    }

    /// The identity operations are submitted for.
    pub const fn identity(&self) -> &Identity {
        self.authorizations.identity()
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The authorization builder of the identity.
    pub const fn authorizations(&self) -> &AuthorizationBuilder {
        &self.authorizations
    }

    /// The tracker of submitted operations.
    pub const fn tracker(&self) -> &TransactionTracker {
        &self.tracker
    }

    /// Submits `intents` as one sponsored user operation.
    ///
    /// If `authorization` is given, it is attached to the operation and must be signed by the
    /// identity for the configured chain and delegate. An authorization is never submitted twice
    /// by the same client, even if the submission failed: its nonce may already be consumed.
    ///
    /// Sponsorship is requested before the operation is signed. If it is denied, nothing is sent.
    pub async fn submit(
        &self,
        intents: Vec<UserOperationIntent>,
        authorization: Option<SignedAuthorization>,
    ) -> Result<SubmissionHandle, ClientError> {
        let mut submission = Submission::new();
        let result = self.submit_inner(intents, authorization, &mut submission).await;
        if let Err(err) = &result {
            self.fail(&mut submission, err);
        }
        result
    }

    /// Waits for a submission to be included, for at most `timeout`.
    ///
    /// See [`TransactionTracker::wait_for_inclusion`].
    pub async fn wait_for_inclusion(
        &self,
        handle: SubmissionHandle,
        timeout: Duration,
    ) -> Result<TransactionReceipt, ClientError> {
        Ok(self.tracker.wait_for_inclusion(handle, timeout).await?)
    }

    /// Delegates the account if needed, submits `intents` and waits for inclusion.
    ///
    /// The authorization is built and signed only if the account is not delegated to the
    /// configured delegate yet.
    pub async fn delegate_and_send(
        &self,
        intents: Vec<UserOperationIntent>,
    ) -> Result<TransactionReceipt, ClientError> {
        let mut submission = Submission::new();
        let result = self.delegate_and_send_inner(intents, &mut submission).await;
        if let Err(err) = &result {
            self.fail(&mut submission, err);
        }
        result
    }

    async fn delegate_and_send_inner(
        &self,
        intents: Vec<UserOperationIntent>,
        submission: &mut Submission,
    ) -> Result<TransactionReceipt, ClientError> {
        validate_intents(&intents)?;

        let chain_id = self.config.chain_id;
        let delegate = self.config.delegate;
        let authorization = match self.authorizations.build(chain_id, delegate).await? {
            Some(unsigned) => {
                submission.advance(SubmissionState::AuthorizationPending);
                let signed = self.authorizations.sign(unsigned).await?;
                submission.advance(SubmissionState::Signed);
                Some(signed)
            }
            None => None,
        };

        let handle = match self.submit_inner(intents, authorization.clone(), submission).await {
            Ok(handle) => handle,
            Err(err) => {
                if let Some(authorization) = &authorization
                    && !self.was_submitted(authorization)
                {
                    self.authorizations.release(authorization).await;
                }
                return Err(err);
            }
        };

        let receipt =
            self.tracker.wait_for_inclusion(handle, self.config.tracking.timeout).await?;
        if receipt.is_included() {
            submission.advance(SubmissionState::Included);
            if authorization.is_some() {
                self.authorizations.mark_delegated(chain_id, self.identity().address(), delegate);
            }
        } else {
            submission.advance(SubmissionState::Failed);
        }

        Ok(receipt)
    }

    async fn submit_inner(
        &self,
        intents: Vec<UserOperationIntent>,
        authorization: Option<SignedAuthorization>,
        submission: &mut Submission,
    ) -> Result<SubmissionHandle, ClientError> {
        validate_intents(&intents)?;
        let claim = match &authorization {
            Some(authorization) => Some(self.claim_authorization(authorization)?),
            None => None,
        };

        match self.submit_claimed(intents, authorization, submission).await {
            Ok(handle) => Ok(handle),
            Err(failure) => {
                if !failure.sent
                    && let Some(claim) = claim
                {
                    self.release_authorization(claim);
                }
                Err(failure.err)
            }
        }
    }

    /// Submits an operation whose authorization, if any, is already claimed.
    async fn submit_claimed(
        &self,
        intents: Vec<UserOperationIntent>,
        authorization: Option<SignedAuthorization>,
        submission: &mut Submission,
    ) -> Result<SubmissionHandle, SubmitFailure> {
        let chain_id = self.config.chain_id;
        let entry_point = self.config.entry_point;
        let request_timeout = self.config.transport.request_timeout;
        let sender = self.identity().address();

        let nonce = self
            .op_nonces
            .reserve(chain_id, sender, || async {
                let nonce = with_timeout(
                    request_timeout,
                    self.chain_state.user_op_nonce(sender, entry_point),
                )
                .await?;
                Ok::<_, TransportError>(nonce.saturating_to::<u64>())
            })
            .await
            .map_err(SubmitFailure::unsent)?;

        let mut user_op = UserOperation::new(sender, U256::from(nonce), encode_calls(intents))
            .with_authorization(authorization.clone())
            .with_signature(DUMMY_SIGNATURE);

        submission.advance(SubmissionState::SponsorshipRequested);
        let grant = match self.request_sponsorship(&user_op).await {
            Ok(grant) => grant,
            Err(err) => {
                self.op_nonces.release(chain_id, sender, nonce).await;
                return Err(SubmitFailure::unsent(err));
            }
        };
        user_op.apply_grant(&grant);

        let hash = user_op.hash(entry_point, chain_id);
        let signature = match self.identity().sign_message(hash.as_slice()).await {
            Ok(signature) => signature,
            Err(err) => {
                self.op_nonces.release(chain_id, sender, nonce).await;
                return Err(SubmitFailure::unsent(err));
            }
        };
        let user_op = user_op.with_signature(signature.as_bytes());

        let handle = match self.send_with_retry(&user_op, hash).await {
            Ok(handle) => handle,
            Err(SendFailure { err, refused: true }) => {
                debug!(%hash, nonce, "user operation refused by bundler");
                self.op_nonces.release(chain_id, sender, nonce).await;
                return Err(SubmitFailure::unsent(err));
            }
            // The operation may have reached the bundler.
            Err(SendFailure { err, refused: false }) => {
                return Err(SubmitFailure { err: err.into(), sent: true });
            }
        };
        submission.submitted(handle);

        self.metrics.submissions.increment(1);
        if authorization.is_some() {
            self.metrics.delegations.increment(1);
        }
        info!(%handle, %sender, nonce, delegating = authorization.is_some(), "submitted user operation");

        Ok(handle)
    }

    /// Checks that `authorization` may be attached to an operation of the identity and claims
    /// its nonce.
    ///
    /// Claims are atomic: of concurrent submissions carrying the same authorization, only one
    /// succeeds.
    fn claim_authorization(
        &self,
        authorization: &SignedAuthorization,
    ) -> Result<AuthorizationClaim, AuthError> {
        let authority = self.identity().address();
        let recovered = authorization
            .recover_authority()
            .map_err(|err| AuthError::Recovery(err.to_string()))?;
        if recovered != authority {
            return Err(AuthError::AuthorityMismatch { expected: authority, got: recovered });
        }

        if *authorization.chain_id() != U256::from(self.config.chain_id) {
            return Err(AuthError::ChainMismatch {
                expected: self.config.chain_id,
                got: *authorization.chain_id(),
            });
        }

        if *authorization.address() != self.config.delegate {
            return Err(AuthError::UnexpectedDelegate {
                expected: self.config.delegate,
                got: *authorization.address(),
            });
        }

        let nonce = authorization.nonce();
        let previous = match self.submitted_authorizations.entry(authority) {
            Entry::Occupied(mut entry) => {
                let last = *entry.get();
                if last >= nonce {
                    return Err(AuthError::AlreadySubmitted { authority, nonce });
                }
                entry.insert(nonce);
                Some(last)
            }
            Entry::Vacant(entry) => {
                entry.insert(nonce);
                None
            }
        };

        Ok(AuthorizationClaim { authority, nonce, previous })
    }

    /// Undoes `claim` if no later authorization was claimed since.
    fn release_authorization(&self, claim: AuthorizationClaim) {
        if let Entry::Occupied(mut entry) = self.submitted_authorizations.entry(claim.authority)
            && *entry.get() == claim.nonce
        {
            match claim.previous {
                Some(previous) => {
                    entry.insert(previous);
                }
                None => {
                    entry.remove();
                }
            }
            debug!(authority = %claim.authority, nonce = claim.nonce, "released authorization");
        }
    }

    fn was_submitted(&self, authorization: &SignedAuthorization) -> bool {
        self.submitted_authorizations
            .get(&self.identity().address())
            .is_some_and(|last| *last >= authorization.nonce())
    }

    /// Requests sponsorship, bounded by the request timeout.
    async fn request_sponsorship(
        &self,
        user_op: &UserOperation,
    ) -> Result<SponsorshipGrant, SponsorshipError> {
        let preview = SubmissionPreview {
            chain_id: self.config.chain_id,
            entry_point: self.config.entry_point,
            user_operation: user_op.clone(),
        };

        let timeout = self.config.transport.request_timeout;
        let result = tokio::time::timeout(timeout, self.sponsor.authorize(&self.policy_id, &preview))
            .await
            .map_err(|_| SponsorshipError::from(TransportError::Timeout(timeout)))
            .and_then(|result| result);

        match result {
            Ok(grant) => {
                grant.validate()?;
                Ok(grant)
            }
            Err(err) => {
                if matches!(err, SponsorshipError::Denied { .. }) {
                    self.metrics.sponsorship_denied.increment(1);
                }
                Err(err)
            }
        }
    }

    /// Sends the signed operation, retrying the identical operation on retryable transport
    /// errors with exponential backoff.
    async fn send_with_retry(
        &self,
        user_op: &UserOperation,
        hash: B256,
    ) -> Result<SubmissionHandle, SendFailure> {
        let transport_config = &self.config.transport;
        let mut backoff = transport_config.retry_backoff;
        let mut attempt = 1;

        loop {
            let result = with_timeout(
                transport_config.request_timeout,
                self.transport.send_user_operation(user_op, self.config.entry_point),
            )
            .await;

            match result {
                Ok(handle) => return Ok(handle),
                // An earlier attempt reached the bundler even though its response got lost.
                Err(err) if attempt > 1 && err.is_already_known() => {
                    debug!(%hash, attempt, "user operation already known to bundler");
                    return Ok(SubmissionHandle::new(hash.0));
                }
                Err(err) if err.is_retryable() && attempt < transport_config.max_attempts => {
                    self.metrics.transport_retries.increment(1);
                    warn!(%err, attempt, ?backoff, "failed to send user operation, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => {
                    let refused = attempt == 1
                        && matches!(err, TransportError::Rejected { .. })
                        && !err.is_already_known();
                    return Err(SendFailure { err, refused });
                }
            }
        }
    }

    /// Moves a submission that failed with `err` to its terminal state.
    fn fail(&self, submission: &mut Submission, err: &ClientError) {
        error!(state = %submission.state(), handle = ?submission.handle(), %err, "submission failed");
        let next = match err {
            ClientError::Tracking(TrackingError::Timeout { .. }) => SubmissionState::TrackingTimeout,
            _ => SubmissionState::Failed,
        };
        submission.advance(next);
    }
}

/// A claimed authorization nonce, with the claim it replaced.
#[derive(Debug)]
struct AuthorizationClaim {
    authority: Address,
    nonce: u64,
    previous: Option<u64>,
}

/// A failed submission. `sent` is set if the operation may have reached the bundler.
#[derive(Debug)]
struct SubmitFailure {
    err: ClientError,
    sent: bool,
}

impl SubmitFailure {
    fn unsent(err: impl Into<ClientError>) -> Self {
        Self { err: err.into(), sent: false }
    }
}

/// A failed send. `refused` is set if the bundler rejected the only attempt outright, so the
/// operation never entered its mempool.
#[derive(Debug)]
struct SendFailure {
    err: TransportError,
    refused: bool,
}
