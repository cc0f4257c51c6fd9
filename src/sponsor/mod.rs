//! Sponsorship policy gateway.
//!
//! Before a bundle is signed, the sponsor is asked to pay for its gas under a policy. A denial is
//! surfaced as [`SponsorshipError::Denied`]; the client never falls back to an unsponsored
//! submission.

use crate::{
    error::{SponsorshipError, TransportError},
    types::{PolicyId, SponsorshipGrant, SubmissionPreview, UserOperation},
};
use alloy::primitives::{Address, Bytes};
use jsonrpsee::{
    core::{ClientError, RpcResult},
    http_client::{HttpClient, HttpClientBuilder},
    proc_macros::rpc,
};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, time::Duration};
use tracing::{debug, warn};
use url::Url;

/// Error codes with which the sponsor refuses a request under its policy: the gas manager's
/// policy rule violations, and a paymaster rejecting the operation.
const POLICY_REJECTION_CODES: [i32; 2] = [-32600, -32501];

/// Request of `alchemy_requestGasAndPaymasterAndData`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasAndPaymasterRequest {
    /// The sponsorship policy.
    pub policy_id: PolicyId,
    /// The entrypoint the operation is submitted to.
    pub entry_point: Address,
    /// A signature of the right shape, used for gas estimation.
    pub dummy_signature: Bytes,
    /// The operation to sponsor.
    pub user_operation: UserOperation,
}

/// Sponsor RPC methods.
#[rpc(server, client, namespace = "alchemy")]
pub trait SponsorApi {
    /// Estimates gas for a user operation and returns paymaster data sponsoring it.
    #[method(name = "requestGasAndPaymasterAndData")]
    async fn request_gas_and_paymaster_and_data(
        &self,
        request: GasAndPaymasterRequest,
    ) -> RpcResult<SponsorshipGrant>;
}

/// A service deciding whether submissions are gas-sponsored.
#[async_trait::async_trait]
pub trait SponsorshipGateway: Debug + Send + Sync {
    /// Requests sponsorship of `preview` under `policy_id`.
    async fn authorize(
        &self,
        policy_id: &PolicyId,
        preview: &SubmissionPreview,
    ) -> Result<SponsorshipGrant, SponsorshipError>;
}

/// A [`SponsorshipGateway`] over the sponsor's JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcSponsor {
    client: HttpClient,
}

impl RpcSponsor {
    /// Creates a new [`RpcSponsor`] for `endpoint`. Requests time out after `request_timeout`.
    pub fn new(endpoint: &Url, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = HttpClientBuilder::default()
            .request_timeout(request_timeout)
            .build(endpoint.as_str())?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl SponsorshipGateway for RpcSponsor {
    async fn authorize(
        &self,
        policy_id: &PolicyId,
        preview: &SubmissionPreview,
    ) -> Result<SponsorshipGrant, SponsorshipError> {
        let request = GasAndPaymasterRequest {
            policy_id: policy_id.clone(),
            entry_point: preview.entry_point,
            dummy_signature: preview.user_operation.signature.clone(),
            user_operation: preview.user_operation.clone(),
        };

        let grant = match self.client.request_gas_and_paymaster_and_data(request).await {
            Ok(grant) => grant,
            Err(ClientError::Call(err)) if POLICY_REJECTION_CODES.contains(&err.code()) => {
                warn!(%policy_id, code = err.code(), reason = err.message(), "sponsorship denied");
                return Err(SponsorshipError::Denied {
                    policy_id: policy_id.to_string(),
                    reason: err.message().to_string(),
                });
            }
            Err(err) => return Err(TransportError::from(err).into()),
        };

        grant.validate()?;
        debug!(%policy_id, paymaster = %grant.paymaster, "sponsorship granted");
        Ok(grant)
    }
}
