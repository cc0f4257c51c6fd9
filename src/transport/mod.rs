//! Bundler transport.

use crate::{
    error::TransportError,
    types::{SubmissionHandle, UserOperation, UserOperationReceipt},
};
use alloy::{
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder, WsConnect},
    pubsub::PubSubConnect,
    rpc::client::{BuiltInConnectionString, ClientBuilder},
    transports::{BoxTransport, Transport, TransportConnect, TransportResult, layers::RetryBackoffLayer},
};
use std::{fmt::Debug, future::IntoFuture, str::FromStr, time::Duration};
use tracing::{debug, trace};
use url::Url;

const ETH_SEND_USER_OPERATION: &str = "eth_sendUserOperation";
const ETH_GET_USER_OPERATION_RECEIPT: &str = "eth_getUserOperationReceipt";

/// [`RetryBackoffLayer`] used for chain providers.
///
/// We are allowing max 10 retries with a backoff of 800ms. The CU/s is set to max value to avoid
/// any throttling.
pub const RETRY_LAYER: RetryBackoffLayer = RetryBackoffLayer::new(10, 800, u64::MAX);

/// Creates a [`BoxTransport`] from a [`Url`].
///
/// Returns the transport and a boolean indicating if the transport is local.
pub async fn create_transport(url: &Url) -> TransportResult<(BoxTransport, bool)> {
    let url = BuiltInConnectionString::from_str(url.as_str())?;
    let is_local = url.is_local();

    let transport = match url {
        BuiltInConnectionString::Ws(url, auth) => WsConnect::new(url.as_str())
            .with_auth_opt(auth)
            // Configure max number of retries to prevent provider from becoming useless
            .with_max_retries(u32::MAX)
            .into_service()
            .await?
            .boxed(),
        _ => url.connect_boxed().await?,
    };

    Ok((transport, is_local))
}

/// Connects a [`DynProvider`] to `url`, retrying rate limited requests.
pub async fn connect(url: &Url) -> TransportResult<DynProvider> {
    let (transport, is_local) = create_transport(url).await?;
    let client = ClientBuilder::default().layer(RETRY_LAYER).transport(transport, is_local);
    Ok(ProviderBuilder::new().connect_client(client).erased())
}

/// Bounds `request` by `timeout`.
pub(crate) async fn with_timeout<T, E>(
    timeout: Duration,
    request: impl IntoFuture<Output = Result<T, E>>,
) -> Result<T, TransportError>
where
    E: Into<TransportError>,
{
    tokio::time::timeout(timeout, request)
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
        .map_err(Into::into)
}

/// A bundler accepting user operations.
#[async_trait::async_trait]
pub trait BundlerTransport: Debug + Send + Sync {
    /// Submits a signed user operation to `entry_point`.
    ///
    /// Returns the user operation hash, which identifies the submission from now on.
    async fn send_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<SubmissionHandle, TransportError>;

    /// Returns the receipt of a submission, or `None` if it is not included yet.
    async fn user_operation_receipt(
        &self,
        handle: SubmissionHandle,
    ) -> Result<Option<UserOperationReceipt>, TransportError>;
}

/// A [`BundlerTransport`] over a JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcBundler {
    provider: DynProvider,
    request_timeout: Duration,
}

impl RpcBundler {
    /// Creates a new [`RpcBundler`].
    pub const fn new(provider: DynProvider, request_timeout: Duration) -> Self {
        Self { provider, request_timeout }
    }
}

#[async_trait::async_trait]
impl BundlerTransport for RpcBundler {
    async fn send_user_operation(
        &self,
        user_op: &UserOperation,
        entry_point: Address,
    ) -> Result<SubmissionHandle, TransportError> {
        let handle: SubmissionHandle = with_timeout(
            self.request_timeout,
            self.provider.raw_request(ETH_SEND_USER_OPERATION.into(), (user_op, entry_point)),
        )
        .await?;

        debug!(%handle, sender = %user_op.sender, "sent user operation");
        Ok(handle)
    }

    async fn user_operation_receipt(
        &self,
        handle: SubmissionHandle,
    ) -> Result<Option<UserOperationReceipt>, TransportError> {
        let receipt: Option<UserOperationReceipt> = with_timeout(
            self.request_timeout,
            self.provider.raw_request(ETH_GET_USER_OPERATION_RECEIPT.into(), (handle,)),
        )
        .await?;

        trace!(%handle, found = receipt.is_some(), "polled user operation receipt");
        Ok(receipt)
    }
}
