//! Transaction tracker.
//!
//! Polls the bundler for the receipt of a submission with exponential backoff. Terminal receipts
//! are cached, so waiting on a finished submission again never polls.

use crate::{
    config::TrackingConfig,
    error::TrackingError,
    metrics::ClientMetrics,
    transport::BundlerTransport,
    types::{SubmissionHandle, TransactionReceipt},
};
use dashmap::DashMap;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Waits for submissions to be included.
#[derive(Debug, Clone)]
pub struct TransactionTracker {
    transport: Arc<dyn BundlerTransport>,
    config: TrackingConfig,
    /// Terminal receipts by handle.
    receipts: Arc<DashMap<SubmissionHandle, TransactionReceipt>>,
    metrics: Arc<ClientMetrics>,
}

impl TransactionTracker {
    /// Creates a new [`TransactionTracker`].
    pub fn new(
        transport: Arc<dyn BundlerTransport>,
        config: TrackingConfig,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self { transport, config, receipts: Default::default(), metrics }
    }

    /// The tracking configuration.
    pub const fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Waits until the submission is included or failed, for at most `timeout`.
    ///
    /// A submission that reverted on chain is returned as a receipt with
    /// [`ReceiptStatus::Failed`](crate::types::ReceiptStatus::Failed), not as an error. If the
    /// timeout elapses, [`TrackingError::Timeout`] is returned; the submission may still be
    /// included later and can be re-checked with [`TransactionTracker::check`].
    ///
    /// Dropping the returned future only stops polling.
    pub async fn wait_for_inclusion(
        &self,
        handle: SubmissionHandle,
        timeout: Duration,
    ) -> Result<TransactionReceipt, TrackingError> {
        if let Some(receipt) = self.cached(handle) {
            return Ok(receipt);
        }

        let started = Instant::now();
        let receipt = match tokio::time::timeout(timeout, self.poll_until_terminal(handle)).await {
            Ok(receipt) => receipt?,
            Err(_) => {
                self.metrics.tracking_timeouts.increment(1);
                warn!(%handle, ?timeout, "submission not included in time");
                return Err(TrackingError::Timeout { handle, waited: timeout });
            }
        };

        self.metrics.inclusion_time.record(started.elapsed().as_millis() as f64);
        Ok(self.finalize(receipt))
    }

    /// Polls the status of a submission once.
    ///
    /// Returns a pending receipt if the submission is not included yet.
    pub async fn check(
        &self,
        handle: SubmissionHandle,
    ) -> Result<TransactionReceipt, TrackingError> {
        if let Some(receipt) = self.cached(handle) {
            return Ok(receipt);
        }

        match self.transport.user_operation_receipt(handle).await? {
            Some(receipt) => Ok(self.finalize(receipt.into_receipt(handle))),
            None => Ok(TransactionReceipt::pending(handle)),
        }
    }

    /// Returns the cached terminal receipt of a submission.
    pub fn cached(&self, handle: SubmissionHandle) -> Option<TransactionReceipt> {
        self.receipts.get(&handle).map(|receipt| receipt.clone())
    }

    async fn poll_until_terminal(
        &self,
        handle: SubmissionHandle,
    ) -> Result<TransactionReceipt, TrackingError> {
        let mut interval = self.config.initial_poll_interval;

        loop {
            match self.transport.user_operation_receipt(handle).await {
                Ok(Some(receipt)) => return Ok(receipt.into_receipt(handle)),
                Ok(None) => {}
                Err(err) if err.is_retryable() => {
                    warn!(%handle, %err, "failed to poll receipt, retrying");
                }
                Err(err) => return Err(err.into()),
            }

            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(self.config.max_poll_interval);
        }
    }

    /// Caches a terminal receipt. The first cached receipt of a handle wins.
    fn finalize(&self, receipt: TransactionReceipt) -> TransactionReceipt {
        let entry = self.receipts.entry(receipt.handle).or_insert_with(|| {
            if receipt.is_included() {
                self.metrics.included.increment(1);
            } else {
                self.metrics.failed.increment(1);
            }
            debug!(
                handle = %receipt.handle,
                tx_hash = ?receipt.transaction_hash,
                status = ?receipt.status,
                "submission finalized"
            );
            receipt
        });
        entry.value().clone()
    }
}
