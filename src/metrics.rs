//! Client metrics.

use metrics::{Counter, Histogram};
use metrics_derive::Metrics;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{net::SocketAddr, time::Duration};

/// Metrics of the [`SmartAccountClient`](crate::client::SmartAccountClient).
#[derive(Metrics)]
#[metrics(scope = "delegator")]
pub struct ClientMetrics {
    /// Number of submitted bundles.
    pub submissions: Counter,
    /// Number of submissions carrying a delegation.
    pub delegations: Counter,
    /// Number of sponsorship requests denied by the policy.
    pub sponsorship_denied: Counter,
    /// Number of bundle submissions retried after a transport error.
    pub transport_retries: Counter,
    /// Number of bundles included successfully.
    pub included: Counter,
    /// Number of bundles that reverted on chain.
    pub failed: Counter,
    /// Number of inclusion waits that timed out.
    pub tracking_timeouts: Counter,
    /// Time from submission until inclusion was observed, in milliseconds.
    pub inclusion_time: Histogram,
}

/// Installs a Prometheus exporter serving on `addr` as the global metrics recorder.
///
/// The recorder will perform upkeep every 5 seconds.
pub fn setup_exporter(addr: impl Into<SocketAddr>) -> eyre::Result<PrometheusHandle> {
    let addr: SocketAddr = addr.into();
    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .upkeep_timeout(Duration::from_secs(5))
        .build()?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|_| eyre::eyre!("could not set metrics recorder"))?;
    tokio::spawn(exporter);

    tracing::info!(%addr, "Started metrics server");

    Ok(handle)
}
