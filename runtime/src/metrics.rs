//! Prometheus metrics for admission and finalization.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `boxoffice_reservations_total{outcome}` - admission attempts by outcome
//!   (`accepted`, `sold_out`, `lock_unavailable`, `error`)
//! - `boxoffice_finalizations_total{outcome}` - worker results
//!   (`finalized`, `already_finalized`, `missing`, `failed`)
//! - `boxoffice_dispatch_total{outcome}` - enqueue attempts (`enqueued`, `failed`)
//! - `boxoffice_sweeper_requeued_total` - stale PENDING reservations re-enqueued
//! - `boxoffice_lock_release_failures_total` - releases that errored
//! - `boxoffice_resources_created_total` - resources created
//!
//! ## Histograms
//! - `boxoffice_lock_wait_seconds` - time spent in `acquire`
//! - `boxoffice_issuance_duration_seconds` - time spent issuing one ticket
//!
//! # Example
//!
//! ```rust,no_run
//! use boxoffice_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let _body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its scrape endpoint is served on.
///
/// Serving is left to the binary; this type installs the recorder and renders
/// the exposition text.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    /// A recorder that is already installed is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "boxoffice_reservations_total",
        "Admission attempts by outcome (accepted, sold_out, lock_unavailable, error)"
    );
    describe_counter!(
        "boxoffice_finalizations_total",
        "Finalization results by outcome (finalized, already_finalized, missing, failed)"
    );
    describe_counter!(
        "boxoffice_dispatch_total",
        "Finalization job enqueue attempts by outcome (enqueued, failed)"
    );
    describe_counter!(
        "boxoffice_sweeper_requeued_total",
        "Stale PENDING reservations re-enqueued by the sweeper"
    );
    describe_counter!(
        "boxoffice_resources_created_total",
        "Resources created"
    );
    describe_counter!(
        "boxoffice_lock_release_failures_total",
        "Admission lock releases that returned an error"
    );
    describe_histogram!(
        "boxoffice_lock_wait_seconds",
        "Time spent waiting to acquire the admission lock"
    );
    describe_histogram!(
        "boxoffice_issuance_duration_seconds",
        "Time spent issuing one ticket"
    );
}

/// Admission metrics recorder.
pub struct AdmissionMetrics;

impl AdmissionMetrics {
    /// Record the outcome of one `reserve` call.
    pub fn record_outcome(outcome: &'static str) {
        metrics::counter!("boxoffice_reservations_total", "outcome" => outcome).increment(1);
    }

    /// Record time spent in `acquire`.
    pub fn record_lock_wait(duration: Duration) {
        metrics::histogram!("boxoffice_lock_wait_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed lease release.
    pub fn record_release_failure() {
        metrics::counter!("boxoffice_lock_release_failures_total").increment(1);
    }
}

/// Finalization pipeline metrics recorder.
pub struct FinalizationMetrics;

impl FinalizationMetrics {
    /// Record one worker result.
    pub fn record_outcome(outcome: &'static str) {
        metrics::counter!("boxoffice_finalizations_total", "outcome" => outcome).increment(1);
    }

    /// Record one issuance.
    pub fn record_issuance(duration: Duration) {
        metrics::histogram!("boxoffice_issuance_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record one enqueue attempt.
    pub fn record_dispatch(outcome: &'static str) {
        metrics::counter!("boxoffice_dispatch_total", "outcome" => outcome).increment(1);
    }

    /// Record reservations re-enqueued by one sweep.
    pub fn record_requeued(count: usize) {
        metrics::counter!("boxoffice_sweeper_requeued_total").increment(count as u64);
    }
}
