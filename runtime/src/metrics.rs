//! Prometheus metrics for the conference runtime.
//!
//! Recorders are plain functions over the `metrics` facade, so they are free
//! when no exporter is installed (tests, embedded use). The server binary
//! installs the Prometheus exporter through [`MetricsServer`].
//!
//! # Example
//!
//! ```rust,no_run
//! use conference_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
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

/// Prometheus exporter serving `/metrics` over HTTP.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a server that will listen on `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the global recorder and spawn the HTTP listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or a different
    /// recorder is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        describe_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(error) = exporter.await {
                tracing::error!(error = ?error, "Metrics exporter stopped");
            }
        });

        tracing::info!(addr = %self.addr, "Metrics available at http://{}/metrics", self.addr);
        self.handle = Some(handle);
        Ok(())
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if the server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn describe_metrics() {
    describe_counter!(
        "conference_registrations_total",
        "Registration attempts by outcome"
    );
    describe_counter!(
        "conference_unregistrations_total",
        "Unregistrations that released a seat"
    );
    describe_counter!(
        "conference_wishlist_changes_total",
        "Wishlist additions and removals"
    );
    describe_counter!(
        "conference_ledger_contention_retries_total",
        "Ledger transactions retried after a write conflict"
    );
    describe_counter!(
        "conference_ledger_contention_exhausted_total",
        "Ledger transactions that gave up after repeated write conflicts"
    );
    describe_histogram!(
        "conference_ledger_commit_duration_seconds",
        "Time taken by one ledger operation, retries included"
    );
    describe_counter!(
        "conference_jobs_enqueued_total",
        "Background jobs handed to the queue"
    );
    describe_counter!(
        "conference_jobs_enqueue_failures_total",
        "Background jobs the queue refused"
    );
    describe_counter!(
        "conference_jobs_completed_total",
        "Background jobs that ran to completion"
    );
    describe_counter!(
        "conference_jobs_dropped_total",
        "Background jobs dropped after exhausting retries"
    );
    describe_histogram!(
        "conference_job_duration_seconds",
        "Time taken to run one background job"
    );
}

/// Capacity ledger metrics recorder.
pub struct LedgerMetrics;

impl LedgerMetrics {
    /// Record a registration outcome (`accepted`, `already_registered`, ...).
    pub fn record_registration(outcome: &'static str) {
        counter!("conference_registrations_total", "outcome" => outcome).increment(1);
    }

    /// Record a released seat.
    pub fn record_unregistration() {
        counter!("conference_unregistrations_total").increment(1);
    }

    /// Record a wishlist change (`added` or `removed`).
    pub fn record_wishlist(change: &'static str) {
        counter!("conference_wishlist_changes_total", "change" => change).increment(1);
    }

    /// Record retries caused by write conflicts.
    pub fn record_contention_retries(operation: &'static str, retries: u32) {
        counter!("conference_ledger_contention_retries_total", "operation" => operation)
            .increment(u64::from(retries));
    }

    /// Record a transaction that ran out of attempts.
    pub fn record_contention_exhausted(operation: &'static str) {
        counter!("conference_ledger_contention_exhausted_total", "operation" => operation)
            .increment(1);
    }

    /// Record the duration of one ledger operation.
    pub fn record_duration(operation: &'static str, duration: Duration) {
        histogram!("conference_ledger_commit_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }
}

/// Background job metrics recorder.
pub struct JobMetrics;

impl JobMetrics {
    /// Record a job handed to the queue.
    pub fn record_enqueued(job: &'static str) {
        counter!("conference_jobs_enqueued_total", "job" => job).increment(1);
    }

    /// Record a job the queue refused.
    pub fn record_enqueue_failure(job: &'static str) {
        counter!("conference_jobs_enqueue_failures_total", "job" => job).increment(1);
    }

    /// Record a completed job.
    pub fn record_completed(job: &'static str, duration: Duration) {
        counter!("conference_jobs_completed_total", "job" => job).increment(1);
        histogram!("conference_job_duration_seconds", "job" => job).record(duration.as_secs_f64());
    }

    /// Record a job dropped after exhausting retries.
    pub fn record_dropped(job: &'static str) {
        counter!("conference_jobs_dropped_total", "job" => job).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_is_idle_until_started() {
        let server = MetricsServer::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        assert!(server.render().is_none());
    }

    #[test]
    fn recorders_are_noops_without_exporter() {
        LedgerMetrics::record_registration("accepted");
        LedgerMetrics::record_contention_retries("register", 2);
        JobMetrics::record_completed("refresh_announcement", Duration::from_millis(3));
        JobMetrics::record_dropped("check_featured_speakers");
    }
}
