//! Prometheus metrics for the registry.
//!
//! Metric names live in [`names`] so that the store, the registry reducer and
//! dashboards agree on them. [`MetricsServer`] installs the process-wide
//! Prometheus recorder and renders the text exposition on demand.
//!
//! # Example
//!
//! ```rust,no_run
//! use tokenmaster_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Metric names shared across the workspace
pub mod names {
    /// Actions submitted to the store (counter)
    pub const STORE_ACTIONS: &str = "store_actions_total";
    /// Actions refused, labelled `reason` = `reducer` | `shutdown` (counter)
    pub const STORE_ACTIONS_REJECTED: &str = "store_actions_rejected_total";
    /// Reducer latency with the write lock held (histogram)
    pub const STORE_REDUCER_DURATION: &str = "store_reducer_duration_seconds";
    /// Occasions listed (counter)
    pub const OCCASIONS_LISTED: &str = "registry_occasions_listed_total";
    /// Seats sold (counter)
    pub const TICKETS_SOLD: &str = "registry_tickets_sold_total";
    /// Registry rejections, labelled `kind` = `RegistryError::kind` (counter)
    pub const REGISTRY_REJECTIONS: &str = "registry_actions_rejected_total";
    /// Withdrawals, including zero-amount ones (counter)
    pub const WITHDRAWALS: &str = "registry_withdrawals_total";
    /// Funds held by the registry (gauge)
    pub const LEDGER_BALANCE: &str = "registry_ledger_balance";
}

/// Reducer calls are in-memory map updates; buckets span 1µs to 10ms.
const REDUCER_BUCKETS: &[f64] = &[
    0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.01,
];

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The exporter configuration was rejected
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// The recorder could not be installed
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// The address is what scrapers are pointed at; rendering is pull-based
/// through [`MetricsServer::render`].
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a metrics server for `addr` (not started)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address this server was configured with
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe every registry metric and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// Only one recorder can exist per process. If another one is already
    /// installed (common in tests) this logs a warning and succeeds without
    /// a handle, so [`MetricsServer::render`] returns `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        describe_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(names::STORE_REDUCER_DURATION.to_string()),
                REDUCER_BUCKETS,
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(BuildError::FailedToSetGlobalRecorder(_)) => {
                tracing::warn!("A metrics recorder is already installed, keeping it");
                Ok(())
            },
            Err(e) => Err(MetricsError::Install(e.to_string())),
        }
    }

    /// Prometheus handle, if this server installed the recorder
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn describe_metrics() {
    describe_counter!(names::STORE_ACTIONS, "Actions sent to the registry store");
    describe_counter!(
        names::STORE_ACTIONS_REJECTED,
        "Actions rejected by the reducer or by shutdown"
    );
    describe_histogram!(
        names::STORE_REDUCER_DURATION,
        metrics::Unit::Seconds,
        "Time spent inside the reducer, write lock held"
    );
    describe_counter!(names::OCCASIONS_LISTED, "Occasions listed by the issuer");
    describe_counter!(names::TICKETS_SOLD, "Seats sold");
    describe_counter!(
        names::REGISTRY_REJECTIONS,
        "Registry actions rejected, by rejection kind"
    );
    describe_counter!(names::WITHDRAWALS, "Withdrawals of the ledger balance");
    describe_gauge!(
        names::LEDGER_BALANCE,
        "Funds currently held by the registry (smallest unit, lossy above 2^53)"
    );
}
