//! Metrics module - Per-generation timing sink and exposition.
//!
//! The engine emits exactly one "elapsed seconds" sample per generation
//! through [`MetricsSink`]. Sink failures are reported back as
//! [`MetricsError`] and only ever logged by the engine; they never affect
//! the evolution itself.
//!
//! [`HistogramSink`] queues samples on a bounded channel, folds them into a
//! histogram in batches on a background thread, and renders the result in
//! the Prometheus text format. [`exporter`] serves that text over HTTP.

pub mod exporter;
mod histogram;

pub use histogram::{HISTOGRAM_NAME, Histogram, HistogramSink, PENDING_GAUGE_NAME, SinkSetupError};

/// Receiver of per-generation wall time samples.
pub trait MetricsSink: Send + Sync {
    /// Record the wall time of one generation, in seconds.
    fn record_generation(&self, elapsed_seconds: f64) -> Result<(), MetricsError>;
}

/// Metrics pipeline errors. None of these abort an evolution run.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Metrics sink unreachable: {0}")]
    Connectivity(String),
    #[error("Malformed timing sample: {0}")]
    Data(String),
    #[error("Failed to bind metrics exporter on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Metrics exporter failed: {0}")]
    Io(#[from] std::io::Error),
}
