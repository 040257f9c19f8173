//! Batched histogram sink for generation wall time.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::schema::{ConfigError, MetricsConfig};

use super::{MetricsError, MetricsSink};

/// Name of the exposed histogram.
pub const HISTOGRAM_NAME: &str = "task_execution_time_seconds";

/// Name of the exposed queue depth gauge.
pub const PENDING_GAUGE_NAME: &str = "generation_samples_pending";

/// How long the drainer waits for a sample before polling again.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Pause between attempts to enqueue into a full queue.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Enqueue attempts before a sample is reported as undeliverable.
const SEND_ATTEMPTS: usize = 3;

/// Cumulative histogram with fixed upper bounds.
#[derive(Debug, Clone)]
pub struct Histogram {
    bounds: Vec<f64>,
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl Histogram {
    /// Create a histogram; bounds are sorted, deduplicated and closed with
    /// `+Inf`.
    pub fn new(mut bounds: Vec<f64>) -> Self {
        bounds.retain(|b| !b.is_nan());
        bounds.sort_by(f64::total_cmp);
        bounds.dedup();
        if bounds.last() != Some(&f64::INFINITY) {
            bounds.push(f64::INFINITY);
        }
        let counts = vec![0; bounds.len()];
        Self {
            bounds,
            counts,
            sum: 0.0,
            count: 0,
        }
    }

    /// Add one observation.
    pub fn observe(&mut self, value: f64) {
        if let Some(index) = self.bounds.iter().position(|&bound| value <= bound) {
            self.counts[index] += 1;
        }
        self.sum += value;
        self.count += 1;
    }

    /// `(upper bound, cumulative count)` per bucket.
    pub fn cumulative(&self) -> Vec<(f64, u64)> {
        let mut running = 0;
        self.bounds
            .iter()
            .zip(&self.counts)
            .map(|(&bound, &count)| {
                running += count;
                (bound, running)
            })
            .collect()
    }

    /// Sum of all observations.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count
    }
}

struct Shared {
    histogram: Mutex<Histogram>,
    pending: AtomicUsize,
    discarded: AtomicU64,
    worker: String,
}

impl Shared {
    fn fold(&self, batch: &[f64]) {
        let mut histogram = self
            .histogram
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for &sample in batch {
            if sample.is_finite() && sample >= 0.0 {
                histogram.observe(sample);
            } else {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "{}",
                    MetricsError::Data(format!("{} is not a valid duration", sample))
                );
            }
        }
        drop(histogram);
        self.pending.fetch_sub(batch.len(), Ordering::AcqRel);
    }
}

/// Sink that queues samples and folds them into a histogram in batches.
pub struct HistogramSink {
    sender: Option<SyncSender<f64>>,
    shared: Arc<Shared>,
    drainer: Option<JoinHandle<()>>,
}

impl HistogramSink {
    /// Start a sink with its drainer thread.
    ///
    /// `capacity` and `batch_size` are raised to at least 1; a zero-capacity
    /// channel would only accept a sample while the drainer is blocked in
    /// `recv`.
    pub fn new(
        bounds: Vec<f64>,
        worker: impl Into<String>,
        capacity: usize,
        batch_size: usize,
    ) -> Result<Self, MetricsError> {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        let shared = Arc::new(Shared {
            histogram: Mutex::new(Histogram::new(bounds)),
            pending: AtomicUsize::new(0),
            discarded: AtomicU64::new(0),
            worker: worker.into(),
        });

        let drainer = {
            let shared = Arc::clone(&shared);
            let batch_size = batch_size.max(1);
            thread::Builder::new()
                .name("metrics-drainer".to_string())
                .spawn(move || drain(receiver, shared, batch_size))?
        };

        Ok(Self {
            sender: Some(sender),
            shared,
            drainer: Some(drainer),
        })
    }

    /// Start a sink from configuration.
    pub fn from_config(config: &MetricsConfig) -> Result<Self, SinkSetupError> {
        config.validate()?;
        let bounds = config.bucket_bounds()?;
        let sink = Self::new(
            bounds,
            config.worker.clone(),
            config.queue_capacity,
            config.batch_size,
        )?;
        Ok(sink)
    }

    /// Samples accepted but not yet folded into the histogram.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Malformed samples dropped by the drainer.
    pub fn discarded(&self) -> u64 {
        self.shared.discarded.load(Ordering::Relaxed)
    }

    /// Copy of the current histogram.
    pub fn snapshot(&self) -> Histogram {
        self.shared
            .histogram
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Render the histogram and queue gauge in the Prometheus text format.
    pub fn render(&self) -> String {
        let histogram = self.snapshot();
        let labels = format!("worker=\"{}\"", escape_label(&self.shared.worker));
        let mut out = String::new();

        let _ = writeln!(
            out,
            "# HELP {} Wall time of one evolution generation.",
            HISTOGRAM_NAME
        );
        let _ = writeln!(out, "# TYPE {} histogram", HISTOGRAM_NAME);
        for (bound, count) in histogram.cumulative() {
            let _ = writeln!(
                out,
                "{}_bucket{{{},le=\"{}\"}} {}",
                HISTOGRAM_NAME,
                labels,
                format_bound(bound),
                count
            );
        }
        let _ = writeln!(out, "{}_sum{{{}}} {}", HISTOGRAM_NAME, labels, histogram.sum());
        let _ = writeln!(
            out,
            "{}_count{{{}}} {}",
            HISTOGRAM_NAME,
            labels,
            histogram.count()
        );

        let _ = writeln!(
            out,
            "# HELP {} Timing samples queued but not yet in the histogram.",
            PENDING_GAUGE_NAME
        );
        let _ = writeln!(out, "# TYPE {} gauge", PENDING_GAUGE_NAME);
        let _ = writeln!(out, "{} {}", PENDING_GAUGE_NAME, self.pending());
        out
    }
}

impl MetricsSink for HistogramSink {
    fn record_generation(&self, elapsed_seconds: f64) -> Result<(), MetricsError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| MetricsError::Connectivity("sink is shut down".to_string()))?;

        // Counted before sending so the drainer can never decrement first.
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        let mut sample = elapsed_seconds;
        for attempt in 1..=SEND_ATTEMPTS {
            match sender.try_send(sample) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(returned)) => {
                    sample = returned;
                    log::debug!("timing queue full (attempt {}/{})", attempt, SEND_ATTEMPTS);
                    if attempt < SEND_ATTEMPTS {
                        thread::sleep(RETRY_INTERVAL);
                    }
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.shared.pending.fetch_sub(1, Ordering::AcqRel);
                    return Err(MetricsError::Connectivity("drainer stopped".to_string()));
                }
            }
        }

        self.shared.pending.fetch_sub(1, Ordering::AcqRel);
        Err(MetricsError::Connectivity(format!(
            "queue still full after {} attempts",
            SEND_ATTEMPTS
        )))
    }
}

impl Drop for HistogramSink {
    fn drop(&mut self) {
        // Closing the channel lets the drainer finish the backlog and exit.
        drop(self.sender.take());
        if let Some(drainer) = self.drainer.take()
            && drainer.join().is_err()
        {
            log::error!("metrics drainer panicked");
        }
    }
}

/// Errors starting a sink from configuration.
#[derive(Debug, thiserror::Error)]
pub enum SinkSetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

fn drain(receiver: Receiver<f64>, shared: Arc<Shared>, batch_size: usize) {
    let mut batch = Vec::with_capacity(batch_size);
    loop {
        match receiver.recv_timeout(IDLE_POLL) {
            Ok(first) => {
                batch.push(first);
                while batch.len() < batch_size {
                    match receiver.try_recv() {
                        Ok(sample) => batch.push(sample),
                        Err(_) => break,
                    }
                }
                shared.fold(&batch);
                batch.clear();
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    log::debug!("metrics drainer stopped");
}

fn format_bound(bound: f64) -> String {
    if bound == f64::INFINITY {
        "+Inf".to_string()
    } else if bound == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        bound.to_string()
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
