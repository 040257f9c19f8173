//! Configuration types for evolution runs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of individuals in the population.
    #[serde(default = "default_num_individuals")]
    pub num_individuals: usize,
    /// Number of genes per individual.
    #[serde(default = "default_size")]
    pub size: usize,
    /// Target value the gene sum should reach.
    #[serde(default = "default_target")]
    pub target: i64,
    /// Number of generations (life cycles).
    #[serde(default = "default_lifecycles")]
    pub lifecycles: usize,
    /// Base seed. Factory tasks use `seed + i`, generation `g` uses `seed + g`.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Grade the population before the first and after every generation.
    #[serde(default = "default_collect_fitness_history")]
    pub collect_fitness_history: bool,
    /// Selection and variation rates.
    #[serde(default)]
    pub evolution: EvolutionParams,
    /// Worker pool settings.
    #[serde(default)]
    pub substrate: SubstrateConfig,
    /// Generation timing exposition.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_individuals: default_num_individuals(),
            size: default_size(),
            target: default_target(),
            lifecycles: default_lifecycles(),
            seed: default_seed(),
            collect_fitness_history: default_collect_fitness_history(),
            evolution: EvolutionParams::default(),
            substrate: SubstrateConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_num_individuals() -> usize {
    100
}
fn default_size() -> usize {
    100
}
fn default_target() -> i64 {
    200
}
fn default_lifecycles() -> usize {
    10
}
fn default_seed() -> u64 {
    1234
}
fn default_collect_fitness_history() -> bool {
    true
}

/// Rates driving selection, diversity injection and mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionParams {
    /// Fraction of the ranked population kept as parents (0.0-1.0).
    #[serde(default = "default_retain")]
    pub retain: f64,
    /// Probability of re-admitting a non-selected individual (0.0-1.0).
    #[serde(default = "default_random_select")]
    pub random_select: f64,
    /// Per-parent probability of a single-gene mutation (0.0-1.0).
    #[serde(default = "default_mutate_rate")]
    pub mutate_rate: f64,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            retain: default_retain(),
            random_select: default_random_select(),
            mutate_rate: default_mutate_rate(),
        }
    }
}

fn default_retain() -> f64 {
    0.2
}
fn default_random_select() -> f64 {
    0.05
}
fn default_mutate_rate() -> f64 {
    0.01
}

/// Worker pool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubstrateConfig {
    /// Number of worker threads. `None` lets rayon pick (one per core).
    #[serde(default)]
    pub threads: Option<usize>,
}

/// Generation timing exposition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Start the histogram sink and HTTP exporter.
    #[serde(default)]
    pub enabled: bool,
    /// Address the exporter binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port the exporter listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// HTTP path serving the text exposition.
    #[serde(default = "default_path")]
    pub path: String,
    /// Comma-separated histogram bucket bounds, e.g. `"0.001,0.01,1,inf"`.
    #[serde(default)]
    pub buckets: Option<String>,
    /// Capacity of the pending sample queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum samples folded into the histogram per drain.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Value of the `worker` label.
    #[serde(default = "default_worker")]
    pub worker: String,
    /// Keep serving metrics after the run finishes.
    #[serde(default)]
    pub serve_after_run: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_bind(),
            port: default_port(),
            path: default_path(),
            buckets: None,
            queue_capacity: default_queue_capacity(),
            batch_size: default_batch_size(),
            worker: default_worker(),
            serve_after_run: false,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    15000
}
fn default_path() -> String {
    "/metrics".to_string()
}
fn default_queue_capacity() -> usize {
    1024
}
fn default_batch_size() -> usize {
    10
}
fn default_worker() -> String {
    "local".to_string()
}

/// Default histogram buckets for generation wall time, in seconds.
pub const DEFAULT_BUCKETS: &[f64] = &[
    0.0001,
    0.0005,
    0.001,
    0.0025,
    0.005,
    0.01,
    0.1,
    1.0,
    10.0,
    50.0,
    100.0,
    200.0,
    f64::INFINITY,
];

impl MetricsConfig {
    /// Resolve the configured buckets, falling back to [`DEFAULT_BUCKETS`].
    pub fn bucket_bounds(&self) -> Result<Vec<f64>, ConfigError> {
        match &self.buckets {
            Some(spec) => parse_buckets(spec),
            None => Ok(DEFAULT_BUCKETS.to_vec()),
        }
    }

    /// Validate the sink and exporter settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 || self.batch_size == 0 {
            return Err(ConfigError::InvalidQueue);
        }
        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.path.clone()));
        }
        self.bucket_bounds()?;
        Ok(())
    }
}

/// Parse a comma-separated list of bucket bounds.
///
/// `inf` and `-inf` (any case) are accepted for the infinities.
pub fn parse_buckets(spec: &str) -> Result<Vec<f64>, ConfigError> {
    spec.split(',')
        .map(str::trim)
        .map(|bucket| match bucket.to_ascii_lowercase().as_str() {
            "inf" | "+inf" => Ok(f64::INFINITY),
            "-inf" => Ok(f64::NEG_INFINITY),
            _ => bucket
                .parse::<f64>()
                .ok()
                .filter(|v| !v.is_nan())
                .ok_or_else(|| ConfigError::InvalidBucket(bucket.to_string())),
        })
        .collect()
}

impl RunConfig {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_individuals == 0 {
            return Err(ConfigError::InvalidPopulation);
        }
        if self.size == 0 {
            return Err(ConfigError::InvalidSize);
        }

        let check_rate = |value: f64, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidRate { name, value })
            }
        };
        check_rate(self.evolution.retain, "retain")?;
        check_rate(self.evolution.random_select, "random_select")?;
        check_rate(self.evolution.mutate_rate, "mutate_rate")?;

        if self.substrate.threads == Some(0) {
            return Err(ConfigError::InvalidThreads);
        }

        if self.metrics.enabled {
            self.metrics.validate()?;
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be positive")]
    InvalidPopulation,
    #[error("Individual size must be positive")]
    InvalidSize,
    #[error("Rate `{name}` must lie in [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("Worker thread count must be positive")]
    InvalidThreads,
    #[error("Metrics queue capacity and batch size must be positive")]
    InvalidQueue,
    #[error("Invalid histogram bucket `{0}`: expected a number, `inf` or `-inf`")]
    InvalidBucket(String),
    #[error("Metrics path `{0}` must start with `/`")]
    InvalidPath(String),
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
