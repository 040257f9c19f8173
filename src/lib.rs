//! Gene Flow - Generational genetic algorithm over a dataflow task substrate.
//!
//! This crate evolves a fixed-size population of integer-gene individuals
//! toward a target gene sum. Every generation is expressed as a graph of
//! tasks (creation, fitness, ranking, mutation, crossover, grading) that run
//! on a worker pool as soon as the futures they read have resolved.
//!
//! # Architecture
//!
//! The crate is split into three main modules:
//!
//! - `schema`: Run configuration and the population data model
//! - `compute`: The task substrate and the evolution pipeline
//! - `metrics`: Per-generation timing sink and its HTTP exposition
//!
//! # Example
//!
//! ```rust,no_run
//! use gene_flow::{EvolutionEngine, RunConfig};
//!
//! let config = RunConfig {
//!     num_individuals: 50,
//!     size: 20,
//!     target: 500,
//!     lifecycles: 10,
//!     ..Default::default()
//! };
//!
//! let engine = EvolutionEngine::new(config);
//! let result = engine.run().expect("evolution failed");
//!
//! println!("Best fitness: {}", result.stats.best_fitness);
//! println!("History: {:?}", result.fitness_history);
//! ```

pub mod compute;
pub mod metrics;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{EngineError, EvolutionEngine};
pub use compute::substrate::{TaskFailure, TaskFuture, TaskSubstrate};
pub use metrics::{HistogramSink, MetricsSink};
pub use schema::{EvolutionResult, Gene, Individual, RunConfig};
