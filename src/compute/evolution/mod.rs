//! Generational genetic algorithm over the task substrate.
//!
//! # Overview
//!
//! The evolution pipeline consists of:
//!
//! - **Genome Operations** (`genome`): Random creation, mutation and crossover
//! - **Fitness** (`fitness`): Per-individual error and population grading
//! - **Selection** (`selection`): Collective ranking, truncation, diversity
//! - **Search** (`search`): Generation graph, barrier and run driver
//!
//! # Example
//!
//! ```rust,no_run
//! use gene_flow::compute::evolution::{GeneRng, evolve, generate_population};
//! use gene_flow::compute::substrate::TaskSubstrate;
//! use gene_flow::schema::EvolutionParams;
//!
//! let substrate = TaskSubstrate::new(None).unwrap();
//! let population = generate_population(&substrate, 20, 10, 1234);
//!
//! let generation = evolve(
//!     &substrate,
//!     &population,
//!     200,
//!     0,
//!     1234,
//!     GeneRng::new(1254),
//!     &EvolutionParams::default(),
//! )
//! .resolve(&substrate)
//! .unwrap();
//!
//! println!("{} mutations, {} crossovers", generation.mutations, generation.crossovers);
//! ```
//!
//! # Reproducibility
//!
//! No task touches shared random state. Factory and mutation tasks build
//! their own generator from a seed assigned by the submitter, and the
//! decision stream (diversity, mutation, pairing) travels through the
//! generation as a [`GeneRng`] value. Runs with the same configuration give
//! the same population regardless of worker count.

mod fitness;
mod genome;
mod search;
mod selection;

pub use fitness::{fitness, grade, submit_fitness, submit_grade};
pub use genome::{GeneRng, create_individual, crossover, mutate};
pub use search::{
    BreedingPool, EngineError, EvolutionEngine, GenerationState, MutatedPool, Offspring,
    PendingGeneration, ResolvedGeneration, evolve, generate_population, run,
};
pub use selection::{
    Ranking, get_parents, inject_diversity, retain_count, submit_ranking, top_up,
};
