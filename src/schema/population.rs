//! Population data model and run result types.

use serde::{Deserialize, Serialize};

/// A single gene, always within [`GENE_MIN`, `GENE_MAX`] at creation.
pub type Gene = u8;

/// Smallest gene value drawn by the factory.
pub const GENE_MIN: Gene = 0;

/// Largest gene value drawn by the factory.
pub const GENE_MAX: Gene = 100;

/// Fixed-length sequence of genes.
///
/// Individuals compare by value: two individuals with the same genes are
/// indistinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Individual(Vec<Gene>);

impl Individual {
    /// Wrap a gene vector.
    pub fn new(genes: Vec<Gene>) -> Self {
        Self(genes)
    }

    /// Gene slice.
    pub fn genes(&self) -> &[Gene] {
        &self.0
    }

    /// Number of genes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the individual carries no genes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all genes.
    pub fn gene_sum(&self) -> i64 {
        self.0.iter().map(|&g| i64::from(g)).sum()
    }

    /// Smallest and largest gene, or `None` for an empty individual.
    pub fn gene_bounds(&self) -> Option<(Gene, Gene)> {
        let min = self.0.iter().copied().min()?;
        let max = self.0.iter().copied().max()?;
        Some((min, max))
    }
}

impl From<Vec<Gene>> for Individual {
    fn from(genes: Vec<Gene>) -> Self {
        Self(genes)
    }
}

/// Transient (individual, fitness) pairing used only during selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitIndexPair {
    /// The scored individual.
    pub individual: Individual,
    /// `|target - sum(genes)|`.
    pub fitness: u64,
    /// Position of the individual in the population it was scored from.
    pub position: usize,
}

/// Per-generation pipeline phase, strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationPhase {
    /// Generation seed assigned, nothing submitted yet.
    Seeded,
    /// Fitness fan-out and collective ranking submitted.
    Selected,
    /// Diversity injection submitted.
    Diversified,
    /// Mutation pass submitted.
    Mutated,
    /// Crossover pass submitted.
    Recombined,
    /// Barrier passed; population holds concrete values.
    Resolved,
}

impl GenerationPhase {
    /// Phase that must follow this one, or `None` after `Resolved`.
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Seeded => Some(Self::Selected),
            Self::Selected => Some(Self::Diversified),
            Self::Diversified => Some(Self::Mutated),
            Self::Mutated => Some(Self::Recombined),
            Self::Recombined => Some(Self::Resolved),
            Self::Resolved => None,
        }
    }
}

/// Progress report sent after each generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationProgress {
    /// Zero-based generation index.
    pub generation: usize,
    /// Total generations requested.
    pub total_generations: usize,
    /// Seed the generation ran with.
    pub seed: u64,
    /// Wall time from submission to barrier, in seconds.
    pub elapsed_seconds: f64,
    /// Best (lowest) fitness in the resolved population.
    pub best_fitness: u64,
    /// Tasks submitted so far across the run.
    pub tasks_submitted: u64,
}

/// Final result of an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Resolved final population.
    pub population: Vec<Individual>,
    /// Mean fitness before the first generation, after each one, and a
    /// closing grade of the final population (`lifecycles + 2` entries).
    pub fitness_history: Option<Vec<f64>>,
    /// Statistics from the run.
    pub stats: RunStats,
}

/// Statistics from an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    /// Generations run.
    pub generations: usize,
    /// Time spent creating the initial population, in seconds.
    pub init_seconds: f64,
    /// Time spent in the generation loop, in seconds.
    pub evolve_seconds: f64,
    /// Per-generation wall time, in seconds.
    pub generation_seconds: Vec<f64>,
    /// Total tasks submitted to the substrate.
    pub tasks_submitted: u64,
    /// Best (lowest) fitness in the final population.
    pub best_fitness: u64,
}
