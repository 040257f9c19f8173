//! Genome operations: random creation, mutation and crossover.
//!
//! Every operation that needs randomness takes its random state explicitly,
//! either as a seed or as a [`GeneRng`] value, so results never depend on
//! which worker runs a task or in which order.

use rand::prelude::*;

use crate::schema::{GENE_MAX, GENE_MIN, Gene, Individual};

/// Random number generator threaded through the evolution pipeline.
#[derive(Debug, Clone)]
pub struct GeneRng {
    rng: StdRng,
}

impl GeneRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.rng.r#gen()
    }

    /// Uniform index in `0..len`. `len` must be positive.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Uniform gene in `[low, high]`.
    pub fn gene(&mut self, low: Gene, high: Gene) -> Gene {
        self.rng.gen_range(low..=high)
    }

    /// Two distinct indices in `0..len`, resampling on self-pairing.
    ///
    /// Both indices are drawn independently on every attempt. `len` must be
    /// at least 2.
    pub fn distinct_pair(&mut self, len: usize) -> (usize, usize) {
        loop {
            let male = self.index(len);
            let female = self.index(len);
            if male != female {
                return (male, female);
            }
        }
    }
}

/// Create one individual of `size` genes drawn uniformly from `[0, 100]`.
pub fn create_individual(size: usize, seed: u64) -> Individual {
    let mut rng = GeneRng::new(seed);
    Individual::new((0..size).map(|_| rng.gene(GENE_MIN, GENE_MAX)).collect())
}

/// Replace one random gene with a value between the individual's own
/// smallest and largest gene.
///
/// Works on a private copy; the input is left untouched. An individual whose
/// genes are all equal comes back unchanged.
pub fn mutate(individual: &Individual, seed: u64) -> Individual {
    let Some((low, high)) = individual.gene_bounds() else {
        return individual.clone();
    };

    let mut rng = GeneRng::new(seed);
    let mut genes = individual.genes().to_vec();
    let index = rng.index(genes.len());
    genes[index] = rng.gene(low, high);
    Individual::new(genes)
}

/// Splice the first half of `male` with the second half of `female`.
///
/// The splice point is `floor(len / 2)`. Both parents must have the same
/// length.
pub fn crossover(male: &Individual, female: &Individual) -> Individual {
    debug_assert_eq!(male.len(), female.len(), "parents differ in length");
    let half = male.len() / 2;
    let genes = male.genes()[..half]
        .iter()
        .chain(&female.genes()[half..])
        .copied()
        .collect();
    Individual::new(genes)
}
