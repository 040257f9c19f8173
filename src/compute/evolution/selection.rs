//! Truncation selection and diversity injection.

use crate::compute::substrate::{TaskFuture, TaskSubstrate, dependencies};
use crate::schema::{FitIndexPair, Individual};

use super::fitness::{fitness, submit_fitness};
use super::genome::GeneRng;

/// Population sorted by ascending fitness, ties in population order.
#[derive(Debug, Clone)]
pub struct Ranking {
    pairs: Vec<FitIndexPair>,
}

impl Ranking {
    /// Rank pairs collected in population order.
    ///
    /// The whole collection is sorted at once; the sort is stable, so equal
    /// fitness keeps the original relative order.
    pub fn from_pairs(mut pairs: Vec<FitIndexPair>) -> Self {
        pairs.sort_by_key(|pair| pair.fitness);
        Self { pairs }
    }

    /// Ranked entries, best first.
    pub fn pairs(&self) -> &[FitIndexPair] {
        &self.pairs
    }

    /// Population size the ranking was built from.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True for a ranking of an empty population.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Best fitness, or `None` if empty.
    pub fn best_fitness(&self) -> Option<u64> {
        self.pairs.first().map(|pair| pair.fitness)
    }

    /// The best `floor(len * retain)` individuals, best first.
    pub fn parents(&self, retain: f64) -> Vec<Individual> {
        self.pairs[..retain_count(self.len(), retain)]
            .iter()
            .map(|pair| pair.individual.clone())
            .collect()
    }

    /// Entries in the order of the population they were ranked from.
    pub fn population_order(&self) -> Vec<&FitIndexPair> {
        let mut ordered: Vec<&FitIndexPair> = self.pairs.iter().collect();
        ordered.sort_by_key(|pair| pair.position);
        ordered
    }
}

/// Number of individuals kept by selection: `floor(len * retain)`.
pub fn retain_count(len: usize, retain: f64) -> usize {
    ((len as f64 * retain).floor() as usize).min(len)
}

/// Rank `population` by fitness and keep the best `floor(len * retain)`.
pub fn get_parents(population: &[Individual], target: i64, retain: f64) -> Vec<Individual> {
    let pairs = population
        .iter()
        .enumerate()
        .map(|(position, individual)| FitIndexPair {
            individual: individual.clone(),
            fitness: fitness(individual, target),
            position,
        })
        .collect();
    Ranking::from_pairs(pairs).parents(retain)
}

/// Submit the fitness fan-out and the collective ranking task.
///
/// One fitness task per member; a single rank task reads every pair and is
/// the only task that ever holds the collection while it is being sorted.
pub fn submit_ranking(
    substrate: &TaskSubstrate,
    population: &[TaskFuture<Individual>],
    target: i64,
) -> TaskFuture<Ranking> {
    let pairs: Vec<TaskFuture<FitIndexPair>> = population
        .iter()
        .enumerate()
        .map(|(position, member)| submit_fitness(substrate, member, position, target))
        .collect();

    let reads = dependencies(&pairs);
    substrate.submit("rank", reads, move || {
        let collected = pairs
            .iter()
            .map(|pair| pair.get().map(|p| FitIndexPair::clone(&p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Ranking::from_pairs(collected))
    })
}

/// Re-admit members missing from `pool` with probability `random_select`.
///
/// Members are visited in population order. Presence is checked by value
/// against the growing pool, and a draw is consumed only for members that
/// are not present. Returns the population positions that were admitted.
pub fn inject_diversity(
    ranking: &Ranking,
    pool: &mut Vec<Individual>,
    random_select: f64,
    rng: &mut GeneRng,
) -> Vec<usize> {
    let mut admitted = Vec::new();
    for pair in ranking.population_order() {
        if !pool.contains(&pair.individual) && random_select > rng.unit() {
            pool.push(pair.individual.clone());
            admitted.push(pair.position);
        }
    }
    admitted
}

/// Fill `pool` from the ranking, best first, until it holds `minimum`
/// members.
///
/// Only ranking entries past the first `retained` whose population position
/// is not in `admitted` are used. Returns how many members were added.
pub fn top_up(
    ranking: &Ranking,
    pool: &mut Vec<Individual>,
    retained: usize,
    admitted: &[usize],
    minimum: usize,
) -> usize {
    let before = pool.len();
    let candidates = ranking.pairs()[retained..]
        .iter()
        .filter(|pair| !admitted.contains(&pair.position));
    for pair in candidates {
        if pool.len() >= minimum {
            break;
        }
        pool.push(pair.individual.clone());
    }
    pool.len() - before
}
