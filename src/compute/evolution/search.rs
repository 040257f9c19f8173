//! Generational evolution engine.
//!
//! Each generation is submitted as a task graph:
//!
//! ```text
//! member ─► fitness ─┐
//! member ─► fitness ─┼─► rank ─► diversify ─► mutate pass ─► recombine
//! member ─► fitness ─┘                          │ mutate        │ crossover
//!                                               │ mutate        │ crossover
//! ```
//!
//! The mutate pass and the recombine stage decide how much work there is
//! from the values they read and submit the individual mutation and
//! crossover tasks themselves. The driving thread only blocks at the barrier
//! that resolves the whole generation.

use std::sync::Arc;
use std::time::Instant;

use rayon::ThreadPoolBuildError;

use crate::compute::substrate::{TaskFailure, TaskFuture, TaskSubstrate};
use crate::metrics::MetricsSink;
use crate::schema::{
    ConfigError, EvolutionParams, EvolutionResult, GenerationPhase, GenerationProgress,
    Individual, RunConfig, RunStats,
};

use super::fitness::{fitness, submit_grade};
use super::genome::{GeneRng, create_individual, crossover, mutate};
use super::selection::{Ranking, inject_diversity, submit_ranking, top_up};

/// Errors that abort an evolution run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Pipeline task failed: {0}")]
    Task(#[from] TaskFailure),
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] ThreadPoolBuildError),
}

/// Parents after selection and diversity injection.
#[derive(Debug, Clone)]
pub struct BreedingPool {
    /// Retained parents, then admitted members, then top-up members.
    pub members: Vec<Individual>,
    /// Random state after the diversity draws.
    pub rng: GeneRng,
    /// How many members were kept by selection.
    pub retained: usize,
    /// How many members were admitted by diversity injection.
    pub admitted: usize,
}

/// Breeding pool after the mutation pass.
#[derive(Debug, Clone)]
pub struct MutatedPool {
    /// Parents, some replaced by pending mutation tasks.
    pub members: Vec<TaskFuture<Individual>>,
    /// Random state rebuilt from the seed following the last mutation.
    pub rng: GeneRng,
    /// Mutations submitted.
    pub mutations: usize,
}

/// Unresolved output of one generation.
#[derive(Debug, Clone)]
pub struct Offspring {
    /// Parents followed by children; always the original population size.
    pub members: Vec<TaskFuture<Individual>>,
    /// Random state after the crossover draws.
    pub rng: GeneRng,
    /// Mutations submitted.
    pub mutations: usize,
    /// Crossovers submitted.
    pub crossovers: usize,
}

/// Phase bookkeeping for one generation.
#[derive(Debug, Clone)]
pub struct GenerationState {
    index: usize,
    seed: u64,
    phase: GenerationPhase,
}

impl GenerationState {
    fn new(index: usize, seed: u64) -> Self {
        log::debug!("generation {} seeded with {}", index, seed);
        Self {
            index,
            seed,
            phase: GenerationPhase::Seeded,
        }
    }

    fn advance(&mut self, next: GenerationPhase) {
        debug_assert_eq!(
            self.phase.successor(),
            Some(next),
            "generation {} cannot move from {:?} to {:?}",
            self.index,
            self.phase,
            next
        );
        log::debug!(
            "generation {} (seed {}): {:?} -> {:?}",
            self.index,
            self.seed,
            self.phase,
            next
        );
        self.phase = next;
    }

    /// Current phase.
    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }
}

/// A submitted generation waiting for its barrier.
#[derive(Debug)]
pub struct PendingGeneration {
    state: GenerationState,
    offspring: TaskFuture<Offspring>,
}

/// A generation whose population holds concrete values.
#[derive(Debug, Clone)]
pub struct ResolvedGeneration {
    /// The new population.
    pub population: Vec<Individual>,
    /// Random state to hand to the next generation.
    pub rng: GeneRng,
    /// Mutations performed.
    pub mutations: usize,
    /// Crossovers performed.
    pub crossovers: usize,
    /// Final bookkeeping; always `Resolved`.
    pub state: GenerationState,
}

impl PendingGeneration {
    /// Current phase (always `Recombined` until resolved).
    pub fn phase(&self) -> GenerationPhase {
        self.state.phase
    }

    /// Generation barrier: block until every member is a concrete value.
    pub fn resolve(self, substrate: &TaskSubstrate) -> Result<ResolvedGeneration, TaskFailure> {
        let Self {
            mut state,
            offspring,
        } = self;
        let offspring = substrate.resolve(&offspring)?;
        let population = substrate.resolve_all(&offspring.members)?;
        state.advance(GenerationPhase::Resolved);

        Ok(ResolvedGeneration {
            population,
            rng: offspring.rng,
            mutations: offspring.mutations,
            crossovers: offspring.crossovers,
            state,
        })
    }
}

/// Submit factory tasks for a population; member `i` uses seed `seed + i`.
pub fn generate_population(
    substrate: &TaskSubstrate,
    num_individuals: usize,
    size: usize,
    seed: u64,
) -> Vec<TaskFuture<Individual>> {
    (0..num_individuals)
        .map(|i| {
            let member_seed = seed.wrapping_add(i as u64);
            substrate.submit("individual", Vec::new(), move || {
                Ok(create_individual(size, member_seed))
            })
        })
        .collect()
}

/// Submit one generation.
///
/// `seed` starts the mutation seed sequence; `rng` drives diversity,
/// mutation and pairing decisions and comes back, advanced, in the
/// resolved generation.
pub fn evolve(
    substrate: &TaskSubstrate,
    population: &[TaskFuture<Individual>],
    target: i64,
    index: usize,
    seed: u64,
    rng: GeneRng,
    params: &EvolutionParams,
) -> PendingGeneration {
    let mut state = GenerationState::new(index, seed);
    let population_size = population.len();

    let ranking = submit_ranking(substrate, population, target);
    state.advance(GenerationPhase::Selected);

    let pool = submit_diversify(substrate, &ranking, rng, params);
    state.advance(GenerationPhase::Diversified);

    let mutated = submit_mutation_pass(substrate, &pool, seed, params.mutate_rate);
    state.advance(GenerationPhase::Mutated);

    let offspring = submit_recombine(substrate, &mutated, population_size);
    state.advance(GenerationPhase::Recombined);

    PendingGeneration { state, offspring }
}

fn submit_diversify(
    substrate: &TaskSubstrate,
    ranking: &TaskFuture<Ranking>,
    rng: GeneRng,
    params: &EvolutionParams,
) -> TaskFuture<BreedingPool> {
    let ranking = ranking.clone();
    let retain = params.retain;
    let random_select = params.random_select;

    substrate.submit("diversify", vec![ranking.dependency()], move || {
        let ranking = ranking.get()?;
        let mut rng = rng;

        let mut members = ranking.parents(retain);
        let retained = members.len();
        let admitted = inject_diversity(&ranking, &mut members, random_select, &mut rng);

        // Crossover needs two distinct parents whenever children are due.
        let minimum = ranking.len().min(2);
        let topped = top_up(&ranking, &mut members, retained, &admitted, minimum);
        if topped > 0 {
            log::debug!("breeding pool topped up with {} ranked members", topped);
        }

        Ok(BreedingPool {
            members,
            rng,
            retained,
            admitted: admitted.len(),
        })
    })
}

fn submit_mutation_pass(
    substrate: &TaskSubstrate,
    pool: &TaskFuture<BreedingPool>,
    seed: u64,
    mutate_rate: f64,
) -> TaskFuture<MutatedPool> {
    let pool = pool.clone();
    let nested = substrate.clone();

    substrate.submit("mutate-pass", vec![pool.dependency()], move || {
        let pool = pool.get()?;
        let mut rng = pool.rng.clone();
        let mut next_seed = seed;
        let mut mutations = 0;

        let members = pool
            .members
            .iter()
            .map(|parent| {
                if mutate_rate > rng.unit() {
                    let parent = parent.clone();
                    let mutation_seed = next_seed;
                    next_seed = next_seed.wrapping_add(1);
                    mutations += 1;
                    nested.submit("mutate", Vec::new(), move || {
                        Ok(mutate(&parent, mutation_seed))
                    })
                } else {
                    TaskFuture::ready(parent.clone())
                }
            })
            .collect();

        Ok(MutatedPool {
            members,
            rng: GeneRng::new(next_seed),
            mutations,
        })
    })
}

fn submit_recombine(
    substrate: &TaskSubstrate,
    mutated: &TaskFuture<MutatedPool>,
    population_size: usize,
) -> TaskFuture<Offspring> {
    let mutated = mutated.clone();
    let nested = substrate.clone();

    substrate.submit("recombine", vec![mutated.dependency()], move || {
        let mutated = mutated.get()?;
        let mut rng = mutated.rng.clone();
        let parents = &mutated.members;
        let needed = population_size.saturating_sub(parents.len());

        if needed > 0 && parents.len() < 2 {
            return Err(TaskFailure::Invalid {
                task: "recombine",
                message: format!(
                    "{} children needed but only {} parents available",
                    needed,
                    parents.len()
                ),
            });
        }

        let children: Vec<TaskFuture<Individual>> = (0..needed)
            .map(|_| {
                let (m, f) = rng.distinct_pair(parents.len());
                let male = parents[m].clone();
                let female = parents[f].clone();
                let reads = vec![male.dependency(), female.dependency()];
                nested.submit("crossover", reads, move || {
                    let male = male.get()?;
                    let female = female.get()?;
                    Ok(crossover(&male, &female))
                })
            })
            .collect();

        let crossovers = children.len();
        let members = parents.iter().cloned().chain(children).collect();

        Ok(Offspring {
            members,
            rng,
            mutations: mutated.mutations,
            crossovers,
        })
    })
}

/// Evolution engine that drives generations and the barrier between them.
pub struct EvolutionEngine {
    config: RunConfig,
    sink: Option<Arc<dyn MetricsSink>>,
}

impl EvolutionEngine {
    /// Create a new evolution engine.
    pub fn new(config: RunConfig) -> Self {
        Self { config, sink: None }
    }

    /// Forward per-generation wall time to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn report(&self, generation: usize, elapsed_seconds: f64) {
        if let Some(sink) = &self.sink
            && let Err(err) = sink.record_generation(elapsed_seconds)
        {
            log::warn!(
                "generation {} timing sample dropped: {}",
                generation,
                err
            );
        }
    }

    /// Run evolution with a progress callback invoked after every barrier.
    pub fn run_with_callback<F>(&self, callback: F) -> Result<EvolutionResult, EngineError>
    where
        F: Fn(&GenerationProgress),
    {
        let config = &self.config;
        config.validate()?;

        let substrate = TaskSubstrate::new(config.substrate.threads)?;
        log::info!(
            "evolving {} individuals of {} genes toward {} for {} generations on {} workers",
            config.num_individuals,
            config.size,
            config.target,
            config.lifecycles,
            substrate.threads()
        );

        let start = Instant::now();
        let mut population =
            generate_population(&substrate, config.num_individuals, config.size, config.seed);
        let init_seconds = start.elapsed().as_secs_f64();
        log::info!("population submitted in {:.6}s", init_seconds);

        let mut history = Vec::new();
        if config.collect_fitness_history {
            history.push(submit_grade(&substrate, &population, config.target));
        }

        // The driver stream starts at the first seed no factory task used.
        let mut rng = GeneRng::new(config.seed.wrapping_add(config.num_individuals as u64));
        let mut generation_seconds = Vec::with_capacity(config.lifecycles);
        let loop_start = Instant::now();

        for generation in 0..config.lifecycles {
            let cycle_start = Instant::now();
            let seed = config.seed.wrapping_add(generation as u64);

            let pending = evolve(
                &substrate,
                &population,
                config.target,
                generation,
                seed,
                rng,
                &config.evolution,
            );
            let resolved = pending.resolve(&substrate)?;

            let elapsed = cycle_start.elapsed().as_secs_f64();
            generation_seconds.push(elapsed);
            self.report(generation, elapsed);

            let best_fitness = best_fitness(&resolved.population, config.target);
            log::info!(
                "generation {}: {:.6}s, best fitness {}, {} mutations, {} crossovers",
                generation,
                elapsed,
                best_fitness,
                resolved.mutations,
                resolved.crossovers
            );

            rng = resolved.rng;
            population = resolved
                .population
                .into_iter()
                .map(TaskFuture::ready)
                .collect();

            if config.collect_fitness_history {
                history.push(submit_grade(&substrate, &population, config.target));
            }

            callback(&GenerationProgress {
                generation,
                total_generations: config.lifecycles,
                seed,
                elapsed_seconds: elapsed,
                best_fitness,
                tasks_submitted: substrate.tasks_submitted(),
            });
        }

        // Closing grade of the final population, after the loop.
        if config.collect_fitness_history {
            history.push(submit_grade(&substrate, &population, config.target));
        }

        let population = substrate.resolve_all(&population)?;
        let fitness_history = if config.collect_fitness_history {
            Some(substrate.resolve_all(&history)?)
        } else {
            None
        };
        let evolve_seconds = loop_start.elapsed().as_secs_f64();
        let best_fitness = best_fitness(&population, config.target);
        log::info!(
            "evolution finished in {:.6}s, best fitness {}",
            evolve_seconds,
            best_fitness
        );

        Ok(EvolutionResult {
            population,
            fitness_history,
            stats: RunStats {
                generations: config.lifecycles,
                init_seconds,
                evolve_seconds,
                generation_seconds,
                tasks_submitted: substrate.tasks_submitted(),
                best_fitness,
            },
        })
    }

    /// Run evolution (blocking).
    pub fn run(&self) -> Result<EvolutionResult, EngineError> {
        self.run_with_callback(|_| {})
    }
}

fn best_fitness(population: &[Individual], target: i64) -> u64 {
    population
        .iter()
        .map(|ind| fitness(ind, target))
        .min()
        .unwrap_or(0)
}

/// Evolve a population with default rates.
///
/// Returns the final population and, if requested, the mean fitness before
/// the first generation, after each one, and once more after the loop.
pub fn run(
    num_individuals: usize,
    size: usize,
    target: i64,
    lifecycles: usize,
    seed: u64,
    collect_fitness_history: bool,
) -> Result<(Vec<Individual>, Option<Vec<f64>>), EngineError> {
    let config = RunConfig {
        num_individuals,
        size,
        target,
        lifecycles,
        seed,
        collect_fitness_history,
        ..Default::default()
    };
    let result = EvolutionEngine::new(config).run()?;
    Ok((result.population, result.fitness_history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::selection::{get_parents, retain_count};
    use crate::metrics::MetricsError;
    use crate::schema::{GENE_MAX, SubstrateConfig};
    use proptest::prelude::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        samples: Mutex<Vec<f64>>,
    }

    impl MetricsSink for RecordingSink {
        fn record_generation(&self, elapsed_seconds: f64) -> Result<(), MetricsError> {
            self.samples.lock().unwrap().push(elapsed_seconds);
            Ok(())
        }
    }

    struct UnreachableSink;

    impl MetricsSink for UnreachableSink {
        fn record_generation(&self, _elapsed_seconds: f64) -> Result<(), MetricsError> {
            Err(MetricsError::Connectivity("queue closed".to_string()))
        }
    }

    fn small_config(threads: usize) -> RunConfig {
        RunConfig {
            num_individuals: 30,
            size: 8,
            target: 300,
            lifecycles: 6,
            seed: 99,
            substrate: SubstrateConfig {
                threads: Some(threads),
            },
            ..Default::default()
        }
    }

    fn ready(population: &[Individual]) -> Vec<TaskFuture<Individual>> {
        population.iter().cloned().map(TaskFuture::ready).collect()
    }

    #[test]
    fn test_end_to_end_small_population() {
        let config = RunConfig {
            num_individuals: 4,
            size: 2,
            target: 10,
            lifecycles: 1,
            seed: 1,
            ..Default::default()
        };
        let result = EvolutionEngine::new(config).run().unwrap();

        assert_eq!(result.population.len(), 4);
        assert!(result.population.iter().all(|ind| ind.len() == 2));

        let history = result.fitness_history.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], history[2]);
        assert!(history.iter().all(|g| g.is_finite() && *g >= 0.0));
        assert_eq!(result.stats.generations, 1);
        assert_eq!(result.stats.generation_seconds.len(), 1);
    }

    #[test]
    fn test_initial_population_genes_in_range() {
        let substrate = TaskSubstrate::new(Some(2)).unwrap();
        let futures = generate_population(&substrate, 4, 2, 1);
        let population = substrate.resolve_all(&futures).unwrap();

        assert_eq!(population.len(), 4);
        for ind in &population {
            assert_eq!(ind.len(), 2);
            assert!(ind.genes().iter().all(|&g| g <= GENE_MAX));
        }
        assert_eq!(population[2], create_individual(2, 3));
    }

    #[test]
    fn test_run_contract() {
        let (population, history) = run(10, 5, 100, 3, 7, false).unwrap();
        assert_eq!(population.len(), 10);
        assert!(history.is_none());
    }

    #[test]
    fn test_zero_lifecycles_returns_initial_population() {
        let config = RunConfig {
            num_individuals: 5,
            size: 3,
            lifecycles: 0,
            seed: 10,
            ..Default::default()
        };
        let result = EvolutionEngine::new(config).run().unwrap();

        let expected: Vec<Individual> = (0..5).map(|i| create_individual(3, 10 + i)).collect();
        assert_eq!(result.population, expected);
        let history = result.fitness_history.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], history[1]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RunConfig {
            size: 0,
            ..Default::default()
        };
        assert!(matches!(
            EvolutionEngine::new(config).run(),
            Err(EngineError::Config(ConfigError::InvalidSize))
        ));
    }

    #[test]
    fn test_deterministic_across_worker_counts() {
        let single = EvolutionEngine::new(small_config(1)).run().unwrap();
        let many = EvolutionEngine::new(small_config(4)).run().unwrap();
        let again = EvolutionEngine::new(small_config(4)).run().unwrap();

        assert_eq!(single.population, many.population);
        assert_eq!(many.population, again.population);
        assert_eq!(single.fitness_history, many.fitness_history);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let a = EvolutionEngine::new(small_config(2)).run().unwrap();
        let mut config = small_config(2);
        config.seed += 1000;
        let b = EvolutionEngine::new(config).run().unwrap();
        assert_ne!(a.population, b.population);
    }

    #[test]
    fn test_sink_receives_one_sample_per_generation() {
        let sink = Arc::new(RecordingSink::default());
        let engine = EvolutionEngine::new(small_config(2)).with_sink(sink.clone());
        engine.run().unwrap();

        let samples = sink.samples.lock().unwrap();
        assert_eq!(samples.len(), 6);
        assert!(samples.iter().all(|s| *s >= 0.0));
    }

    #[test]
    fn test_sink_failure_is_not_fatal() {
        let engine = EvolutionEngine::new(small_config(2)).with_sink(Arc::new(UnreachableSink));
        let result = engine.run().unwrap();
        assert_eq!(result.population.len(), 30);
    }

    #[test]
    fn test_callback_per_generation() {
        let calls = AtomicUsize::new(0);
        EvolutionEngine::new(small_config(2))
            .run_with_callback(|progress| {
                assert_eq!(progress.generation, calls.fetch_add(1, Ordering::SeqCst));
                assert_eq!(progress.seed, 99 + progress.generation as u64);
                assert_eq!(progress.total_generations, 6);
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_evolve_keeps_parents_first() {
        let substrate = TaskSubstrate::new(Some(2)).unwrap();
        let population: Vec<Individual> = (0..10).map(|i| create_individual(6, i)).collect();
        let params = EvolutionParams {
            retain: 0.3,
            random_select: 0.0,
            mutate_rate: 0.0,
        };

        let pending = evolve(&substrate, &ready(&population), 200, 0, 5, GeneRng::new(1), &params);
        assert_eq!(pending.phase(), GenerationPhase::Recombined);
        let resolved = pending.resolve(&substrate).unwrap();

        assert_eq!(resolved.state.phase(), GenerationPhase::Resolved);
        assert_eq!(resolved.population.len(), 10);
        assert_eq!(&resolved.population[..3], &get_parents(&population, 200, 0.3)[..]);
        assert_eq!(resolved.mutations, 0);
        assert_eq!(resolved.crossovers, 7);
    }

    #[test]
    fn test_evolve_mutates_every_parent_at_full_rate() {
        let substrate = TaskSubstrate::new(Some(2)).unwrap();
        let population: Vec<Individual> = (0..10).map(|i| create_individual(6, i)).collect();
        let params = EvolutionParams {
            retain: 0.5,
            random_select: 0.0,
            mutate_rate: 1.0,
        };

        let resolved = evolve(&substrate, &ready(&population), 200, 0, 40, GeneRng::new(1), &params)
            .resolve(&substrate)
            .unwrap();
        assert_eq!(resolved.mutations, 5);

        // Parent i was mutated with seed 40 + i.
        let parents = get_parents(&population, 200, 0.5);
        for (i, parent) in parents.iter().enumerate() {
            assert_eq!(resolved.population[i], mutate(parent, 40 + i as u64));
        }
    }

    #[test]
    fn test_pairing_uses_stream_after_last_mutation_seed() {
        let substrate = TaskSubstrate::new(Some(3)).unwrap();
        let population: Vec<Individual> = (0..10).map(|i| create_individual(6, i)).collect();
        let params = EvolutionParams {
            retain: 0.5,
            random_select: 0.0,
            mutate_rate: 1.0,
        };

        let resolved = evolve(&substrate, &ready(&population), 200, 0, 40, GeneRng::new(1), &params)
            .resolve(&substrate)
            .unwrap();

        // Parents mutated with seeds 40..=44, pairing reseeded with 45.
        let parents: Vec<Individual> = get_parents(&population, 200, 0.5)
            .iter()
            .enumerate()
            .map(|(i, parent)| mutate(parent, 40 + i as u64))
            .collect();
        let mut pairing = GeneRng::new(45);
        let mut expected = parents.clone();
        for _ in 0..5 {
            let (m, f) = pairing.distinct_pair(parents.len());
            expected.push(crossover(&parents[m], &parents[f]));
        }

        assert_eq!(resolved.population, expected);
    }

    #[test]
    fn test_engine_keeps_config() {
        let engine = EvolutionEngine::new(small_config(3));
        assert_eq!(engine.config().num_individuals, 30);
        assert_eq!(engine.config().substrate.threads, Some(3));
    }

    #[test]
    fn test_evolve_tops_up_tiny_pool() {
        let substrate = TaskSubstrate::new(Some(2)).unwrap();
        let population: Vec<Individual> = (0..4).map(|i| create_individual(2, i)).collect();
        let params = EvolutionParams {
            retain: 0.2,
            random_select: 0.0,
            mutate_rate: 0.0,
        };

        let resolved = evolve(&substrate, &ready(&population), 10, 0, 1, GeneRng::new(1), &params)
            .resolve(&substrate)
            .unwrap();
        assert_eq!(resolved.population.len(), 4);
        assert_eq!(resolved.crossovers, 2);
    }

    #[test]
    fn test_single_individual_population() {
        let config = RunConfig {
            num_individuals: 1,
            size: 3,
            lifecycles: 3,
            ..Default::default()
        };
        let result = EvolutionEngine::new(config).run().unwrap();
        assert_eq!(result.population.len(), 1);
    }

    #[test]
    fn test_failed_member_aborts_generation() {
        let substrate = TaskSubstrate::new(Some(2)).unwrap();
        let mut population = ready(&[
            Individual::from(vec![1, 2]),
            Individual::from(vec![3, 4]),
            Individual::from(vec![5, 6]),
        ]);
        population.push(substrate.submit("individual", Vec::new(), || {
            Err(TaskFailure::Invalid {
                task: "individual",
                message: "corrupt genes".to_string(),
            })
        }));

        let failure = evolve(
            &substrate,
            &population,
            10,
            0,
            1,
            GeneRng::new(1),
            &EvolutionParams::default(),
        )
        .resolve(&substrate)
        .unwrap_err();

        assert!(matches!(
            failure.root_cause(),
            TaskFailure::Invalid { message, .. } if message == "corrupt genes"
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_evolve_preserves_population_size(
            n in 1usize..40,
            size in 1usize..10,
            seed in 0u64..1000,
            retain in 0.0f64..=1.0,
            random_select in 0.0f64..=1.0,
        ) {
            let substrate = TaskSubstrate::new(Some(2)).unwrap();
            let population: Vec<Individual> =
                (0..n as u64).map(|i| create_individual(size, seed + i)).collect();
            let params = EvolutionParams { retain, random_select, mutate_rate: 0.5 };

            let resolved = evolve(&substrate, &ready(&population), 50, 0, seed, GeneRng::new(seed), &params)
                .resolve(&substrate)
                .unwrap();
            prop_assert_eq!(resolved.population.len(), n);
            prop_assert!(resolved.population.iter().all(|ind| ind.len() == size));
            prop_assert!(resolved.population.len() >= retain_count(n, retain));
        }
    }
}
