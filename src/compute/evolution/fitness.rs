//! Fitness evaluation and population grading.

use crate::compute::substrate::{TaskFuture, TaskSubstrate, dependencies};
use crate::schema::{FitIndexPair, Individual};

/// Absolute distance between the gene sum and `target`. Lower is better.
pub fn fitness(individual: &Individual, target: i64) -> u64 {
    target.abs_diff(individual.gene_sum())
}

/// Mean fitness over a population. An empty population grades 0.
pub fn grade<'a, I>(population: I, target: i64) -> f64
where
    I: IntoIterator<Item = &'a Individual>,
{
    let (total, count) = population
        .into_iter()
        .fold((0.0f64, 0usize), |(total, count), ind| {
            (total + fitness(ind, target) as f64, count + 1)
        });
    if count == 0 { 0.0 } else { total / count as f64 }
}

/// Submit one fitness task for the member at `position`.
pub fn submit_fitness(
    substrate: &TaskSubstrate,
    member: &TaskFuture<Individual>,
    position: usize,
    target: i64,
) -> TaskFuture<FitIndexPair> {
    let input = member.clone();
    substrate.submit("fitness", vec![member.dependency()], move || {
        let individual = input.get()?;
        Ok(FitIndexPair {
            fitness: fitness(&individual, target),
            individual: Individual::clone(&individual),
            position,
        })
    })
}

/// Submit a grading task; it runs once every member has resolved.
pub fn submit_grade(
    substrate: &TaskSubstrate,
    population: &[TaskFuture<Individual>],
    target: i64,
) -> TaskFuture<f64> {
    let members = population.to_vec();
    substrate.submit("grade", dependencies(population), move || {
        let resolved = members
            .iter()
            .map(TaskFuture::get)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(grade(resolved.iter().map(|ind| ind.as_ref()), target))
    })
}
