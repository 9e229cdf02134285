//! Genetic local search over slot vectors.
//!
//! Individuals are slot vectors indexed by the fixed session order, so
//! positional crossover always recombines the same sessions and bindings
//! never change. Hard constraints are not propagated here; clashes are only
//! discouraged through the evaluator's penalties.

use log::{debug, trace, warn};
use rand::Rng;
use rayon::prelude::*;
use std::time::Instant;

use crate::config::OptimizerConfig;
use crate::data::SlotIndex;
use crate::evaluator::Evaluator;

pub type Chromosome = Vec<SlotIndex>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Individual {
    pub slots: Chromosome,
    pub penalty: i64,
}

impl Individual {
    pub fn fitness(&self) -> i64 {
        -self.penalty
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerOutcome {
    pub best: Individual,
    pub seed_penalty: i64,
    /// Completed generations.
    pub generations: usize,
    pub deadline_exceeded: bool,
}

pub struct GeneticOptimizer<'a> {
    config: &'a OptimizerConfig,
    evaluator: &'a Evaluator,
    domain_size: usize,
}

impl<'a> GeneticOptimizer<'a> {
    /// `config` is expected to have passed [`OptimizerConfig::validate`].
    pub fn new(config: &'a OptimizerConfig, evaluator: &'a Evaluator, domain_size: usize) -> Self {
        Self {
            config,
            evaluator,
            domain_size,
        }
    }

    /// Evolves a population seeded from `seed` and returns its fittest member.
    ///
    /// Elitism keeps the best individual of every generation, so the result
    /// is never worse than the seed.
    pub fn run<R: Rng + ?Sized>(
        &self,
        seed: &[SlotIndex],
        rng: &mut R,
        deadline: Option<Instant>,
    ) -> OptimizerOutcome {
        let seed_penalty = self.evaluator.penalty(seed);
        let seed_individual = Individual {
            slots: seed.to_vec(),
            penalty: seed_penalty,
        };
        if seed.is_empty() || self.domain_size == 0 {
            return OptimizerOutcome {
                best: seed_individual,
                seed_penalty,
                generations: 0,
                deadline_exceeded: false,
            };
        }

        let mut population = self.initial_population(seed, rng);
        let mut generations = 0;
        let mut deadline_exceeded = false;
        for generation in 0..self.config.generations {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!("Optimizer deadline reached after {generation} generations");
                deadline_exceeded = true;
                break;
            }
            let ranked = self.rank(population);
            trace!(
                "Generation {}: best penalty {}, worst penalty {}",
                generation,
                ranked[0].penalty,
                ranked[ranked.len() - 1].penalty
            );
            population = self.next_generation(&ranked, rng);
            generations += 1;
        }

        let best = self
            .rank(population)
            .into_iter()
            .next()
            .unwrap_or(seed_individual);
        debug!(
            "Optimizer finished {} generations: penalty {} -> {}",
            generations, seed_penalty, best.penalty
        );
        OptimizerOutcome {
            best,
            seed_penalty,
            generations,
            deadline_exceeded,
        }
    }

    /// The seed itself plus diversified copies of it.
    fn initial_population<R: Rng + ?Sized>(&self, seed: &[SlotIndex], rng: &mut R) -> Vec<Chromosome> {
        let mut population = Vec::with_capacity(self.config.population_size);
        population.push(seed.to_vec());
        while population.len() < self.config.population_size {
            let mut variant = seed.to_vec();
            resample_slots(&mut variant, self.config.initial_mutation_rate, self.domain_size, rng);
            population.push(variant);
        }
        population
    }

    /// Scores every individual in parallel and sorts best first.
    ///
    /// The sort is stable, so equal penalties keep their population order.
    fn rank(&self, population: Vec<Chromosome>) -> Vec<Individual> {
        let mut ranked: Vec<Individual> = population
            .into_par_iter()
            .map(|slots| {
                let penalty = self.evaluator.penalty(&slots);
                Individual { slots, penalty }
            })
            .collect();
        ranked.sort_by_key(|individual| individual.penalty);
        ranked
    }

    fn next_generation<R: Rng + ?Sized>(&self, ranked: &[Individual], rng: &mut R) -> Vec<Chromosome> {
        let mut next: Vec<Chromosome> = ranked
            .iter()
            .take(self.config.elite_count)
            .map(|individual| individual.slots.clone())
            .collect();
        while next.len() < self.config.population_size {
            let first = self.tournament(ranked, rng);
            let second = self.tournament(ranked, rng);
            let mut child = single_point_crossover(&first.slots, &second.slots, rng);
            resample_slots(&mut child, self.config.mutation_rate, self.domain_size, rng);
            next.push(child);
        }
        next
    }

    /// Fittest of a uniform sample drawn from the top of the ranking.
    fn tournament<'r, R: Rng + ?Sized>(&self, ranked: &'r [Individual], rng: &mut R) -> &'r Individual {
        let pool = self.config.tournament_pool_size.min(ranked.len());
        let size = self.config.tournament_size.min(pool);
        let winner = rand::seq::index::sample(rng, pool, size)
            .into_iter()
            .min()
            .unwrap_or(0);
        &ranked[winner]
    }
}

/// Takes `first` up to a random cut in `1..n` and `second` from the cut on.
pub fn single_point_crossover<R: Rng + ?Sized>(
    first: &[SlotIndex],
    second: &[SlotIndex],
    rng: &mut R,
) -> Chromosome {
    let n = first.len().min(second.len());
    if n < 2 {
        return first.to_vec();
    }
    let cut = rng.random_range(1..n);
    first[..cut].iter().chain(&second[cut..n]).copied().collect()
}

/// Independently replaces each slot with probability `rate` by a uniform draw from `0..domain_size`.
pub fn resample_slots<R: Rng + ?Sized>(
    slots: &mut [SlotIndex],
    rate: f64,
    domain_size: usize,
    rng: &mut R,
) {
    if domain_size == 0 {
        return;
    }
    for slot in slots.iter_mut() {
        if rng.random_bool(rate) {
            *slot = rng.random_range(0..domain_size);
        }
    }
}
