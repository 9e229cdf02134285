//! Solve options and genetic algorithm parameters.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{Result, ScheduleError};

/// Parameters of the genetic optimizer.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizerConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Per-gene probability of resampling a child's slot.
    pub mutation_rate: f64,
    pub elite_count: usize,
    pub tournament_size: usize,
    /// Tournaments draw from this many of the best-ranked individuals.
    pub tournament_pool_size: usize,
    /// Per-gene resampling probability used once, to diversify the initial population.
    pub initial_mutation_rate: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: 30,
            generations: 50,
            mutation_rate: 0.1,
            elite_count: 5,
            tournament_size: 3,
            tournament_pool_size: 15,
            initial_mutation_rate: 0.3,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(invalid("populationSize must be at least 1"));
        }
        if self.elite_count == 0 || self.elite_count > self.population_size {
            return Err(invalid(format!(
                "eliteCount must be between 1 and populationSize ({}), got {}",
                self.population_size, self.elite_count
            )));
        }
        if self.tournament_size == 0 {
            return Err(invalid("tournamentSize must be at least 1"));
        }
        if self.tournament_pool_size == 0 {
            return Err(invalid("tournamentPoolSize must be at least 1"));
        }
        for (name, rate) in [
            ("mutationRate", self.mutation_rate),
            ("initialMutationRate", self.initial_mutation_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(invalid(format!("{name} must lie in [0, 1], got {rate}")));
            }
        }
        Ok(())
    }
}

/// Options for one call to [`crate::solver::solve`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolveOptions {
    /// Seed for every random draw of the solve.
    pub seed: u64,
    /// Overall wall-clock budget; `None` runs to completion.
    pub time_limit_ms: Option<u64>,
    pub optimizer: OptimizerConfig,
}

impl SolveOptions {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.optimizer.validate()
    }

    pub fn deadline(&self, start: Instant) -> Option<Instant> {
        self.time_limit_ms
            .map(|ms| start + Duration::from_millis(ms))
    }
}

fn invalid(message: impl Into<String>) -> ScheduleError {
    ScheduleError::InvalidConfig(message.into())
}
