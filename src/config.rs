//! Planner configuration.

use serde::Deserialize;

use crate::error::{PlannerError, Result};

/// Flat rate used when a vehicle carries no cost data (per km).
const DEFAULT_COST_PER_DISTANCE: f64 = 1.5;

const DEFAULT_LOCAL_SEARCH_ITERATIONS: usize = 50;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub fallback_cost_per_distance: f64,
    /// Extra weight of added travel minutes when comparing insertions.
    pub cost_per_minute: f64,
    pub local_search_iterations: usize,
    pub parallel_feasibility: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            fallback_cost_per_distance: DEFAULT_COST_PER_DISTANCE,
            cost_per_minute: 0.0,
            local_search_iterations: DEFAULT_LOCAL_SEARCH_ITERATIONS,
            parallel_feasibility: true,
        }
    }
}

impl PlannerConfig {
    /// Load configuration from environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from a key lookup. Missing keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup("PLANNER_FALLBACK_COST_PER_DISTANCE") {
            config.fallback_cost_per_distance = parse("PLANNER_FALLBACK_COST_PER_DISTANCE", &value)?;
        }
        if let Some(value) = lookup("PLANNER_COST_PER_MINUTE") {
            config.cost_per_minute = parse("PLANNER_COST_PER_MINUTE", &value)?;
        }
        if let Some(value) = lookup("PLANNER_LOCAL_SEARCH_ITERATIONS") {
            config.local_search_iterations = parse("PLANNER_LOCAL_SEARCH_ITERATIONS", &value)?;
        }
        if let Some(value) = lookup("PLANNER_PARALLEL_FEASIBILITY") {
            config.parallel_feasibility = parse("PLANNER_PARALLEL_FEASIBILITY", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fallback_cost_per_distance >= 0.0) {
            return Err(PlannerError::invalid("fallback_cost_per_distance must be non-negative"));
        }
        if !(self.cost_per_minute >= 0.0) {
            return Err(PlannerError::invalid("cost_per_minute must be non-negative"));
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PlannerError::invalid(format!("{key} has an invalid value: {value:?}")))
}
