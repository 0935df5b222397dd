//! Assignment and sequencing of pending stops onto available vehicles.
//!
//! The solver is a capacitated, time-windowed cheapest insertion:
//!
//! 1. Every (vehicle, stop) pair is checked on its own for nature,
//!    capacity and a reachable window inside the vehicle's schedule.
//! 2. Among the surviving pairs, the stop whose best insertion (any vehicle,
//!    any position) adds the least cost is placed first. Only the column of
//!    the vehicle that just grew is re-evaluated after each placement.
//! 3. A bounded 2-opt pass shortens each route without breaking feasibility.
//! 4. Final metrics come from the route calculator.
//!
//! Stops that no vehicle can take are reported with a reason, never dropped.
//! Identical inputs always produce identical output, regardless of input order.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use chrono::NaiveTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calculation::{RouteCalculator, RouteEvaluation, RouteMetrics};
use crate::config::PlannerConfig;
use crate::error::Result;
use crate::geo::{self, DistanceEstimator, Haversine};
use crate::model::{Stop, StopId, StopStatus, Vehicle, VehicleId};

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Rate for vehicles without their own cost per distance.
    pub fallback_cost_per_distance: f64,
    /// Extra weight of added travel minutes on top of the distance rate.
    pub cost_per_minute: f64,
    /// Maximum 2-opt passes per route. Zero disables the improvement phase.
    pub local_search_iterations: usize,
    /// Evaluate independent (vehicle, stop) pairs on the rayon pool.
    pub parallel: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self::from(&PlannerConfig::default())
    }
}

impl From<&PlannerConfig> for SolveOptions {
    fn from(config: &PlannerConfig) -> Self {
        Self {
            fallback_cost_per_distance: config.fallback_cost_per_distance,
            cost_per_minute: config.cost_per_minute,
            local_search_iterations: config.local_search_iterations,
            parallel: config.parallel_feasibility,
        }
    }
}

/// Why a stop ended up outside every route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// Only pending stops are planned.
    NotPending,
    /// The same stop id was supplied more than once.
    DuplicateStop,
    NoAvailableVehicle,
    /// The stop's payload alone exceeds every vehicle's capacity.
    ExceedsCapacity,
    /// No vehicle handles the payload nature.
    IncompatibleNature,
    /// No window can be reached inside any vehicle's schedule.
    NoFeasibleWindow,
    /// Feasible on an empty vehicle, but no longer fits any built route.
    NoFeasibleInsertion,
}

impl fmt::Display for UnassignedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotPending => "stop is not pending",
            Self::DuplicateStop => "stop was supplied more than once",
            Self::NoAvailableVehicle => "no available vehicle",
            Self::ExceedsCapacity => "payload exceeds vehicle capacity",
            Self::IncompatibleNature => "no vehicle handles the payload nature",
            Self::NoFeasibleWindow => "no time window reachable within a work schedule",
            Self::NoFeasibleInsertion => "no feasible position in any route",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedStop {
    pub stop_id: StopId,
    pub reason: UnassignedReason,
}

/// A vehicle's sequenced stops, before it is given a route id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedRoute {
    pub vehicle_id: VehicleId,
    pub ordered_stops: Vec<StopId>,
    pub departure: NaiveTime,
    pub metrics: RouteMetrics,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationOutcome {
    /// One entry per vehicle that received at least one stop, ordered by vehicle id.
    pub routes: Vec<PlannedRoute>,
    /// Ordered by stop id.
    pub unassigned: Vec<UnassignedStop>,
}

impl OptimizationOutcome {
    pub fn assigned_stop_count(&self) -> usize {
        self.routes.iter().map(|route| route.ordered_stops.len()).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unassigned.is_empty()
    }
}

/// Result of checking one (vehicle, stop) pair in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairCheck {
    Feasible,
    Nature,
    Capacity,
    Window,
}

#[derive(Debug, Clone)]
struct Insertion {
    stop: usize,
    vehicle: usize,
    position: usize,
    cost: f64,
    evaluation: RouteEvaluation,
}

#[derive(Debug, Clone)]
struct RouteState {
    stops: Vec<usize>,
    evaluation: RouteEvaluation,
}

pub struct RouteOptimizer<D = Haversine> {
    calculator: RouteCalculator<D>,
    options: SolveOptions,
}

impl Default for RouteOptimizer<Haversine> {
    fn default() -> Self {
        Self::new(RouteCalculator::default(), SolveOptions::default())
    }
}

impl<D: DistanceEstimator> RouteOptimizer<D> {
    pub fn new(calculator: RouteCalculator<D>, options: SolveOptions) -> Self {
        Self { calculator, options }
    }

    pub fn calculator(&self) -> &RouteCalculator<D> {
        &self.calculator
    }

    /// Partitions `stops` across `vehicles` and sequences each vehicle's share.
    ///
    /// Malformed input fails with `InvalidInput`. Stops that cannot be placed
    /// are listed in the outcome instead of failing the run.
    pub fn optimize(&self, vehicles: &[Vehicle], stops: &[Stop]) -> Result<OptimizationOutcome> {
        for vehicle in vehicles {
            vehicle.validate()?;
        }
        for stop in stops {
            stop.validate()?;
        }

        let fleet = eligible_vehicles(vehicles);
        let (candidates, mut unassigned) = eligible_stops(stops);

        if fleet.is_empty() {
            unassigned.extend(candidates.iter().map(|stop| UnassignedStop {
                stop_id: stop.id.clone(),
                reason: UnassignedReason::NoAvailableVehicle,
            }));
            unassigned.sort_by(|a, b| a.stop_id.cmp(&b.stop_id));
            return Ok(OptimizationOutcome {
                routes: Vec::new(),
                unassigned,
            });
        }

        // Phase 1: pair feasibility
        let checks = self.map_indices(candidates.len(), |s| {
            fleet
                .iter()
                .map(|vehicle| self.check_pair(vehicle, candidates[s]))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut pending: Vec<usize> = Vec::new();
        for (s, row) in checks.iter().enumerate() {
            if row.contains(&PairCheck::Feasible) {
                pending.push(s);
            } else {
                unassigned.push(UnassignedStop {
                    stop_id: candidates[s].id.clone(),
                    reason: pair_failure_reason(row),
                });
            }
        }

        debug!(
            vehicles = fleet.len(),
            stops = candidates.len(),
            feasible_stops = pending.len(),
            "pair feasibility evaluated"
        );

        // Phases 2 and 3: cheapest insertion over feasible pairs
        let mut routes = fleet
            .iter()
            .map(|vehicle| {
                Ok(RouteState {
                    stops: Vec::new(),
                    evaluation: self.evaluate(vehicle, &[], &candidates)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut best: Vec<Vec<Option<Insertion>>> = self.map_indices(candidates.len(), |s| {
            (0..fleet.len())
                .map(|v| {
                    if checks[s][v] == PairCheck::Feasible {
                        self.best_insertion(s, v, &fleet, &candidates, &routes[v])
                    } else {
                        Ok(None)
                    }
                })
                .collect::<Result<Vec<_>>>()
        })?;

        while !pending.is_empty() {
            let mut chosen: Option<&Insertion> = None;
            let mut stuck = Vec::new();

            for &s in &pending {
                let stop_best = best[s]
                    .iter()
                    .flatten()
                    .min_by(|a, b| compare_insertions(a, b, &fleet, &candidates));
                match stop_best {
                    Some(candidate) => {
                        let better = chosen
                            .map(|current| compare_insertions(candidate, current, &fleet, &candidates) == Ordering::Less)
                            .unwrap_or(true);
                        if better {
                            chosen = Some(candidate);
                        }
                    }
                    None => stuck.push(s),
                }
            }

            // Routes only grow, so a stop with no position now never gets one later.
            for &s in &stuck {
                unassigned.push(UnassignedStop {
                    stop_id: candidates[s].id.clone(),
                    reason: UnassignedReason::NoFeasibleInsertion,
                });
            }
            pending.retain(|s| !stuck.contains(s));

            let Some(insertion) = chosen.cloned() else {
                break;
            };

            let route = &mut routes[insertion.vehicle];
            route.stops.insert(insertion.position, insertion.stop);
            route.evaluation = insertion.evaluation;
            pending.retain(|&s| s != insertion.stop);

            let v = insertion.vehicle;
            let column = self.map_indices(pending.len(), |i| {
                let s = pending[i];
                if checks[s][v] == PairCheck::Feasible {
                    self.best_insertion(s, v, &fleet, &candidates, &routes[v])
                } else {
                    Ok(None)
                }
            })?;
            for (i, entry) in column.into_iter().enumerate() {
                best[pending[i]][v] = entry;
            }
        }

        // Phase 3b: bounded 2-opt
        for (v, route) in routes.iter_mut().enumerate() {
            self.two_opt(fleet[v], &candidates, route)?;
        }

        // Phase 4: final metrics
        let mut planned = Vec::new();
        for (v, route) in routes.iter().enumerate() {
            if route.stops.is_empty() {
                continue;
            }
            let vehicle = fleet[v];
            let ordered: Vec<&Stop> = route.stops.iter().map(|&s| candidates[s]).collect();
            let evaluation = self.calculator.evaluate(vehicle, vehicle.work_schedule.start_time, &ordered)?;
            debug_assert!(evaluation.is_feasible(), "route {} built infeasible", vehicle.id);

            planned.push(PlannedRoute {
                vehicle_id: vehicle.id.clone(),
                ordered_stops: ordered.iter().map(|stop| stop.id.clone()).collect(),
                departure: vehicle.work_schedule.start_time,
                metrics: evaluation.metrics,
            });
        }

        unassigned.sort_by(|a, b| a.stop_id.cmp(&b.stop_id));

        let outcome = OptimizationOutcome {
            routes: planned,
            unassigned,
        };
        debug!(
            routes = outcome.routes.len(),
            assigned = outcome.assigned_stop_count(),
            unassigned = outcome.unassigned.len(),
            "optimization finished"
        );
        Ok(outcome)
    }

    fn map_indices<T, F>(&self, n: usize, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send,
    {
        if self.options.parallel {
            (0..n).into_par_iter().map(f).collect()
        } else {
            (0..n).map(f).collect()
        }
    }

    fn check_pair(&self, vehicle: &Vehicle, stop: &Stop) -> Result<PairCheck> {
        if !vehicle.handles(&stop.payload.nature) {
            return Ok(PairCheck::Nature);
        }
        if !vehicle.capacity.fits(stop.payload.weight, stop.payload.volume) {
            return Ok(PairCheck::Capacity);
        }
        let direct = self.calculator.evaluate(vehicle, vehicle.work_schedule.start_time, &[stop])?;
        if direct.is_feasible() {
            Ok(PairCheck::Feasible)
        } else {
            Ok(PairCheck::Window)
        }
    }

    fn evaluate(&self, vehicle: &Vehicle, sequence: &[usize], candidates: &[&Stop]) -> Result<RouteEvaluation> {
        let ordered: Vec<&Stop> = sequence.iter().map(|&s| candidates[s]).collect();
        self.calculator
            .evaluate_from(vehicle, geo::minutes_of_day(vehicle.work_schedule.start_time), &ordered)
    }

    fn route_cost(&self, vehicle: &Vehicle, evaluation: &RouteEvaluation) -> f64 {
        let rate = vehicle
            .cost_per_distance
            .unwrap_or(self.options.fallback_cost_per_distance);
        let metrics = &evaluation.metrics;
        (metrics.total_distance + metrics.total_travel_time) * rate + metrics.total_travel_time * self.options.cost_per_minute
    }

    /// Cheapest feasible position for stop `s` in vehicle `v`'s current route.
    fn best_insertion(
        &self,
        s: usize,
        v: usize,
        fleet: &[&Vehicle],
        candidates: &[&Stop],
        route: &RouteState,
    ) -> Result<Option<Insertion>> {
        let vehicle = fleet[v];
        let stop = candidates[s];

        let load_weight = route.evaluation.load_weight + stop.payload.weight;
        let load_volume = route.evaluation.load_volume + stop.payload.volume;
        if !vehicle.capacity.fits(load_weight, load_volume) {
            return Ok(None);
        }

        let base_cost = self.route_cost(vehicle, &route.evaluation);
        let mut best: Option<Insertion> = None;

        for position in 0..=route.stops.len() {
            let mut sequence = route.stops.clone();
            sequence.insert(position, s);

            let evaluation = self.evaluate(vehicle, &sequence, candidates)?;
            if !evaluation.is_feasible() {
                continue;
            }

            let cost = self.route_cost(vehicle, &evaluation) - base_cost;
            if best.as_ref().is_none_or(|current| cost < current.cost) {
                best = Some(Insertion {
                    stop: s,
                    vehicle: v,
                    position,
                    cost,
                    evaluation,
                });
            }
        }

        Ok(best)
    }

    /// First-improvement 2-opt on distance, keeping only feasible sequences.
    fn two_opt(&self, vehicle: &Vehicle, candidates: &[&Stop], route: &mut RouteState) -> Result<()> {
        let n = route.stops.len();
        if n < 3 {
            return Ok(());
        }

        for _ in 0..self.options.local_search_iterations {
            let mut improved = false;

            'search: for i in 0..n - 1 {
                for j in i + 1..n {
                    let mut sequence = route.stops.clone();
                    sequence[i..=j].reverse();

                    let evaluation = self.evaluate(vehicle, &sequence, candidates)?;
                    if evaluation.is_feasible()
                        && evaluation.metrics.total_distance + 1e-9 < route.evaluation.metrics.total_distance
                    {
                        route.stops = sequence;
                        route.evaluation = evaluation;
                        improved = true;
                        break 'search;
                    }
                }
            }

            if !improved {
                break;
            }
        }

        Ok(())
    }
}

/// Available vehicles, sorted by id, first occurrence of each id.
fn eligible_vehicles(vehicles: &[Vehicle]) -> Vec<&Vehicle> {
    let mut fleet: Vec<&Vehicle> = vehicles.iter().filter(|vehicle| vehicle.availability).collect();
    fleet.sort_by(|a, b| a.id.cmp(&b.id));
    fleet.dedup_by(|a, b| a.id == b.id);
    fleet
}

/// Pending stops sorted by id, and the rejects with their reason.
fn eligible_stops(stops: &[Stop]) -> (Vec<&Stop>, Vec<UnassignedStop>) {
    let mut sorted: Vec<&Stop> = stops.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut seen: HashSet<&StopId> = HashSet::new();
    let mut candidates = Vec::new();
    let mut rejected = Vec::new();

    for stop in sorted {
        if !seen.insert(&stop.id) {
            rejected.push(UnassignedStop {
                stop_id: stop.id.clone(),
                reason: UnassignedReason::DuplicateStop,
            });
        } else if stop.status != StopStatus::Pending {
            rejected.push(UnassignedStop {
                stop_id: stop.id.clone(),
                reason: UnassignedReason::NotPending,
            });
        } else {
            candidates.push(stop);
        }
    }

    (candidates, rejected)
}

/// Reports the furthest check any vehicle got to.
fn pair_failure_reason(row: &[PairCheck]) -> UnassignedReason {
    if row.contains(&PairCheck::Window) {
        UnassignedReason::NoFeasibleWindow
    } else if row.contains(&PairCheck::Capacity) {
        UnassignedReason::ExceedsCapacity
    } else {
        UnassignedReason::IncompatibleNature
    }
}

/// Cost first, then earliest window start, vehicle id, stop id and position.
fn compare_insertions(a: &Insertion, b: &Insertion, fleet: &[&Vehicle], candidates: &[&Stop]) -> Ordering {
    let window_key = |insertion: &Insertion| {
        let start = candidates[insertion.stop].earliest_window_start();
        (start.is_none(), start)
    };

    a.cost
        .total_cmp(&b.cost)
        .then_with(|| window_key(a).cmp(&window_key(b)))
        .then_with(|| fleet[a.vehicle].id.cmp(&fleet[b.vehicle].id))
        .then_with(|| candidates[a.stop].id.cmp(&candidates[b.stop].id))
        .then_with(|| a.position.cmp(&b.position))
}
