//! Route metrics: distance, travel time and schedule feasibility.
//!
//! A route is walked in order from the vehicle's origin. Each leg adds its
//! distance and driving time; each stop adds its service time. Early arrivals
//! wait for the next window (waiting is not counted as travel time). A stop
//! reached after all of its windows closed is served on arrival and reported
//! as late, never silently accepted.

use std::collections::HashMap;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};
use crate::geo::{self, DistanceEstimator, Haversine};
use crate::model::{Route, Stop, StopId, Vehicle};
use crate::solver::UnassignedReason;

/// Derived totals stored on a route.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetrics {
    /// Kilometers.
    pub total_distance: f64,
    /// Minutes of driving plus service.
    pub total_travel_time: f64,
}

/// Projected timing of a single visit, in minutes since midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitTiming {
    pub stop_id: StopId,
    pub arrival: f64,
    pub service_start: f64,
    pub departure: f64,
    /// Service begins inside one of the stop's windows.
    pub on_time: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEvaluation {
    pub metrics: RouteMetrics,
    pub visits: Vec<VisitTiming>,
    pub load_weight: f64,
    pub load_volume: f64,
    pub overloaded: bool,
    /// Stops whose service cannot begin inside any window.
    pub late_stops: Vec<StopId>,
    /// Stops whose service would begin after the vehicle's work schedule ends.
    pub outside_schedule: Vec<StopId>,
}

impl RouteEvaluation {
    pub fn is_feasible(&self) -> bool {
        !self.overloaded && self.late_stops.is_empty() && self.outside_schedule.is_empty()
    }

    pub fn on_time_count(&self) -> usize {
        self.visits.iter().filter(|visit| visit.on_time).count()
    }

    /// Turns the first violation into an `Infeasible` error.
    pub fn ensure_feasible(&self) -> Result<()> {
        if let Some(stop_id) = self.late_stops.first().or(self.outside_schedule.first()) {
            return Err(PlannerError::Infeasible {
                stop_id: stop_id.clone(),
                reason: UnassignedReason::NoFeasibleWindow,
            });
        }
        if self.overloaded {
            if let Some(last) = self.visits.last() {
                return Err(PlannerError::Infeasible {
                    stop_id: last.stop_id.clone(),
                    reason: UnassignedReason::ExceedsCapacity,
                });
            }
        }
        Ok(())
    }
}

/// Recomputes route metrics. Stateless apart from its distance estimator.
#[derive(Debug, Clone, Default)]
pub struct RouteCalculator<D = Haversine> {
    estimator: D,
}

impl<D: DistanceEstimator> RouteCalculator<D> {
    pub fn new(estimator: D) -> Self {
        Self { estimator }
    }

    /// Walks `stops` in order, departing the vehicle's origin at `departure`.
    pub fn evaluate(&self, vehicle: &Vehicle, departure: NaiveTime, stops: &[&Stop]) -> Result<RouteEvaluation> {
        self.evaluate_from(vehicle, geo::minutes_of_day(departure), stops)
    }

    pub(crate) fn evaluate_from(&self, vehicle: &Vehicle, departure: f64, stops: &[&Stop]) -> Result<RouteEvaluation> {
        let schedule_end = geo::minutes_of_day(vehicle.work_schedule.end_time);

        let mut metrics = RouteMetrics::default();
        let mut visits = Vec::with_capacity(stops.len());
        let mut late_stops = Vec::new();
        let mut outside_schedule = Vec::new();
        let mut load_weight = 0.0;
        let mut load_volume = 0.0;

        let mut clock = departure;
        let mut position = vehicle.origin();

        for stop in stops {
            let distance = self.estimator.distance_km(position, stop.coordinates)?;
            let driving = geo::estimate_travel_time(distance, vehicle)?;
            metrics.total_distance += distance;
            metrics.total_travel_time += driving + stop.estimated_service_time;

            let arrival = clock + driving;
            let (service_start, on_time) = match geo::earliest_service_start(&stop.time_windows, arrival) {
                Some(start) => (start, true),
                None => {
                    late_stops.push(stop.id.clone());
                    (arrival, false)
                }
            };
            if service_start > schedule_end {
                outside_schedule.push(stop.id.clone());
            }

            let departure = service_start + stop.estimated_service_time;
            visits.push(VisitTiming {
                stop_id: stop.id.clone(),
                arrival,
                service_start,
                departure,
                on_time,
            });

            load_weight += stop.payload.weight;
            load_volume += stop.payload.volume;
            clock = departure;
            position = stop.coordinates;
        }

        Ok(RouteEvaluation {
            metrics,
            visits,
            load_weight,
            load_volume,
            overloaded: !vehicle.capacity.fits(load_weight, load_volume),
            late_stops,
            outside_schedule,
        })
    }

    /// Resolves the route's stop ids against `stops` and evaluates them from
    /// the route's estimated start time.
    ///
    /// Calling this twice on the same route state yields identical results.
    pub fn recalculate(&self, route: &Route, vehicle: &Vehicle, stops: &[Stop]) -> Result<RouteEvaluation> {
        if route.assigned_vehicle_id != vehicle.id {
            return Err(PlannerError::invalid(format!(
                "route {} is assigned to vehicle {}, not {}",
                route.id, route.assigned_vehicle_id, vehicle.id
            )));
        }

        let by_id: HashMap<&StopId, &Stop> = stops.iter().map(|stop| (&stop.id, stop)).collect();
        let ordered = route
            .ordered_stops
            .iter()
            .map(|id| {
                by_id
                    .get(id)
                    .copied()
                    .ok_or_else(|| PlannerError::not_found("Stop", id))
            })
            .collect::<Result<Vec<_>>>()?;

        let start = route.estimated_start_time.time();
        let departure = start.with_nanosecond(0).unwrap_or(start);
        self.evaluate(vehicle, departure, &ordered)
    }

    /// Recalculates and writes the fresh metrics back onto `route`.
    pub fn refresh(&self, route: &mut Route, vehicle: &Vehicle, stops: &[Stop]) -> Result<RouteEvaluation> {
        let evaluation = self.recalculate(route, vehicle, stops)?;
        route.total_distance = evaluation.metrics.total_distance;
        route.total_travel_time = evaluation.metrics.total_travel_time;
        Ok(evaluation)
    }
}
