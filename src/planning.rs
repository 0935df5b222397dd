//! Planning use cases: generate, re-optimize, patch, track and report.
//!
//! Each operation reads through the repositories, computes synchronously and
//! then writes. Version races surface as `Conflict`; the caller re-reads and
//! retries, nothing is retried here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::calculation::RouteCalculator;
use crate::config::PlannerConfig;
use crate::error::{PlannerError, Result};
use crate::geo::Haversine;
use crate::model::{Route, RouteId, RoutePlan, RoutePlanId, Stop, StopId, StopStatus, VehicleId};
use crate::report::{EfficiencyReport, ReportGenerator};
use crate::solver::{PlannedRoute, RouteOptimizer, SolveOptions, UnassignedStop};
use crate::traits::{RoutePlanRepository, RouteRepository, StopRepository, VehicleRepository};

/// Soft problems surfaced next to a plan instead of failing the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PlanWarning {
    /// No available vehicles or no pending stops for the date.
    NothingToPlan { vehicles: usize, stops: usize },
    /// Some vehicles or stops referenced by the plan no longer exist.
    UnresolvedParticipants {
        vehicles: Vec<VehicleId>,
        stops: Vec<StopId>,
    },
    UnavailableVehicles { vehicles: Vec<VehicleId> },
    /// Stops already moved past pending, e.g. completed.
    StopsNoLongerPending { stops: Vec<StopId> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningOutcome {
    pub plan: RoutePlan,
    pub unassigned: Vec<UnassignedStop>,
    pub warnings: Vec<PlanWarning>,
}

impl PlanningOutcome {
    fn unchanged(plan: RoutePlan, warning: PlanWarning) -> Self {
        Self {
            plan,
            unassigned: Vec::new(),
            warnings: vec![warning],
        }
    }
}

pub struct PlanningService<V, S, R, P> {
    vehicles: V,
    stops: S,
    routes: R,
    plans: P,
    optimizer: RouteOptimizer<Haversine>,
    reports: ReportGenerator<Haversine>,
}

impl<V, S, R, P> PlanningService<V, S, R, P>
where
    V: VehicleRepository,
    S: StopRepository,
    R: RouteRepository,
    P: RoutePlanRepository,
{
    pub fn new(vehicles: V, stops: S, routes: R, plans: P, config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        let calculator = RouteCalculator::<Haversine>::default();
        Ok(Self {
            vehicles,
            stops,
            routes,
            plans,
            optimizer: RouteOptimizer::new(calculator.clone(), SolveOptions::from(&config)),
            reports: ReportGenerator::new(calculator, config.fallback_cost_per_distance),
        })
    }

    /// Plans every pending stop of `date` onto the available fleet and persists the plan.
    ///
    /// With nothing to plan the result is an empty plan, not an error.
    pub fn generate(&self, date: NaiveDate) -> Result<PlanningOutcome> {
        let vehicles = self.vehicles.find_available_vehicles()?;
        let stops = self.stops.find_pending_stops_by_date(date)?;

        let mut warnings = Vec::new();
        if vehicles.is_empty() || stops.is_empty() {
            warn!(%date, vehicles = vehicles.len(), stops = stops.len(), "no available vehicles or pending stops");
            warnings.push(PlanWarning::NothingToPlan {
                vehicles: vehicles.len(),
                stops: stops.len(),
            });
        }

        let outcome = self.optimizer.optimize(&vehicles, &stops)?;
        let routes = materialize_routes(date, outcome.routes);
        let plan = self
            .plans
            .insert(RoutePlan::new(RoutePlanId::generate(), date, routes))?;

        info!(
            plan_id = %plan.id,
            %date,
            routes = plan.routes.len(),
            unassigned = outcome.unassigned.len(),
            "route plan generated"
        );

        Ok(PlanningOutcome {
            plan,
            unassigned: outcome.unassigned,
            warnings,
        })
    }

    /// Re-runs the optimizer over exactly the vehicles and stops the plan
    /// already references.
    ///
    /// When any participant no longer resolves or is no longer eligible, the
    /// plan is returned unchanged with a warning.
    pub fn optimize(&self, plan_id: &RoutePlanId) -> Result<PlanningOutcome> {
        let mut plan = self.get_plan(plan_id)?;

        let vehicle_ids = plan.vehicle_ids();
        let mut stop_ids: Vec<StopId> = Vec::new();
        for id in plan.stop_ids() {
            if !stop_ids.contains(id) {
                stop_ids.push(id.clone());
            }
        }

        if vehicle_ids.is_empty() || stop_ids.is_empty() {
            warn!(plan_id = %plan.id, "plan has no vehicles or stops to optimize");
            let warning = PlanWarning::NothingToPlan {
                vehicles: vehicle_ids.len(),
                stops: stop_ids.len(),
            };
            return Ok(PlanningOutcome::unchanged(plan, warning));
        }

        let vehicles = self.vehicles.find_by_ids(&vehicle_ids)?;
        let stops = self.stops.find_by_ids(&stop_ids)?;

        let missing_vehicles: Vec<VehicleId> = vehicle_ids
            .iter()
            .filter(|id| !vehicles.iter().any(|vehicle| &vehicle.id == *id))
            .cloned()
            .collect();
        let missing_stops: Vec<StopId> = stop_ids
            .iter()
            .filter(|id| !stops.iter().any(|stop| &stop.id == *id))
            .cloned()
            .collect();
        if !missing_vehicles.is_empty() || !missing_stops.is_empty() {
            warn!(
                plan_id = %plan.id,
                missing_vehicles = missing_vehicles.len(),
                missing_stops = missing_stops.len(),
                "plan references records that no longer resolve, leaving it unchanged"
            );
            let warning = PlanWarning::UnresolvedParticipants {
                vehicles: missing_vehicles,
                stops: missing_stops,
            };
            return Ok(PlanningOutcome::unchanged(plan, warning));
        }

        let unavailable: Vec<VehicleId> = vehicles
            .iter()
            .filter(|vehicle| !vehicle.availability)
            .map(|vehicle| vehicle.id.clone())
            .collect();
        if !unavailable.is_empty() {
            warn!(plan_id = %plan.id, vehicles = unavailable.len(), "plan uses unavailable vehicles, leaving it unchanged");
            return Ok(PlanningOutcome::unchanged(
                plan,
                PlanWarning::UnavailableVehicles { vehicles: unavailable },
            ));
        }

        let settled: Vec<StopId> = stops
            .iter()
            .filter(|stop| stop.status != StopStatus::Pending)
            .map(|stop| stop.id.clone())
            .collect();
        if !settled.is_empty() {
            warn!(plan_id = %plan.id, stops = settled.len(), "plan holds stops that are no longer pending, leaving it unchanged");
            return Ok(PlanningOutcome::unchanged(
                plan,
                PlanWarning::StopsNoLongerPending { stops: settled },
            ));
        }

        let outcome = self.optimizer.optimize(&vehicles, &stops)?;
        plan.routes = materialize_routes(plan.planning_date, outcome.routes);
        let plan = self.plans.update(plan)?;

        info!(
            plan_id = %plan.id,
            routes = plan.routes.len(),
            unassigned = outcome.unassigned.len(),
            "route plan re-optimized"
        );

        Ok(PlanningOutcome {
            plan,
            unassigned: outcome.unassigned,
            warnings: Vec::new(),
        })
    }

    pub fn get_plan(&self, plan_id: &RoutePlanId) -> Result<RoutePlan> {
        self.plans
            .find_by_id(plan_id)?
            .ok_or_else(|| PlannerError::not_found("RoutePlan", plan_id))
    }

    /// Inserts a stop into the vehicle's route at `position` (clamped to the
    /// route length), refreshes the route metrics and persists the route.
    ///
    /// The caller owns the decision: an insertion that breaks a time window
    /// or the capacity is stored anyway and logged.
    pub fn assign_stop_manually(&self, stop_id: &StopId, vehicle_id: &VehicleId, position: usize) -> Result<Route> {
        let stop = self
            .stops
            .find_by_id(stop_id)?
            .ok_or_else(|| PlannerError::not_found("Stop", stop_id))?;
        let mut route = self
            .routes
            .find_by_vehicle_id(vehicle_id)?
            .ok_or_else(|| PlannerError::not_found("Route for vehicle", vehicle_id))?;

        if stop.status.is_terminal() {
            return Err(PlannerError::invalid(format!(
                "stop {} is {} and cannot be routed",
                stop.id, stop.status
            )));
        }
        if let Some(holder) = self.routes.find_by_stop_id(stop_id)? {
            return Err(PlannerError::invalid(format!(
                "stop {} is already on route {}",
                stop_id, holder.id
            )));
        }

        let vehicle = self
            .vehicles
            .find_by_ids(std::slice::from_ref(vehicle_id))?
            .into_iter()
            .next()
            .ok_or_else(|| PlannerError::not_found("Vehicle", vehicle_id))?;

        let index = route.insert_stop(stop_id.clone(), position);
        let stops = self.stops.find_by_ids(&route.ordered_stops)?;
        let evaluation = self.optimizer.calculator().refresh(&mut route, &vehicle, &stops)?;
        if let Err(error) = evaluation.ensure_feasible() {
            warn!(
                route_id = %route.id,
                %stop_id,
                %error,
                late = evaluation.late_stops.len(),
                overloaded = evaluation.overloaded,
                "manual assignment breaks the route schedule"
            );
        }

        let route = self.routes.update(route)?;
        info!(route_id = %route.id, %stop_id, position = index, "stop assigned manually");
        Ok(route)
    }

    /// Applies a lifecycle transition. Completed and canceled stops are final.
    pub fn update_stop_status(&self, stop_id: &StopId, status: StopStatus) -> Result<Stop> {
        let mut stop = self
            .stops
            .find_by_id(stop_id)?
            .ok_or_else(|| PlannerError::not_found("Stop", stop_id))?;

        let previous = stop.status;
        stop.status = previous.transition_to(status)?;
        let stop = self.stops.update(stop)?;

        info!(%stop_id, from = %previous, to = %stop.status, "stop status updated");
        Ok(stop)
    }

    pub fn generate_report(&self, plan_id: &RoutePlanId) -> Result<EfficiencyReport> {
        let plan = self.get_plan(plan_id)?;

        let stop_ids: Vec<StopId> = plan.stop_ids().cloned().collect();
        let vehicles = self.vehicles.find_by_ids(&plan.vehicle_ids())?;
        let stops = self.stops.find_by_ids(&stop_ids)?;

        Ok(self.reports.generate(&plan, &vehicles, &stops))
    }
}

fn materialize_routes(date: NaiveDate, planned: Vec<PlannedRoute>) -> Vec<Route> {
    planned
        .into_iter()
        .map(|planned| Route {
            id: RouteId::generate(),
            assigned_vehicle_id: planned.vehicle_id,
            ordered_stops: planned.ordered_stops,
            total_distance: planned.metrics.total_distance,
            total_travel_time: planned.metrics.total_travel_time,
            estimated_start_time: date.and_time(planned.departure),
            version: 0,
        })
        .collect()
}
