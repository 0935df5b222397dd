//! Efficiency report over a persisted route plan.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::calculation::RouteCalculator;
use crate::geo::{DistanceEstimator, Haversine};
use crate::model::{RoutePlan, RoutePlanId, Stop, Vehicle, VehicleId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyReport {
    pub route_plan_id: RoutePlanId,
    pub planning_date: NaiveDate,
    pub total_routes: usize,
    pub total_stops: usize,
    pub total_distance: f64,
    pub total_cost: f64,
    /// 0 to 100.
    pub on_time_delivery_percentage: f64,
    pub cost_per_distance_unit: f64,
}

pub struct ReportGenerator<D = Haversine> {
    calculator: RouteCalculator<D>,
    fallback_cost_per_distance: f64,
}

impl<D: DistanceEstimator> ReportGenerator<D> {
    pub fn new(calculator: RouteCalculator<D>, fallback_cost_per_distance: f64) -> Self {
        Self {
            calculator,
            fallback_cost_per_distance,
        }
    }

    /// Aggregates the plan. `vehicles` and `stops` are the records the plan's
    /// routes reference; anything missing counts as not on time and is costed
    /// at the flat rate.
    pub fn generate(&self, plan: &RoutePlan, vehicles: &[Vehicle], stops: &[Stop]) -> EfficiencyReport {
        let vehicles: HashMap<&VehicleId, &Vehicle> = vehicles.iter().map(|vehicle| (&vehicle.id, vehicle)).collect();

        let mut total_stops = 0;
        let mut total_distance = 0.0;
        let mut total_cost = 0.0;
        let mut on_time = 0;

        for route in &plan.routes {
            total_stops += route.ordered_stops.len();
            total_distance += route.total_distance;

            let vehicle = vehicles.get(&route.assigned_vehicle_id).copied();
            let rate = match vehicle.and_then(|vehicle| vehicle.cost_per_distance) {
                Some(rate) => rate,
                None => {
                    warn!(route_id = %route.id, "no vehicle cost data, using flat rate");
                    self.fallback_cost_per_distance
                }
            };
            total_cost += route.total_distance * rate;

            let Some(vehicle) = vehicle else {
                warn!(route_id = %route.id, vehicle_id = %route.assigned_vehicle_id, "vehicle missing, stops counted late");
                continue;
            };
            match self.calculator.recalculate(route, vehicle, stops) {
                Ok(evaluation) => on_time += evaluation.on_time_count(),
                Err(error) => warn!(route_id = %route.id, %error, "route could not be projected, stops counted late"),
            }
        }

        let on_time_delivery_percentage = if total_stops == 0 {
            0.0
        } else {
            on_time as f64 / total_stops as f64 * 100.0
        };
        let cost_per_distance_unit = if total_distance > 0.0 {
            total_cost / total_distance
        } else {
            0.0
        };

        EfficiencyReport {
            route_plan_id: plan.id.clone(),
            planning_date: plan.planning_date,
            total_routes: plan.routes.len(),
            total_stops,
            total_distance,
            total_cost,
            on_time_delivery_percentage,
            cost_per_distance_unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plan_has_zero_ratios() {
        let plan = RoutePlan::new(
            RoutePlanId::new("p1"),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            Vec::new(),
        );
        let report = ReportGenerator::new(RouteCalculator::<Haversine>::default(), 1.5).generate(&plan, &[], &[]);

        assert_eq!(report.total_routes, 0);
        assert_eq!(report.total_stops, 0);
        assert_eq!(report.on_time_delivery_percentage, 0.0);
        assert_eq!(report.cost_per_distance_unit, 0.0);
    }
}
