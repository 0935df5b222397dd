//! Repository contracts the planning use cases depend on.
//!
//! Backends are picked once at startup and handed to
//! [`PlanningService`](crate::planning::PlanningService) as type parameters.
//! Collection lookups return an empty `Vec` when nothing matches; single
//! lookups return `None`. Every `update` fails with `NotFound` when the id is
//! unknown and with `Conflict` when the stored version moved on since the
//! record was read.

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{Route, RoutePlan, RoutePlanId, Stop, StopId, Vehicle, VehicleId};

pub trait VehicleRepository: Send + Sync {
    fn find_available_vehicles(&self) -> Result<Vec<Vehicle>>;

    fn find_by_ids(&self, ids: &[VehicleId]) -> Result<Vec<Vehicle>>;
}

pub trait StopRepository: Send + Sync {
    fn find_pending_stops_by_date(&self, date: NaiveDate) -> Result<Vec<Stop>>;

    fn find_by_ids(&self, ids: &[StopId]) -> Result<Vec<Stop>>;

    fn find_by_id(&self, id: &StopId) -> Result<Option<Stop>>;

    fn update(&self, stop: Stop) -> Result<Stop>;
}

pub trait RouteRepository: Send + Sync {
    /// Most recently created route for the vehicle.
    fn find_by_vehicle_id(&self, vehicle_id: &VehicleId) -> Result<Option<Route>>;

    /// Route currently holding the stop, if any.
    fn find_by_stop_id(&self, stop_id: &StopId) -> Result<Option<Route>>;

    fn insert(&self, route: Route) -> Result<Route>;

    /// Stores `route` if its version matches, returning it with the bumped version.
    /// The version of every plan holding the route is bumped as well.
    fn update(&self, route: Route) -> Result<Route>;
}

pub trait RoutePlanRepository: Send + Sync {
    fn find_by_id(&self, id: &RoutePlanId) -> Result<Option<RoutePlan>>;

    /// Persists a new plan together with its routes.
    fn insert(&self, plan: RoutePlan) -> Result<RoutePlan>;

    /// Replaces the plan and its route set if the plan version matches.
    fn update(&self, plan: RoutePlan) -> Result<RoutePlan>;
}
