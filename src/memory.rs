//! Volatile repository backend.
//!
//! One lock guards all tables so each call is atomic. Plans keep only the ids
//! of their routes; routes live in their own table and are resolved on read,
//! which keeps routes and plans independently updatable the same way a
//! relational backend would.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;

use crate::error::{PlannerError, Result};
use crate::model::{Route, RouteId, RoutePlan, RoutePlanId, Stop, StopId, StopStatus, Vehicle, VehicleId};
use crate::traits::{RoutePlanRepository, RouteRepository, StopRepository, VehicleRepository};

#[derive(Debug)]
struct StoredRoute {
    route: Route,
    /// Creation order, used to pick a vehicle's latest route.
    seq: u64,
}

#[derive(Debug)]
struct StoredPlan {
    planning_date: NaiveDate,
    route_ids: Vec<RouteId>,
    version: u64,
}

#[derive(Debug, Default)]
struct Tables {
    vehicles: BTreeMap<VehicleId, Vehicle>,
    stops: BTreeMap<StopId, Stop>,
    routes: BTreeMap<RouteId, StoredRoute>,
    plans: BTreeMap<RoutePlanId, StoredPlan>,
    next_seq: u64,
}

impl Tables {
    fn insert_route(&mut self, route: Route) -> Result<Route> {
        if self.routes.contains_key(&route.id) {
            return Err(PlannerError::conflict("Route", &route.id));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.routes.insert(
            route.id.clone(),
            StoredRoute {
                route: route.clone(),
                seq,
            },
        );
        Ok(route)
    }

    fn check_route_version(&self, route: &Route) -> Result<()> {
        match self.routes.get(&route.id) {
            None => Err(PlannerError::not_found("Route", &route.id)),
            Some(stored) if stored.route.version != route.version => Err(PlannerError::conflict("Route", &route.id)),
            Some(_) => Ok(()),
        }
    }

    fn assemble_plan(&self, id: &RoutePlanId, stored: &StoredPlan) -> RoutePlan {
        let routes = stored
            .route_ids
            .iter()
            .filter_map(|route_id| self.routes.get(route_id))
            .map(|stored| stored.route.clone())
            .collect();
        RoutePlan {
            id: id.clone(),
            routes,
            planning_date: stored.planning_date,
            version: stored.version,
        }
    }
}

/// In-memory implementation of every repository trait. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a vehicle.
    pub fn put_vehicle(&self, vehicle: Vehicle) {
        self.tables.write().vehicles.insert(vehicle.id.clone(), vehicle);
    }

    /// Adds or replaces a stop.
    pub fn put_stop(&self, stop: Stop) {
        self.tables.write().stops.insert(stop.id.clone(), stop);
    }

    pub fn route(&self, id: &RouteId) -> Option<Route> {
        self.tables.read().routes.get(id).map(|stored| stored.route.clone())
    }
}

impl VehicleRepository for InMemoryStore {
    fn find_available_vehicles(&self) -> Result<Vec<Vehicle>> {
        Ok(self
            .tables
            .read()
            .vehicles
            .values()
            .filter(|vehicle| vehicle.availability)
            .cloned()
            .collect())
    }

    fn find_by_ids(&self, ids: &[VehicleId]) -> Result<Vec<Vehicle>> {
        let tables = self.tables.read();
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| tables.vehicles.get(id).cloned())
            .collect())
    }
}

impl StopRepository for InMemoryStore {
    fn find_pending_stops_by_date(&self, date: NaiveDate) -> Result<Vec<Stop>> {
        Ok(self
            .tables
            .read()
            .stops
            .values()
            .filter(|stop| stop.status == StopStatus::Pending && stop.planning_date == date)
            .cloned()
            .collect())
    }

    fn find_by_ids(&self, ids: &[StopId]) -> Result<Vec<Stop>> {
        let tables = self.tables.read();
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| tables.stops.get(id).cloned())
            .collect())
    }

    fn find_by_id(&self, id: &StopId) -> Result<Option<Stop>> {
        Ok(self.tables.read().stops.get(id).cloned())
    }

    fn update(&self, stop: Stop) -> Result<Stop> {
        let mut tables = self.tables.write();
        match tables.stops.get_mut(&stop.id) {
            Some(stored) => {
                *stored = stop.clone();
                Ok(stop)
            }
            None => Err(PlannerError::not_found("Stop", &stop.id)),
        }
    }
}

impl RouteRepository for InMemoryStore {
    fn find_by_vehicle_id(&self, vehicle_id: &VehicleId) -> Result<Option<Route>> {
        Ok(self
            .tables
            .read()
            .routes
            .values()
            .filter(|stored| &stored.route.assigned_vehicle_id == vehicle_id)
            .max_by_key(|stored| stored.seq)
            .map(|stored| stored.route.clone()))
    }

    fn find_by_stop_id(&self, stop_id: &StopId) -> Result<Option<Route>> {
        Ok(self
            .tables
            .read()
            .routes
            .values()
            .filter(|stored| stored.route.contains_stop(stop_id))
            .max_by_key(|stored| stored.seq)
            .map(|stored| stored.route.clone()))
    }

    fn insert(&self, route: Route) -> Result<Route> {
        self.tables.write().insert_route(route)
    }

    fn update(&self, mut route: Route) -> Result<Route> {
        let mut tables = self.tables.write();
        tables.check_route_version(&route)?;
        route.version += 1;
        if let Some(stored) = tables.routes.get_mut(&route.id) {
            stored.route = route.clone();
        }
        // A plan read before this write must not replace the route.
        for plan in tables.plans.values_mut() {
            if plan.route_ids.contains(&route.id) {
                plan.version += 1;
            }
        }
        Ok(route)
    }
}

impl RoutePlanRepository for InMemoryStore {
    fn find_by_id(&self, id: &RoutePlanId) -> Result<Option<RoutePlan>> {
        let tables = self.tables.read();
        Ok(tables.plans.get(id).map(|stored| tables.assemble_plan(id, stored)))
    }

    fn insert(&self, plan: RoutePlan) -> Result<RoutePlan> {
        let mut tables = self.tables.write();
        if tables.plans.contains_key(&plan.id) {
            return Err(PlannerError::conflict("RoutePlan", &plan.id));
        }
        if let Some(route) = plan.routes.iter().find(|route| tables.routes.contains_key(&route.id)) {
            return Err(PlannerError::conflict("Route", &route.id));
        }

        let route_ids = plan.routes.iter().map(|route| route.id.clone()).collect();
        for route in plan.routes.iter().cloned() {
            tables.insert_route(route)?;
        }
        tables.plans.insert(
            plan.id.clone(),
            StoredPlan {
                planning_date: plan.planning_date,
                route_ids,
                version: plan.version,
            },
        );
        Ok(plan)
    }

    fn update(&self, plan: RoutePlan) -> Result<RoutePlan> {
        let mut tables = self.tables.write();
        let stored = tables
            .plans
            .get(&plan.id)
            .ok_or_else(|| PlannerError::not_found("RoutePlan", &plan.id))?;
        if stored.version != plan.version {
            return Err(PlannerError::conflict("RoutePlan", &plan.id));
        }
        let previous: Vec<RouteId> = stored.route_ids.clone();

        for route in &plan.routes {
            if tables.routes.contains_key(&route.id) {
                tables.check_route_version(route)?;
            }
        }

        let keep: HashSet<&RouteId> = plan.routes.iter().map(|route| &route.id).collect();
        for dropped in previous.iter().filter(|id| !keep.contains(id)) {
            tables.routes.remove(dropped);
        }

        for route in &plan.routes {
            match tables.routes.get_mut(&route.id) {
                Some(stored) => {
                    let mut next = route.clone();
                    next.version += 1;
                    stored.route = next;
                }
                None => {
                    tables.insert_route(route.clone())?;
                }
            }
        }

        let next = StoredPlan {
            planning_date: plan.planning_date,
            route_ids: plan.routes.iter().map(|route| route.id.clone()).collect(),
            version: plan.version + 1,
        };
        tables.plans.insert(plan.id.clone(), next);

        let stored = &tables.plans[&plan.id];
        Ok(tables.assemble_plan(&plan.id, stored))
    }
}
