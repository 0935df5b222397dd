//! Use case tests against the in-memory store.

mod fixtures;

use route_planner::config::PlannerConfig;
use route_planner::memory::InMemoryStore;
use route_planner::model::{
    Route, RouteId, RoutePlan, RoutePlanId, StopId, StopStatus, VehicleId,
};
use route_planner::planning::{PlanWarning, PlanningService};
use route_planner::solver::UnassignedReason;
use route_planner::traits::{RoutePlanRepository, RouteRepository, StopRepository};
use route_planner::PlannerError;

use fixtures::*;

type Service = PlanningService<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;

fn service(store: &InMemoryStore) -> Service {
    PlanningService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        PlannerConfig::default(),
    )
    .unwrap()
}

/// Two vans and three pending stops on the planning date, plus noise that
/// must stay out of the plan.
fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.put_vehicle(TestVehicle::new("van-1").build());
    store.put_vehicle(TestVehicle::new("van-2").capacity(1500.0, 100.0).build());
    store.put_vehicle(TestVehicle::new("van-3").unavailable().build());

    store.put_stop(TestStop::new("s1").at_point(&DELIVERY_POINTS[0]).weight(50.0).window((9, 0), (10, 0)).build());
    store.put_stop(TestStop::new("s2").at_point(&DELIVERY_POINTS[3]).weight(75.0).window((11, 0), (12, 0)).build());
    store.put_stop(TestStop::new("s3").at_point(&DELIVERY_POINTS[15]).weight(25.0).window((14, 0), (15, 0)).build());

    let tomorrow = planning_date().succ_opt().unwrap();
    store.put_stop(TestStop::new("tomorrow").on(tomorrow).build());
    store.put_stop(TestStop::new("delivered").status(StopStatus::Completed).build());
    store
}

/// One van with two stops, so manual edits have a known route to work on.
fn single_route_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.put_vehicle(TestVehicle::new("van-1").build());
    store.put_stop(TestStop::new("s1").at_point(&DELIVERY_POINTS[0]).build());
    store.put_stop(TestStop::new("s2").at_point(&DELIVERY_POINTS[3]).build());

    let later = planning_date().succ_opt().unwrap();
    store.put_stop(TestStop::new("extra").at_point(&DELIVERY_POINTS[10]).on(later).build());
    store
}

fn plan_stop_ids(plan: &RoutePlan) -> Vec<String> {
    let mut ids: Vec<String> = plan.stop_ids().map(|id| id.to_string()).collect();
    ids.sort();
    ids
}

// ============================================================================
// Generate
// ============================================================================

#[test]
fn test_generate_plans_pending_stops_for_date() {
    let store = seeded_store();
    let service = service(&store);

    let outcome = service.generate(planning_date()).unwrap();

    assert!(outcome.unassigned.is_empty());
    assert!(outcome.warnings.is_empty());
    assert_eq!(plan_stop_ids(&outcome.plan), vec!["s1", "s2", "s3"]);
    assert!(outcome.plan.routes.iter().all(|route| route.assigned_vehicle_id.as_str() != "van-3"));

    let stored = service.get_plan(&outcome.plan.id).unwrap();
    assert_eq!(stored, outcome.plan);

    for route in &outcome.plan.routes {
        let by_vehicle = store.find_by_vehicle_id(&route.assigned_vehicle_id).unwrap().unwrap();
        assert_eq!(&by_vehicle, route);
        assert_eq!(by_vehicle.estimated_start_time, planning_date().and_time(at(8, 0)));
    }
}

#[test]
fn test_generate_without_vehicles_is_empty_plan() {
    let store = InMemoryStore::new();
    store.put_stop(TestStop::new("s1").build());
    let service = service(&store);

    let outcome = service.generate(planning_date()).unwrap();

    assert!(outcome.plan.routes.is_empty());
    assert_eq!(outcome.warnings, vec![PlanWarning::NothingToPlan { vehicles: 0, stops: 1 }]);
    assert_eq!(outcome.unassigned.len(), 1);
    assert_eq!(outcome.unassigned[0].reason, UnassignedReason::NoAvailableVehicle);
    assert!(service.get_plan(&outcome.plan.id).is_ok());
}

#[test]
fn test_generate_without_stops_is_empty_plan() {
    let store = InMemoryStore::new();
    store.put_vehicle(TestVehicle::new("van-1").build());
    let service = service(&store);

    let outcome = service.generate(planning_date()).unwrap();

    assert!(outcome.plan.routes.is_empty());
    assert!(outcome.unassigned.is_empty());
    assert_eq!(outcome.warnings, vec![PlanWarning::NothingToPlan { vehicles: 1, stops: 0 }]);
}

// ============================================================================
// Re-optimize
// ============================================================================

#[test]
fn test_optimize_replaces_routes_over_same_participants() {
    let store = seeded_store();
    let service = service(&store);
    let generated = service.generate(planning_date()).unwrap().plan;

    let outcome = service.optimize(&generated.id).unwrap();

    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.plan.version, generated.version + 1);
    assert_eq!(plan_stop_ids(&outcome.plan), plan_stop_ids(&generated));
    assert_eq!(service.get_plan(&generated.id).unwrap(), outcome.plan);
}

#[test]
fn test_optimize_unknown_plan_is_not_found() {
    let service = service(&InMemoryStore::new());
    let result = service.optimize(&RoutePlanId::new("missing"));
    assert!(matches!(result, Err(PlannerError::NotFound { .. })));
}

#[test]
fn test_optimize_leaves_plan_when_stop_settled() {
    let store = seeded_store();
    let service = service(&store);
    let generated = service.generate(planning_date()).unwrap().plan;

    service.update_stop_status(&StopId::new("s2"), StopStatus::Completed).unwrap();
    let outcome = service.optimize(&generated.id).unwrap();

    assert_eq!(outcome.plan, generated);
    assert_eq!(
        outcome.warnings,
        vec![PlanWarning::StopsNoLongerPending { stops: vec![StopId::new("s2")] }]
    );
}

#[test]
fn test_optimize_leaves_plan_when_vehicle_unavailable() {
    let store = single_route_store();
    let service = service(&store);
    let generated = service.generate(planning_date()).unwrap().plan;

    store.put_vehicle(TestVehicle::new("van-1").unavailable().build());
    let outcome = service.optimize(&generated.id).unwrap();

    assert_eq!(outcome.plan, generated);
    assert!(matches!(outcome.warnings[0], PlanWarning::UnavailableVehicles { .. }));
}

#[test]
fn test_optimize_does_not_invent_participants() {
    let store = InMemoryStore::new();
    store.put_stop(TestStop::new("s1").build());
    let start = planning_date().and_time(at(8, 0));
    let mut ghost_route = Route::new(RouteId::new("r-ghost"), VehicleId::new("ghost"), start);
    ghost_route.ordered_stops = vec![StopId::new("s1"), StopId::new("vanished")];
    let plan = RoutePlan::new(RoutePlanId::new("p1"), planning_date(), vec![ghost_route]);
    RoutePlanRepository::insert(&store, plan.clone()).unwrap();

    let outcome = service(&store).optimize(&plan.id).unwrap();

    assert_eq!(outcome.plan, plan);
    assert_eq!(
        outcome.warnings,
        vec![PlanWarning::UnresolvedParticipants {
            vehicles: vec![VehicleId::new("ghost")],
            stops: vec![StopId::new("vanished")],
        }]
    );
}

// ============================================================================
// Manual Assignment
// ============================================================================

#[test]
fn test_manual_insert_at_front() {
    let store = single_route_store();
    let service = service(&store);
    service.generate(planning_date()).unwrap();
    let before = store.find_by_vehicle_id(&VehicleId::new("van-1")).unwrap().unwrap();
    assert_eq!(before.ordered_stops.len(), 2);

    let after = service
        .assign_stop_manually(&StopId::new("extra"), &VehicleId::new("van-1"), 0)
        .unwrap();

    assert_eq!(after.ordered_stops.len(), 3);
    assert_eq!(after.ordered_stops[0], StopId::new("extra"));
    assert_eq!(&after.ordered_stops[1..], &before.ordered_stops[..]);
    assert!(after.total_distance >= before.total_distance);
    assert!(after.total_travel_time > before.total_travel_time);
    assert_eq!(after.version, before.version + 1);
}

#[test]
fn test_manual_insert_clamps_position() {
    let store = single_route_store();
    let service = service(&store);
    let plan = service.generate(planning_date()).unwrap().plan;

    let route = service
        .assign_stop_manually(&StopId::new("extra"), &VehicleId::new("van-1"), 42)
        .unwrap();

    assert_eq!(route.ordered_stops.last(), Some(&StopId::new("extra")));
    let reloaded = service.get_plan(&plan.id).unwrap();
    assert_eq!(reloaded.routes[0], route);
}

#[test]
fn test_manual_insert_missing_records() {
    let store = single_route_store();
    let service = service(&store);
    service.generate(planning_date()).unwrap();

    let missing_stop = service.assign_stop_manually(&StopId::new("nope"), &VehicleId::new("van-1"), 0);
    assert!(matches!(missing_stop, Err(PlannerError::NotFound { .. })));

    let missing_route = service.assign_stop_manually(&StopId::new("extra"), &VehicleId::new("van-9"), 0);
    assert!(matches!(missing_route, Err(PlannerError::NotFound { .. })));
}

#[test]
fn test_manual_insert_rejects_double_assignment() {
    let store = single_route_store();
    let service = service(&store);
    service.generate(planning_date()).unwrap();

    let result = service.assign_stop_manually(&StopId::new("s1"), &VehicleId::new("van-1"), 0);
    assert!(matches!(result, Err(PlannerError::InvalidInput(_))));
}

#[test]
fn test_manual_insert_rejects_settled_stop() {
    let store = single_route_store();
    let service = service(&store);
    service.generate(planning_date()).unwrap();
    service.update_stop_status(&StopId::new("extra"), StopStatus::Canceled).unwrap();

    let result = service.assign_stop_manually(&StopId::new("extra"), &VehicleId::new("van-1"), 0);
    assert!(matches!(result, Err(PlannerError::InvalidInput(_))));
}

#[test]
fn test_stale_route_write_conflicts() {
    let store = single_route_store();
    let service = service(&store);
    service.generate(planning_date()).unwrap();
    let stale = store.find_by_vehicle_id(&VehicleId::new("van-1")).unwrap().unwrap();

    service
        .assign_stop_manually(&StopId::new("extra"), &VehicleId::new("van-1"), 1)
        .unwrap();
    let result = RouteRepository::update(&store, stale);

    let error = result.unwrap_err();
    assert!(matches!(error, PlannerError::Conflict { .. }));
    assert!(error.is_retryable());
}

#[test]
fn test_manual_edit_survives_stale_plan_write() {
    let store = single_route_store();
    let service = service(&store);
    let plan_id = service.generate(planning_date()).unwrap().plan.id;
    let mut stale = service.get_plan(&plan_id).unwrap();

    service
        .assign_stop_manually(&StopId::new("extra"), &VehicleId::new("van-1"), 0)
        .unwrap();

    let start = planning_date().and_time(at(8, 0));
    let mut replacement = Route::new(RouteId::new("r-replacement"), VehicleId::new("van-1"), start);
    replacement.ordered_stops = vec![StopId::new("s1"), StopId::new("s2")];
    stale.routes = vec![replacement];
    let result = RoutePlanRepository::update(&store, stale);

    assert!(matches!(result, Err(PlannerError::Conflict { .. })));
    let holder = store.find_by_stop_id(&StopId::new("extra")).unwrap();
    assert!(holder.is_some(), "manual insertion was lost");
    let current = service.get_plan(&plan_id).unwrap();
    assert_eq!(current.routes[0].ordered_stops[0], StopId::new("extra"));
}

#[test]
fn test_optimize_after_manual_edit_uses_fresh_plan() {
    let store = seeded_store();
    let service = service(&store);
    let plan_id = service.generate(planning_date()).unwrap().plan.id;
    let vehicle_id = service.get_plan(&plan_id).unwrap().routes[0].assigned_vehicle_id.clone();

    let later = planning_date().succ_opt().unwrap();
    store.put_stop(TestStop::new("late-add").at_point(&DELIVERY_POINTS[2]).on(later).build());
    service
        .assign_stop_manually(&StopId::new("late-add"), &vehicle_id, 0)
        .unwrap();

    let outcome = service.optimize(&plan_id).unwrap();
    assert!(outcome.plan.stop_ids().any(|id| id.as_str() == "late-add"));
}

// ============================================================================
// Stop Status
// ============================================================================

#[test]
fn test_status_transition_persisted() {
    let store = seeded_store();
    let service = service(&store);

    let stop = service.update_stop_status(&StopId::new("s1"), StopStatus::EnRoute).unwrap();
    assert_eq!(stop.status, StopStatus::EnRoute);

    let stored = StopRepository::find_by_id(&store, &StopId::new("s1")).unwrap().unwrap();
    assert_eq!(stored.status, StopStatus::EnRoute);
}

#[test]
fn test_completed_stop_cannot_reopen() {
    let store = seeded_store();
    let service = service(&store);

    let result = service.update_stop_status(&StopId::new("delivered"), StopStatus::Pending);

    assert!(matches!(result, Err(PlannerError::InvalidInput(_))));
    let stored = StopRepository::find_by_id(&store, &StopId::new("delivered")).unwrap().unwrap();
    assert_eq!(stored.status, StopStatus::Completed);
}

#[test]
fn test_status_of_unknown_stop() {
    let service = service(&InMemoryStore::new());
    let result = service.update_stop_status(&StopId::new("ghost"), StopStatus::Completed);
    assert!(matches!(result, Err(PlannerError::NotFound { .. })));
}

// ============================================================================
// Reports
// ============================================================================

#[test]
fn test_report_follows_manual_edits() {
    let store = single_route_store();
    let service = service(&store);
    let plan = service.generate(planning_date()).unwrap().plan;

    let before = service.generate_report(&plan.id).unwrap();
    service
        .assign_stop_manually(&StopId::new("extra"), &VehicleId::new("van-1"), 2)
        .unwrap();
    let after = service.generate_report(&plan.id).unwrap();

    assert_eq!(before.total_stops, 2);
    assert_eq!(after.total_stops, 3);
    assert_eq!(after.total_routes, 1);
    assert!(after.total_distance >= before.total_distance);
    assert_eq!(after.on_time_delivery_percentage, 100.0);
}

#[test]
fn test_report_unknown_plan() {
    let service = service(&InMemoryStore::new());
    let result = service.generate_report(&RoutePlanId::new("missing"));
    assert!(matches!(result, Err(PlannerError::NotFound { .. })));
}
