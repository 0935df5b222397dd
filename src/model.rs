//! Planning entities: stops, vehicles, routes and route plans.
//!
//! Entities reference each other by id only. Routes and plans are owned by
//! their repositories and stay independently updatable; the engine borrows
//! stop and vehicle data for the duration of a single operation.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

entity_id!(
    /// Opaque stop identifier.
    StopId
);
entity_id!(
    /// Opaque vehicle identifier.
    VehicleId
);
entity_id!(RouteId);
entity_id!(RoutePlanId);
entity_id!(ClientId);

impl RouteId {
    pub fn generate() -> Self {
        Self(format!("route-{}", uuid::Uuid::new_v4()))
    }
}

impl RoutePlanId {
    pub fn generate() -> Self {
        Self(format!("plan-{}", uuid::Uuid::new_v4()))
    }
}

// ============================================================================
// Value Types
// ============================================================================

/// Latitude/longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lng_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lng_ok {
            Ok(())
        } else {
            Err(PlannerError::invalid(format!(
                "coordinates out of range: ({}, {})",
                self.latitude, self.longitude
            )))
        }
    }
}

/// Interval during which service may begin. Both bounds are eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Builds a window from `(hour, minute)` pairs. Invalid clock values yield `InvalidInput`.
    pub fn from_hm(start: (u32, u32), end: (u32, u32)) -> Result<Self> {
        let start = clock(start.0, start.1)?;
        let end = clock(end.0, end.1)?;
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    pub fn contains(&self, instant: NaiveTime) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(PlannerError::invalid(format!(
                "time window starts after it ends: {} > {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

fn clock(hour: u32, minute: u32) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| PlannerError::invalid(format!("invalid clock time {hour:02}:{minute:02}")))
}

/// What a stop asks a vehicle to carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub weight: f64,
    pub volume: f64,
    /// Free-form tag, e.g. "fragile" or "refrigerated". Compatibility only.
    pub nature: String,
}

impl Payload {
    pub fn new(weight: f64, volume: f64, nature: impl Into<String>) -> Self {
        Self {
            weight,
            volume,
            nature: nature.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.weight >= 0.0 && self.volume >= 0.0) {
            return Err(PlannerError::invalid(format!(
                "payload must be non-negative (weight {}, volume {})",
                self.weight, self.volume
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    pub max_weight: f64,
    pub max_volume: f64,
}

impl Capacity {
    pub fn new(max_weight: f64, max_volume: f64) -> Self {
        Self {
            max_weight,
            max_volume,
        }
    }

    pub fn fits(&self, weight: f64, volume: f64) -> bool {
        weight <= self.max_weight && volume <= self.max_volume
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSchedule {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl WorkSchedule {
    pub fn from_hm(start: (u32, u32), end: (u32, u32)) -> Result<Self> {
        let window = TimeWindow::from_hm(start, end)?;
        Ok(Self {
            start_time: window.start,
            end_time: window.end,
        })
    }
}

// ============================================================================
// Stop
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    Pending,
    EnRoute,
    Completed,
    Canceled,
}

impl StopStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }

    /// Validates a lifecycle transition. Re-applying the current status is a no-op.
    pub fn transition_to(self, next: StopStatus) -> Result<StopStatus> {
        if self == next {
            return Ok(next);
        }
        if self.is_terminal() {
            return Err(PlannerError::invalid(format!(
                "stop status {self} is terminal and cannot change to {next}"
            )));
        }
        Ok(next)
    }
}

impl fmt::Display for StopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::EnRoute => "en_route",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: StopId,
    pub address: String,
    pub coordinates: Coordinates,
    /// Ordered, disjoint. Empty means the stop accepts any time in the vehicle's schedule.
    pub time_windows: Vec<TimeWindow>,
    /// Minutes consumed once service starts.
    pub estimated_service_time: f64,
    pub payload: Payload,
    pub status: StopStatus,
    pub associated_client_id: ClientId,
    /// Calendar date the stop is due on.
    pub planning_date: NaiveDate,
}

impl Stop {
    pub fn validate(&self) -> Result<()> {
        self.coordinates.validate()?;
        self.payload.validate()?;
        if !(self.estimated_service_time >= 0.0) {
            return Err(PlannerError::invalid(format!(
                "stop {} has a negative service time",
                self.id
            )));
        }
        for window in &self.time_windows {
            window.validate()?;
        }
        if self.time_windows.windows(2).any(|pair| pair[0].end >= pair[1].start) {
            return Err(PlannerError::invalid(format!(
                "stop {} has overlapping or unordered time windows",
                self.id
            )));
        }
        Ok(())
    }

    /// Earliest window start, used as a sequencing tie-breaker.
    pub fn earliest_window_start(&self) -> Option<NaiveTime> {
        self.time_windows.first().map(|window| window.start)
    }
}

// ============================================================================
// Vehicle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Van,
    Motorcycle,
    Truck,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: VehicleId,
    pub vehicle_type: VehicleType,
    pub capacity: Capacity,
    pub work_schedule: WorkSchedule,
    pub start_location: Coordinates,
    /// Set when the vehicle is already out; planning then departs from here.
    pub current_location: Option<Coordinates>,
    /// Average speed used to turn distance into travel time.
    pub speed_kmh: f64,
    /// Cost per km. `None` falls back to the configured flat rate.
    pub cost_per_distance: Option<f64>,
    /// Payload natures this vehicle accepts. Empty accepts every nature.
    pub handled_natures: Vec<String>,
    pub availability: bool,
}

impl Vehicle {
    pub fn origin(&self) -> Coordinates {
        self.current_location.unwrap_or(self.start_location)
    }

    pub fn handles(&self, nature: &str) -> bool {
        self.handled_natures.is_empty() || self.handled_natures.iter().any(|n| n == nature)
    }

    pub fn validate(&self) -> Result<()> {
        self.start_location.validate()?;
        if let Some(current) = &self.current_location {
            current.validate()?;
        }
        if !(self.capacity.max_weight >= 0.0 && self.capacity.max_volume >= 0.0) {
            return Err(PlannerError::invalid(format!(
                "vehicle {} has a negative capacity",
                self.id
            )));
        }
        if !(self.speed_kmh > 0.0 && self.speed_kmh.is_finite()) {
            return Err(PlannerError::invalid(format!(
                "vehicle {} must have a positive speed",
                self.id
            )));
        }
        if let Some(rate) = self.cost_per_distance {
            if !(rate >= 0.0) {
                return Err(PlannerError::invalid(format!(
                    "vehicle {} has a negative cost per distance",
                    self.id
                )));
            }
        }
        if self.work_schedule.start_time > self.work_schedule.end_time {
            return Err(PlannerError::invalid(format!(
                "vehicle {} work schedule ends before it starts",
                self.id
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Route & RoutePlan
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: RouteId,
    pub assigned_vehicle_id: VehicleId,
    pub ordered_stops: Vec<StopId>,
    /// Kilometers.
    pub total_distance: f64,
    /// Minutes of driving plus service.
    pub total_travel_time: f64,
    pub estimated_start_time: NaiveDateTime,
    /// Optimistic concurrency token, bumped by every successful update.
    pub version: u64,
}

impl Route {
    pub fn new(id: RouteId, vehicle_id: VehicleId, estimated_start_time: NaiveDateTime) -> Self {
        Self {
            id,
            assigned_vehicle_id: vehicle_id,
            ordered_stops: Vec::new(),
            total_distance: 0.0,
            total_travel_time: 0.0,
            estimated_start_time,
            version: 0,
        }
    }

    /// Inserts a stop, clamping `position` to `[0, len]`. Returns the index used.
    pub fn insert_stop(&mut self, stop_id: StopId, position: usize) -> usize {
        let index = position.min(self.ordered_stops.len());
        self.ordered_stops.insert(index, stop_id);
        index
    }

    pub fn contains_stop(&self, stop_id: &StopId) -> bool {
        self.ordered_stops.contains(stop_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    pub id: RoutePlanId,
    pub routes: Vec<Route>,
    pub planning_date: NaiveDate,
    pub version: u64,
}

impl RoutePlan {
    pub fn new(id: RoutePlanId, planning_date: NaiveDate, routes: Vec<Route>) -> Self {
        Self {
            id,
            routes,
            planning_date,
            version: 0,
        }
    }

    pub fn stop_ids(&self) -> impl Iterator<Item = &StopId> {
        self.routes.iter().flat_map(|route| route.ordered_stops.iter())
    }

    /// Vehicle ids in route order, without duplicates.
    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        let mut ids: Vec<VehicleId> = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            if !ids.contains(&route.assigned_vehicle_id) {
                ids.push(route.assigned_vehicle_id.clone());
            }
        }
        ids
    }
}
