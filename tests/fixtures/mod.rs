//! Test fixtures for route-planner.
//!
//! Provides builders for stops and vehicles with sensible defaults, plus
//! real Las Vegas / Henderson coordinates.
#![allow(dead_code)]

pub mod las_vegas_locations;

pub use las_vegas_locations::*;

use chrono::{NaiveDate, NaiveTime};

use route_planner::model::{
    Capacity, ClientId, Coordinates, Payload, Stop, StopId, StopStatus, TimeWindow, Vehicle, VehicleId,
    VehicleType, WorkSchedule,
};
use route_planner::solver::{OptimizationOutcome, UnassignedReason};

pub fn planning_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

pub fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// MGM Grand, the default depot.
pub fn depot() -> Coordinates {
    Coordinates::new(36.1023654, -115.1688720)
}

// ============================================================================
// Builders
// ============================================================================

pub struct TestStop {
    stop: Stop,
}

impl TestStop {
    pub fn new(id: &str) -> Self {
        Self {
            stop: Stop {
                id: StopId::new(id),
                address: format!("{id} delivery address"),
                coordinates: depot(),
                time_windows: Vec::new(),
                estimated_service_time: 15.0,
                payload: Payload::new(10.0, 1.0, "parcel"),
                status: StopStatus::Pending,
                associated_client_id: ClientId::new(format!("client-{id}")),
                planning_date: planning_date(),
            },
        }
    }

    pub fn location(mut self, lat: f64, lng: f64) -> Self {
        self.stop.coordinates = Coordinates::new(lat, lng);
        self
    }

    pub fn at_point(mut self, location: &Location) -> Self {
        self.stop.coordinates = location.coordinates();
        self
    }

    pub fn window(mut self, start: (u32, u32), end: (u32, u32)) -> Self {
        self.stop.time_windows.push(TimeWindow::from_hm(start, end).unwrap());
        self
    }

    pub fn service(mut self, minutes: f64) -> Self {
        self.stop.estimated_service_time = minutes;
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.stop.payload.weight = weight;
        self
    }

    pub fn volume(mut self, volume: f64) -> Self {
        self.stop.payload.volume = volume;
        self
    }

    pub fn nature(mut self, nature: &str) -> Self {
        self.stop.payload.nature = nature.to_string();
        self
    }

    pub fn status(mut self, status: StopStatus) -> Self {
        self.stop.status = status;
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.stop.planning_date = date;
        self
    }

    pub fn build(self) -> Stop {
        self.stop
    }
}

pub struct TestVehicle {
    vehicle: Vehicle,
}

impl TestVehicle {
    pub fn new(id: &str) -> Self {
        Self {
            vehicle: Vehicle {
                id: VehicleId::new(id),
                vehicle_type: VehicleType::Van,
                capacity: Capacity::new(1000.0, 100.0),
                work_schedule: WorkSchedule::from_hm((8, 0), (17, 0)).unwrap(),
                start_location: depot(),
                current_location: None,
                speed_kmh: 40.0,
                cost_per_distance: Some(1.0),
                handled_natures: Vec::new(),
                availability: true,
            },
        }
    }

    pub fn capacity(mut self, max_weight: f64, max_volume: f64) -> Self {
        self.vehicle.capacity = Capacity::new(max_weight, max_volume);
        self
    }

    pub fn schedule(mut self, start: (u32, u32), end: (u32, u32)) -> Self {
        self.vehicle.work_schedule = WorkSchedule::from_hm(start, end).unwrap();
        self
    }

    pub fn start(mut self, lat: f64, lng: f64) -> Self {
        self.vehicle.start_location = Coordinates::new(lat, lng);
        self
    }

    pub fn currently_at(mut self, lat: f64, lng: f64) -> Self {
        self.vehicle.current_location = Some(Coordinates::new(lat, lng));
        self
    }

    pub fn speed(mut self, speed_kmh: f64) -> Self {
        self.vehicle.speed_kmh = speed_kmh;
        self
    }

    pub fn cost(mut self, per_km: Option<f64>) -> Self {
        self.vehicle.cost_per_distance = per_km;
        self
    }

    pub fn handles(mut self, nature: &str) -> Self {
        self.vehicle.handled_natures.push(nature.to_string());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.vehicle.availability = false;
        self
    }

    pub fn build(self) -> Vehicle {
        self.vehicle
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

pub fn route_stops<'a>(outcome: &'a OptimizationOutcome, vehicle_id: &str) -> Vec<&'a str> {
    outcome
        .routes
        .iter()
        .find(|route| route.vehicle_id.as_str() == vehicle_id)
        .map(|route| route.ordered_stops.iter().map(|id| id.as_str()).collect())
        .unwrap_or_default()
}

pub fn unassigned_with_reason(outcome: &OptimizationOutcome, reason: UnassignedReason) -> Vec<&str> {
    outcome
        .unassigned
        .iter()
        .filter(|unassigned| unassigned.reason == reason)
        .map(|unassigned| unassigned.stop_id.as_str())
        .collect()
}

pub fn all_routed_stops(outcome: &OptimizationOutcome) -> Vec<&str> {
    outcome
        .routes
        .iter()
        .flat_map(|route| route.ordered_stops.iter().map(|id| id.as_str()))
        .collect()
}
