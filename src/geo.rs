//! Distance, travel time and time-window helpers.
//!
//! Distances are great-circle kilometers scaled by a road factor. No road
//! network or traffic data is consulted, so results are estimates, but they
//! are deterministic and always available.

use chrono::{NaiveTime, Timelike};

use crate::error::{PlannerError, Result};
use crate::model::{Coordinates, TimeWindow, Vehicle};

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Straight line to road distance.
pub const DEFAULT_ROAD_FACTOR: f64 = 1.3;

/// Estimates the distance between two coordinates.
///
/// Implementations must be pure: the optimizer and the route calculator call
/// them many times and expect identical answers for identical inputs.
pub trait DistanceEstimator: Send + Sync {
    /// Distance in kilometers. Rejects out-of-range coordinates.
    fn distance_km(&self, from: Coordinates, to: Coordinates) -> Result<f64>;
}

/// Haversine distance with a constant road factor.
#[derive(Debug, Clone, Copy)]
pub struct Haversine {
    pub road_factor: f64,
}

impl Default for Haversine {
    fn default() -> Self {
        Self {
            road_factor: DEFAULT_ROAD_FACTOR,
        }
    }
}

impl Haversine {
    pub fn new(road_factor: f64) -> Self {
        Self { road_factor }
    }

    fn great_circle_km(from: Coordinates, to: Coordinates) -> f64 {
        let lat1 = from.latitude.to_radians();
        let lat2 = to.latitude.to_radians();
        let delta_lat = (to.latitude - from.latitude).to_radians();
        let delta_lng = (to.longitude - from.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();

        EARTH_RADIUS_KM * c
    }
}

impl DistanceEstimator for Haversine {
    fn distance_km(&self, from: Coordinates, to: Coordinates) -> Result<f64> {
        from.validate()?;
        to.validate()?;
        Ok(Self::great_circle_km(from, to) * self.road_factor)
    }
}

/// Road distance estimate in kilometers using the default road factor.
pub fn estimate_distance(from: Coordinates, to: Coordinates) -> Result<f64> {
    Haversine::default().distance_km(from, to)
}

/// Minutes needed to drive `distance_km` at the vehicle's average speed.
pub fn estimate_travel_time(distance_km: f64, vehicle: &Vehicle) -> Result<f64> {
    if !(distance_km >= 0.0) {
        return Err(PlannerError::invalid(format!(
            "distance must be non-negative, got {distance_km}"
        )));
    }
    if !(vehicle.speed_kmh > 0.0) {
        return Err(PlannerError::invalid(format!(
            "vehicle {} must have a positive speed",
            vehicle.id
        )));
    }
    Ok(distance_km / vehicle.speed_kmh * 60.0)
}

/// True when `instant` falls inside any window, bounds included.
///
/// A stop without windows accepts any instant.
pub fn windows_overlap(windows: &[TimeWindow], instant: NaiveTime) -> bool {
    windows.is_empty() || windows.iter().any(|window| window.contains(instant))
}

/// Earliest minute-of-day at or after `arrival` at which service may begin.
///
/// Arriving early means waiting for the next window to open. Returns `None`
/// when every window has already closed.
pub fn earliest_service_start(windows: &[TimeWindow], arrival: f64) -> Option<f64> {
    if windows.is_empty() {
        return Some(arrival);
    }

    windows.iter().find_map(|window| {
        let start = minutes_of_day(window.start);
        let end = minutes_of_day(window.end);
        if arrival > end {
            None
        } else {
            Some(arrival.max(start))
        }
    })
}

/// Minutes elapsed since midnight, with sub-minute precision.
pub fn minutes_of_day(time: NaiveTime) -> f64 {
    time.num_seconds_from_midnight() as f64 / 60.0
}
