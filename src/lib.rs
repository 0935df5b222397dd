//! route-planner core
//!
//! Assigns a fleet of vehicles to time-windowed stops for a planning date,
//! keeps route metrics consistent after manual edits, and reports on plan
//! efficiency. Storage is reached only through the repository traits.

pub mod error;
pub mod config;
pub mod model;
pub mod geo;
pub mod traits;
pub mod calculation;
pub mod solver;
pub mod report;
pub mod planning;
pub mod memory;

pub use error::{PlannerError, Result};
