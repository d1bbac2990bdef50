//! Scenario configuration: road graph, vehicles and dispatcher tunables, plus
//! the builders that turn them into a running fleet.

mod build;
mod params;

pub use build::{build_dispatcher, build_fleet};
pub use params::{
    DispatchConfig, ScenarioConfig, VehicleSpec, DEFAULT_MAX_SELECTION_RETRIES,
    DEFAULT_VEHICLE_CAPACITY,
};
