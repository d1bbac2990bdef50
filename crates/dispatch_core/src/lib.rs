//! Routing-and-dispatch engine for a small shared-ride fleet.
//!
//! - [`graph`]: static road graph, shortest paths and continuity stitching
//! - [`vehicle`]: seats, pending stops, consolidated route and seat flow
//! - [`selection`]: which vehicle serves a new pickup
//! - [`dispatcher`]: bookings, stop acknowledgments and fleet snapshots
//! - [`zone_insertion`]: zone-ordered splicing of a single stop
//! - [`scenario`]: configuration and fleet construction

pub mod dispatcher;
pub mod error;
pub mod fleet;
pub mod graph;
pub mod relay;
pub mod scenario;
pub mod selection;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod vehicle;
pub mod zone_insertion;

pub use dispatcher::{Dispatcher, TripRequest};
pub use error::DispatchError;
pub use fleet::{FleetState, VehicleSnapshot};
pub use graph::{NodeId, RouteGraph};
pub use vehicle::{Vehicle, VehicleId};
