//! Error kinds surfaced by the dispatch core.
//!
//! Every variant is recoverable: callers get a value back and decide what to do
//! with it. Nothing in the core panics on bad input.

use thiserror::Error;

use crate::graph::NodeId;
use crate::vehicle::VehicleId;

/// Failures reported by [`crate::dispatcher::Dispatcher`] and [`crate::vehicle::Vehicle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("cannot book {requested} seats, only {available} available")]
    CapacityExceeded { requested: u32, available: u32 },
    #[error("no vehicle in the fleet has {seats} free seats")]
    NoCapacity { seats: u32 },
    #[error("no route from {pickup} to {destination}")]
    NoRoute { pickup: NodeId, destination: NodeId },
    #[error("unknown vehicle {0}")]
    UnknownVehicle(VehicleId),
    #[error("node {0} is not part of the road graph")]
    UnknownNode(NodeId),
    #[error(
        "stop {got} acknowledged for {vehicle}, but the head of its queue is {}",
        .expected.as_ref().map_or("<empty>", NodeId::as_str)
    )]
    StopMismatch {
        vehicle: VehicleId,
        expected: Option<NodeId>,
        got: NodeId,
    },
    #[error("a booking must request at least one seat")]
    InvalidSeats,
}

/// One segment skipped while stitching waypoints into a continuous path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StitchFailure {
    #[error("segment {from} -> {to} references a node missing from the graph")]
    MissingNode { from: NodeId, to: NodeId },
    #[error("no path between {from} and {to}")]
    Unreachable { from: NodeId, to: NodeId },
}

/// Rejected graph definitions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("edge {from} -> {to} has invalid weight {weight}; weights must be finite and non-negative")]
    InvalidWeight { from: NodeId, to: NodeId, weight: f64 },
    #[error("node ids must not be empty")]
    EmptyNodeId,
}

/// Problems loading or validating a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scenario: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid road graph: {0}")]
    Graph(#[from] GraphError),
    #[error("vehicle {0} is defined more than once")]
    DuplicateVehicle(VehicleId),
    #[error("vehicle {0} must have a positive capacity")]
    ZeroCapacity(VehicleId),
}

/// Failure reported by a [`crate::relay::QueueRelay`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("relay for {vehicle} failed: {reason}")]
pub struct RelayError {
    pub vehicle: VehicleId,
    pub reason: String,
}
