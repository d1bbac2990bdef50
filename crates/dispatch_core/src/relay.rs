//! Outbound queue updates for the on-board controllers.
//!
//! The dispatcher hands every committed queue change to a [`QueueRelay`]
//! after the vehicle lock is released. Delivery is fire-and-forget: a relay
//! error is logged and never undoes the booking or acknowledgment.
//!
//! Updates for one vehicle reach the relay one at a time and in increasing
//! `revision` order. An update overtaken by a newer one before it could be
//! relayed is dropped, so the last update a relay sees is always the
//! vehicle's current queue.

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::graph::NodeId;
use crate::vehicle::{Vehicle, VehicleId};

/// Payload sent to a vehicle: its id and the stops it still has to reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueUpdate {
    pub vehicle_id: VehicleId,
    pub queue: Vec<NodeId>,
    /// Vehicle revision the queue was read at. Receivers on the far side of
    /// a transport that may reorder messages should drop any update older
    /// than one already applied.
    pub revision: u64,
}

impl QueueUpdate {
    pub fn of(vehicle: &Vehicle) -> Self {
        Self {
            vehicle_id: vehicle.id().clone(),
            queue: vehicle.queue().cloned().collect(),
            revision: vehicle.revision(),
        }
    }
}

/// Transport to whatever drives the vehicles.
///
/// `publish` is never called concurrently for the same vehicle, and revisions
/// for one vehicle only increase from call to call.
pub trait QueueRelay: Send + Sync {
    fn publish(&self, update: &QueueUpdate) -> Result<(), RelayError>;
}

/// Writes updates to the log. The default relay.
#[derive(Debug, Default)]
pub struct LogRelay;

impl QueueRelay for LogRelay {
    fn publish(&self, update: &QueueUpdate) -> Result<(), RelayError> {
        let stops: Vec<&str> = update.queue.iter().map(NodeId::as_str).collect();
        info!("queue for {}: [{}]", update.vehicle_id, stops.join(", "));
        Ok(())
    }
}

/// Discards every update.
#[derive(Debug, Default)]
pub struct NullRelay;

impl QueueRelay for NullRelay {
    fn publish(&self, _update: &QueueUpdate) -> Result<(), RelayError> {
        Ok(())
    }
}
