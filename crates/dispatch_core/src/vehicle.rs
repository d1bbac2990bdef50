//! Per-vehicle state: seats, pending stops, consolidated route and seat flow.

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::graph::NodeId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for VehicleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    capacity: u32,
    seats_available: u32,
    /// Stops still to be reached, head first. Never holds a node twice.
    queue: IndexSet<NodeId>,
    /// Consolidated route. May revisit a node when that is the only way to
    /// keep consecutive stops adjacent.
    traversal_path: Vec<NodeId>,
    /// Membership index over `traversal_path`.
    on_path: HashSet<NodeId>,
    /// Net seats boarding (+) or alighting (-) per stop.
    seat_flow: HashMap<NodeId, i64>,
    /// Bumped on every mutation; lets the dispatcher detect that a vehicle
    /// changed between scoring and locking.
    revision: u64,
}

impl Vehicle {
    /// A fresh vehicle with every seat free.
    pub fn new(id: impl Into<VehicleId>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            capacity,
            seats_available: capacity,
            queue: IndexSet::new(),
            traversal_path: Vec::new(),
            on_path: HashSet::new(),
            seat_flow: HashMap::new(),
            revision: 0,
        }
    }

    pub fn id(&self) -> &VehicleId {
        &self.id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn seats_available(&self) -> u32 {
        self.seats_available
    }

    pub fn queue(&self) -> impl ExactSizeIterator<Item = &NodeId> {
        self.queue.iter()
    }

    pub fn queue_head(&self) -> Option<&NodeId> {
        self.queue.first()
    }

    pub fn traversal_path(&self) -> &[NodeId] {
        &self.traversal_path
    }

    pub fn seat_flow(&self) -> &HashMap<NodeId, i64> {
        &self.seat_flow
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn can_accommodate(&self, seats: u32) -> bool {
        self.seats_available >= seats
    }

    /// Reserve `seats`, all or nothing.
    pub fn book_seats(&mut self, seats: u32) -> Result<(), DispatchError> {
        if !self.can_accommodate(seats) {
            return Err(DispatchError::CapacityExceeded {
                requested: seats,
                available: self.seats_available,
            });
        }
        self.seats_available -= seats;
        self.revision += 1;
        Ok(())
    }

    /// Free `seats`. Releasing more than was booked clamps at capacity.
    pub fn release_seats(&mut self, seats: u32) {
        self.seats_available = self.seats_available.saturating_add(seats).min(self.capacity);
        self.revision += 1;
    }

    /// Append every node not already queued, keeping first-appearance order.
    pub fn enqueue<'a>(&mut self, nodes: impl IntoIterator<Item = &'a NodeId>) {
        for node in nodes {
            if !self.queue.contains(node) {
                self.queue.insert(node.clone());
            }
        }
        self.revision += 1;
    }

    /// Append every node not already on the traversal path.
    pub fn extend_traversal<'a>(&mut self, nodes: impl IntoIterator<Item = &'a NodeId>) {
        for node in nodes {
            if self.on_path.insert(node.clone()) {
                self.traversal_path.push(node.clone());
            }
        }
        self.revision += 1;
    }

    /// Replace the traversal path wholesale, e.g. with a re-stitched one.
    pub fn set_traversal(&mut self, path: Vec<NodeId>) {
        self.on_path = path.iter().cloned().collect();
        self.traversal_path = path;
        self.revision += 1;
    }

    pub fn record_flow(&mut self, pickup: &NodeId, dropoff: &NodeId, seats: u32) {
        let seats = i64::from(seats);
        *self.seat_flow.entry(pickup.clone()).or_insert(0) += seats;
        *self.seat_flow.entry(dropoff.clone()).or_insert(0) -= seats;
        self.revision += 1;
    }

    /// Pop the head of the queue if it is `node`. Anything else leaves the
    /// queue untouched.
    pub fn advance_queue(&mut self, node: &NodeId) -> Result<(), DispatchError> {
        if self.queue.first() != Some(node) {
            return Err(DispatchError::StopMismatch {
                vehicle: self.id.clone(),
                expected: self.queue.first().cloned(),
                got: node.clone(),
            });
        }
        self.queue.shift_remove_index(0);
        self.revision += 1;
        Ok(())
    }
}
