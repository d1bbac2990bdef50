//! Fleet state: the road graph plus one lock per vehicle.
//!
//! Built once at startup and handed to the dispatcher. Vehicles are kept in
//! configuration order, which is also the tie-break order for selection.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;
use crate::graph::{NodeId, RouteGraph};
use crate::vehicle::{Vehicle, VehicleId};

pub struct FleetState {
    graph: RouteGraph,
    vehicles: IndexMap<VehicleId, VehicleSlot>,
}

struct VehicleSlot {
    vehicle: Mutex<Vehicle>,
    /// Revision of the last queue update handed to the relay.
    relayed: Mutex<u64>,
}

impl fmt::Debug for FleetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FleetState")
            .field("graph", &self.graph)
            .field("vehicles", &self.vehicles.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FleetState {
    pub fn new(
        graph: RouteGraph,
        vehicles: impl IntoIterator<Item = Vehicle>,
    ) -> Result<Self, ScenarioError> {
        let mut fleet = IndexMap::new();
        for vehicle in vehicles {
            if vehicle.capacity() == 0 {
                return Err(ScenarioError::ZeroCapacity(vehicle.id().clone()));
            }
            match fleet.entry(vehicle.id().clone()) {
                Entry::Occupied(entry) => {
                    return Err(ScenarioError::DuplicateVehicle(entry.key().clone()))
                }
                Entry::Vacant(entry) => {
                    entry.insert(VehicleSlot {
                        vehicle: Mutex::new(vehicle),
                        relayed: Mutex::new(0),
                    });
                }
            }
        }
        Ok(Self {
            graph,
            vehicles: fleet,
        })
    }

    pub fn graph(&self) -> &RouteGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Exclusive access to one vehicle.
    ///
    /// A poisoned lock is recovered: vehicle methods never leave a vehicle
    /// half-updated when they fail.
    pub fn lock(&self, id: &VehicleId) -> Option<MutexGuard<'_, Vehicle>> {
        self.vehicles
            .get(id)
            .map(|slot| slot.vehicle.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Revision of the newest queue update relayed for `id`.
    ///
    /// Holding the guard serialises relay calls for that vehicle. Never take a
    /// vehicle lock while holding it.
    pub fn relay_gate(&self, id: &VehicleId) -> Option<MutexGuard<'_, u64>> {
        self.vehicles
            .get(id)
            .map(|slot| slot.relayed.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Visit every vehicle in fleet order, holding one lock at a time.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&Vehicle),
    {
        for slot in self.vehicles.values() {
            let vehicle = slot.vehicle.lock().unwrap_or_else(PoisonError::into_inner);
            visit(&vehicle);
        }
    }

    pub fn snapshot(&self) -> Vec<VehicleSnapshot> {
        let mut snapshots = Vec::with_capacity(self.vehicles.len());
        self.for_each(|vehicle| snapshots.push(VehicleSnapshot::of(vehicle)));
        snapshots
    }

    pub fn vehicle_snapshot(&self, id: &VehicleId) -> Option<VehicleSnapshot> {
        self.lock(id).map(|vehicle| VehicleSnapshot::of(&vehicle))
    }
}

/// Read-only view of one vehicle for display and telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub capacity: u32,
    pub seats_available: u32,
    pub queue: Vec<NodeId>,
    pub traversal_path: Vec<NodeId>,
    pub seat_flow: BTreeMap<NodeId, i64>,
}

impl VehicleSnapshot {
    pub fn of(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id().clone(),
            capacity: vehicle.capacity(),
            seats_available: vehicle.seats_available(),
            queue: vehicle.queue().cloned().collect(),
            traversal_path: vehicle.traversal_path().to_vec(),
            seat_flow: vehicle
                .seat_flow()
                .iter()
                .map(|(node, delta)| (node.clone(), *delta))
                .collect(),
        }
    }
}

fn join(nodes: &[NodeId]) -> String {
    nodes.iter().map(NodeId::as_str).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for VehicleSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flow: Vec<String> = self
            .seat_flow
            .iter()
            .map(|(node, delta)| format!("{node}: {delta:+}"))
            .collect();
        writeln!(
            f,
            "{} ({}/{} seats free)",
            self.id, self.seats_available, self.capacity
        )?;
        writeln!(f, "  queue:     [{}]", join(&self.queue))?;
        writeln!(f, "  traversal: [{}]", join(&self.traversal_path))?;
        write!(f, "  seat flow: {{{}}}", flow.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::three_zone_graph;

    #[test]
    fn rejects_duplicate_ids() {
        let err = FleetState::new(
            three_zone_graph(),
            vec![Vehicle::new("V1", 10), Vehicle::new("V1", 4)],
        )
        .expect_err("duplicate");
        assert!(matches!(err, ScenarioError::DuplicateVehicle(id) if id.as_str() == "V1"));
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = FleetState::new(three_zone_graph(), vec![Vehicle::new("V1", 0)])
            .expect_err("zero capacity");
        assert!(matches!(err, ScenarioError::ZeroCapacity(_)));
    }

    #[test]
    fn snapshot_keeps_fleet_order() {
        let fleet = FleetState::new(
            three_zone_graph(),
            vec![
                Vehicle::new("V2", 4),
                Vehicle::new("V1", 10),
                Vehicle::new("V3", 6),
            ],
        )
        .expect("fleet");
        let ids: Vec<_> = fleet.snapshot().into_iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            vec![VehicleId::from("V2"), VehicleId::from("V1"), VehicleId::from("V3")]
        );
    }

    #[test]
    fn snapshot_display_lists_flow() {
        let mut vehicle = Vehicle::new("V1", 10);
        vehicle.book_seats(3).expect("fits");
        vehicle.record_flow(&"A1".into(), &"A3".into(), 3);
        let text = VehicleSnapshot::of(&vehicle).to_string();
        assert!(text.starts_with("V1 (7/10 seats free)"));
        assert!(text.contains("A1: +3, A3: -3"));
    }

    #[test]
    fn unknown_vehicle_has_no_lock() {
        let fleet = FleetState::new(three_zone_graph(), vec![Vehicle::new("V1", 10)])
            .expect("fleet");
        assert!(fleet.lock(&VehicleId::from("V9")).is_none());
        assert!(fleet.relay_gate(&VehicleId::from("V9")).is_none());
        assert!(fleet.vehicle_snapshot(&VehicleId::from("V1")).is_some());
    }
}
