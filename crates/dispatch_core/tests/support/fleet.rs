#![allow(dead_code)]

use std::collections::HashSet;

use dispatch_core::fleet::VehicleSnapshot;
use dispatch_core::graph::RouteGraph;
use dispatch_core::scenario::ScenarioConfig;
use dispatch_core::Dispatcher;

/// Three-zone network with `vehicles` vehicles of `capacity` seats each.
pub fn three_zone_fleet(vehicles: usize, capacity: u32) -> ScenarioConfig {
    let mut config = ScenarioConfig::default();
    config.vehicles.clear();
    (1..=vehicles).fold(config, |config, n| {
        config.with_vehicle(&format!("V{n}"), capacity)
    })
}

/// Checks every invariant a vehicle must hold after any sequence of bookings.
pub fn assert_vehicle_consistent(graph: &RouteGraph, snapshot: &VehicleSnapshot) {
    assert!(
        snapshot.seats_available <= snapshot.capacity,
        "{}: {} seats free out of {}",
        snapshot.id,
        snapshot.seats_available,
        snapshot.capacity
    );
    assert!(
        graph.is_contiguous(&snapshot.traversal_path),
        "{}: traversal path has a gap: {:?}",
        snapshot.id,
        snapshot.traversal_path
    );
    let distinct: HashSet<_> = snapshot.queue.iter().collect();
    assert_eq!(distinct.len(), snapshot.queue.len(), "{}: queue repeats a stop", snapshot.id);
    assert_eq!(
        snapshot.seat_flow.values().sum::<i64>(),
        0,
        "{}: seat flow does not balance",
        snapshot.id
    );
}

pub fn assert_fleet_consistent(dispatcher: &Dispatcher) {
    let graph = dispatcher.fleet().graph();
    for snapshot in dispatcher.snapshot_fleet() {
        assert_vehicle_consistent(graph, &snapshot);
    }
}
