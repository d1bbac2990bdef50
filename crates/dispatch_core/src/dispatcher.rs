//! Booking and stop acknowledgment.
//!
//! A booking runs filter → select → book → route → merge → record flow. The
//! last four steps happen while holding the chosen vehicle's lock, so no
//! other booking can see or produce a half-updated vehicle. Other vehicles
//! stay available to concurrent bookings throughout.
//!
//! Scoring reads each candidate under its own short-lived lock. If the chosen
//! vehicle changed between scoring and locking, selection is run again.
//!
//! Queue updates are relayed after the vehicle lock is released, through a
//! per-vehicle gate that drops updates older than the last one relayed.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::fleet::{FleetState, VehicleSnapshot};
use crate::graph::NodeId;
use crate::relay::{LogRelay, QueueRelay, QueueUpdate};
use crate::scenario::DispatchConfig;
use crate::selection::{Candidate, NearestQueueHead, VehicleSelector};
use crate::vehicle::{Vehicle, VehicleId};
use crate::zone_insertion::{insert_stop, StopRole};

/// A passenger trip waiting for a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRequest {
    pub pickup: NodeId,
    pub destination: NodeId,
    pub seats: u32,
}

impl TripRequest {
    pub fn new(pickup: impl Into<NodeId>, destination: impl Into<NodeId>, seats: u32) -> Self {
        Self {
            pickup: pickup.into(),
            destination: destination.into(),
            seats,
        }
    }
}

pub struct Dispatcher {
    fleet: Arc<FleetState>,
    selector: Box<dyn VehicleSelector>,
    relay: Box<dyn QueueRelay>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Dispatcher using [`NearestQueueHead`] selection and the [`LogRelay`].
    pub fn new(fleet: Arc<FleetState>, config: DispatchConfig) -> Self {
        Self {
            fleet,
            selector: Box::new(NearestQueueHead),
            relay: Box::new(LogRelay),
            config,
        }
    }

    pub fn with_selector(mut self, selector: Box<dyn VehicleSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_relay(mut self, relay: Box<dyn QueueRelay>) -> Self {
        self.relay = relay;
        self
    }

    pub fn fleet(&self) -> &FleetState {
        &self.fleet
    }

    /// Assign `request` to a vehicle and merge the trip into its route.
    pub fn make_booking(&self, request: &TripRequest) -> Result<VehicleId, DispatchError> {
        if request.seats == 0 {
            return Err(DispatchError::InvalidSeats);
        }

        for attempt in 0..=self.config.max_selection_retries {
            let eligible = self.eligible(request.seats);
            if eligible.is_empty() {
                warn!("no vehicle has {} free seats", request.seats);
                return Err(DispatchError::NoCapacity {
                    seats: request.seats,
                });
            }

            let Some(chosen) =
                self.selector
                    .select(self.fleet.graph(), &eligible, &request.pickup)
            else {
                warn!("no vehicle can reach pickup {}", request.pickup);
                return Err(self.no_route(request));
            };

            let Some(mut vehicle) = self.fleet.lock(&chosen.vehicle_id) else {
                return Err(DispatchError::UnknownVehicle(chosen.vehicle_id.clone()));
            };
            if vehicle.revision() != chosen.revision {
                debug!(
                    "{} changed while scoring (attempt {}), selecting again",
                    chosen.vehicle_id,
                    attempt + 1
                );
                continue;
            }

            self.commit_booking(&mut vehicle, request)?;
            let update = QueueUpdate::of(&vehicle);
            drop(vehicle);

            self.publish(&update);
            return Ok(chosen.vehicle_id.clone());
        }

        warn!(
            "gave up booking {} -> {} after {} contended attempts",
            request.pickup,
            request.destination,
            self.config.max_selection_retries + 1
        );
        Err(self.no_route(request))
    }

    /// Candidates with room for `seats`, in fleet order.
    fn eligible(&self, seats: u32) -> Vec<Candidate> {
        let mut eligible = Vec::new();
        self.fleet.for_each(|vehicle| {
            if vehicle.can_accommodate(seats) {
                eligible.push(Candidate::of(vehicle));
            }
        });
        eligible
    }

    fn commit_booking(
        &self,
        vehicle: &mut Vehicle,
        request: &TripRequest,
    ) -> Result<(), DispatchError> {
        let graph = self.fleet.graph();
        let route = graph.shortest_path(&request.pickup, &request.destination);
        if route.is_empty() {
            warn!(
                "no path from {} to {}, booking rejected",
                request.pickup, request.destination
            );
            return Err(self.no_route(request));
        }

        vehicle.book_seats(request.seats)?;
        vehicle.enqueue(&route.nodes);
        vehicle.extend_traversal(&route.nodes);
        let stitched = graph.stitch_continuous(vehicle.traversal_path());
        vehicle.set_traversal(stitched.path);
        vehicle.record_flow(&request.pickup, &request.destination, request.seats);

        info!(
            "booked {} seats {} -> {} on {} ({} left)",
            request.seats,
            request.pickup,
            request.destination,
            vehicle.id(),
            vehicle.seats_available()
        );
        Ok(())
    }

    fn no_route(&self, request: &TripRequest) -> DispatchError {
        DispatchError::NoRoute {
            pickup: request.pickup.clone(),
            destination: request.destination.clone(),
        }
    }

    /// The vehicle reports reaching `node`. Only its next scheduled stop is
    /// accepted.
    pub fn acknowledge_stop(&self, vehicle_id: &VehicleId, node: &NodeId) -> Result<(), DispatchError> {
        let Some(mut vehicle) = self.fleet.lock(vehicle_id) else {
            warn!("acknowledgment for unknown vehicle {vehicle_id}");
            return Err(DispatchError::UnknownVehicle(vehicle_id.clone()));
        };
        if let Err(err) = vehicle.advance_queue(node) {
            warn!("{err}");
            return Err(err);
        }
        info!("{vehicle_id} reached {node}");
        let update = QueueUpdate::of(&vehicle);
        drop(vehicle);

        self.publish(&update);
        Ok(())
    }

    /// Splice a single stop into a vehicle's traversal path by zone, then
    /// re-stitch the path so it stays contiguous. The queue is not touched.
    pub fn splice_stop(
        &self,
        vehicle_id: &VehicleId,
        node: &NodeId,
        role: StopRole,
    ) -> Result<(), DispatchError> {
        let graph = self.fleet.graph();
        if !graph.contains(node) {
            return Err(DispatchError::UnknownNode(node.clone()));
        }
        let Some(mut vehicle) = self.fleet.lock(vehicle_id) else {
            return Err(DispatchError::UnknownVehicle(vehicle_id.clone()));
        };

        let mut path = vehicle.traversal_path().to_vec();
        insert_stop(graph, &mut path, node, role);
        let stitched = graph.stitch_continuous(&path);
        let path = if path.len() < 2 { path } else { stitched.path };
        debug!("{vehicle_id} traversal after splicing {node}: {} stops", path.len());
        vehicle.set_traversal(path);
        Ok(())
    }

    /// Per-vehicle view of the whole fleet, in fleet order.
    pub fn snapshot_fleet(&self) -> Vec<VehicleSnapshot> {
        self.fleet.snapshot()
    }

    /// Relay `update` unless a newer update for the same vehicle already went
    /// out.
    fn publish(&self, update: &QueueUpdate) {
        let Some(mut relayed) = self.fleet.relay_gate(&update.vehicle_id) else {
            return;
        };
        if update.revision <= *relayed {
            debug!(
                "{} queue update at revision {} superseded by revision {}",
                update.vehicle_id, update.revision, *relayed
            );
            return;
        }
        *relayed = update.revision;
        if let Err(err) = self.relay.publish(update) {
            warn!("queue update not delivered: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{mpsc, Mutex, PoisonError};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::error::RelayError;
    use crate::graph::RouteGraph;
    use crate::relay::NullRelay;
    use crate::scenario::{build_fleet, ScenarioConfig};
    use crate::test_helpers::{dispatcher_for, ids, line_dispatcher, line_scenario, RecordingRelay};

    struct FailingRelay;

    impl QueueRelay for FailingRelay {
        fn publish(&self, update: &QueueUpdate) -> Result<(), RelayError> {
            Err(RelayError {
                vehicle: update.vehicle_id.clone(),
                reason: "controller offline".into(),
            })
        }
    }

    /// Holds up the first update it is handed until the test has seen it.
    struct StallingRelay {
        stalled: Mutex<Option<mpsc::Sender<()>>>,
        log: RecordingRelay,
    }

    impl QueueRelay for StallingRelay {
        fn publish(&self, update: &QueueUpdate) -> Result<(), RelayError> {
            let signal = self
                .stalled
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(signal) = signal {
                let _ = signal.send(());
                thread::sleep(Duration::from_millis(100));
            }
            self.log.publish(update)
        }
    }

    /// Picks the first candidate, then changes it before the dispatcher can
    /// lock it, `bumps` times.
    struct BumpingSelector {
        fleet: Arc<FleetState>,
        bumps: AtomicU32,
    }

    impl VehicleSelector for BumpingSelector {
        fn select<'a>(
            &self,
            _graph: &RouteGraph,
            eligible: &'a [Candidate],
            _pickup: &NodeId,
        ) -> Option<&'a Candidate> {
            let chosen = eligible.first()?;
            let bump = self
                .bumps
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if bump {
                if let Some(mut vehicle) = self.fleet.lock(&chosen.vehicle_id) {
                    vehicle.release_seats(0);
                }
            }
            Some(chosen)
        }
    }

    fn bumping_dispatcher(config: &ScenarioConfig, bumps: u32) -> Dispatcher {
        let fleet = Arc::new(build_fleet(config).expect("fleet"));
        Dispatcher::new(Arc::clone(&fleet), config.dispatch)
            .with_selector(Box::new(BumpingSelector {
                fleet,
                bumps: AtomicU32::new(bumps),
            }))
            .with_relay(Box::new(NullRelay))
    }

    #[test]
    fn zero_seats_is_rejected() {
        let dispatcher = line_dispatcher();
        let err = dispatcher
            .make_booking(&TripRequest::new("A1", "A3", 0))
            .expect_err("zero seats");
        assert_eq!(err, DispatchError::InvalidSeats);
    }

    #[test]
    fn unreachable_destination_leaves_vehicle_untouched() {
        let dispatcher = line_dispatcher();
        let err = dispatcher
            .make_booking(&TripRequest::new("A1", "Z9", 2))
            .expect_err("no path");
        assert!(matches!(err, DispatchError::NoRoute { .. }));
        let snapshot = dispatcher.fleet().vehicle_snapshot(&"V1".into()).expect("V1");
        assert_eq!(snapshot.seats_available, 10);
        assert!(snapshot.queue.is_empty());
    }

    #[test]
    fn relay_failure_keeps_the_booking() {
        let dispatcher = line_dispatcher().with_relay(Box::new(FailingRelay));
        let vehicle = dispatcher
            .make_booking(&TripRequest::new("A1", "A3", 3))
            .expect("booked");
        let snapshot = dispatcher.fleet().vehicle_snapshot(&vehicle).expect("vehicle");
        assert_eq!(snapshot.queue, ids(&["A1", "A2", "A3"]));
        dispatcher
            .acknowledge_stop(&vehicle, &"A1".into())
            .expect("head acknowledged");
    }

    #[test]
    fn relay_sees_bookings_and_acknowledgments() {
        let relay = RecordingRelay::default();
        let dispatcher = line_dispatcher().with_relay(Box::new(relay.clone()));
        let vehicle = dispatcher
            .make_booking(&TripRequest::new("A1", "A3", 1))
            .expect("booked");
        dispatcher
            .acknowledge_stop(&vehicle, &"A1".into())
            .expect("head");
        let _ = dispatcher.acknowledge_stop(&vehicle, &"A3".into());

        let updates = relay.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].queue, ids(&["A1", "A2", "A3"]));
        assert_eq!(updates[1].queue, ids(&["A2", "A3"]));
    }

    #[test]
    fn splice_keeps_traversal_contiguous() {
        let dispatcher = line_dispatcher();
        let vehicle = dispatcher
            .make_booking(&TripRequest::new("A1", "A2", 1))
            .expect("booked");
        dispatcher
            .splice_stop(&vehicle, &"A3".into(), StopRole::Pickup)
            .expect("spliced");
        let snapshot = dispatcher.fleet().vehicle_snapshot(&vehicle).expect("vehicle");
        assert_eq!(snapshot.traversal_path, ids(&["A1", "A2", "A3"]));
        assert_eq!(snapshot.queue, ids(&["A1", "A2"]));
    }

    #[test]
    fn splice_rejects_unknown_nodes() {
        let dispatcher = line_dispatcher();
        let err = dispatcher
            .splice_stop(&"V1".into(), &"Q7".into(), StopRole::Pickup)
            .expect_err("unknown node");
        assert_eq!(err, DispatchError::UnknownNode("Q7".into()));
    }

    #[test]
    fn slow_relay_ends_on_the_current_queue() {
        let (signal, observed) = mpsc::channel();
        let log = RecordingRelay::default();
        let dispatcher = line_dispatcher().with_relay(Box::new(StallingRelay {
            stalled: Mutex::new(Some(signal)),
            log: log.clone(),
        }));
        let v1 = VehicleId::from("V1");

        thread::scope(|scope| {
            scope.spawn(|| {
                dispatcher
                    .make_booking(&TripRequest::new("A1", "A3", 1))
                    .expect("booked")
            });
            observed.recv().expect("booking update reached the relay");
            dispatcher
                .acknowledge_stop(&v1, &"A1".into())
                .expect("head acknowledged");
        });

        let updates = log.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].queue, ids(&["A1", "A2", "A3"]));
        assert_eq!(updates[1].queue, ids(&["A2", "A3"]));
        assert!(updates[0].revision < updates[1].revision);
        let current = dispatcher.fleet().vehicle_snapshot(&v1).expect("V1");
        assert_eq!(updates[1].queue, current.queue);
    }

    #[test]
    fn superseded_update_is_not_relayed() {
        let log = RecordingRelay::default();
        let dispatcher = line_dispatcher().with_relay(Box::new(log.clone()));
        let newer = QueueUpdate {
            vehicle_id: "V1".into(),
            queue: ids(&["A2"]),
            revision: 5,
        };
        let older = QueueUpdate {
            queue: ids(&["A1", "A2"]),
            revision: 4,
            ..newer.clone()
        };

        dispatcher.publish(&newer);
        dispatcher.publish(&older);
        dispatcher.publish(&newer);
        assert_eq!(log.updates(), vec![newer]);
    }

    #[test]
    fn contention_past_the_retry_limit_is_no_route() {
        let config = line_scenario().with_max_selection_retries(0);
        let dispatcher = bumping_dispatcher(&config, u32::MAX);
        let err = dispatcher
            .make_booking(&TripRequest::new("A1", "A3", 1))
            .expect_err("candidate always stale");
        assert!(matches!(err, DispatchError::NoRoute { .. }));

        let snapshot = dispatcher.fleet().vehicle_snapshot(&"V1".into()).expect("V1");
        assert_eq!(snapshot.seats_available, 10);
        assert!(snapshot.queue.is_empty());
    }

    #[test]
    fn default_retries_absorb_brief_contention() {
        let config = line_scenario();
        assert_eq!(config.dispatch, DispatchConfig::default());
        let dispatcher = bumping_dispatcher(&config, config.dispatch.max_selection_retries);
        let vehicle = dispatcher
            .make_booking(&TripRequest::new("A1", "A3", 1))
            .expect("booked on the last attempt");
        assert_eq!(vehicle, VehicleId::from("V1"));
    }

    #[test]
    fn destination_splice_extends_its_zone_run() {
        // One-way ring A1 -> A2 -> A3 -> A4 -> A1.
        let config = ScenarioConfig::empty()
            .with_edge("A1", "A2", 1.0)
            .with_edge("A2", "A3", 1.0)
            .with_edge("A3", "A4", 1.0)
            .with_edge("A4", "A1", 1.0)
            .with_vehicle("V1", 4);
        let dispatcher = dispatcher_for(&config);
        let vehicle = dispatcher
            .make_booking(&TripRequest::new("A1", "A3", 1))
            .expect("booked");

        dispatcher
            .splice_stop(&vehicle, &"A1".into(), StopRole::Destination)
            .expect("spliced");
        let snapshot = dispatcher.fleet().vehicle_snapshot(&vehicle).expect("vehicle");
        assert_eq!(snapshot.traversal_path, ids(&["A1", "A2", "A3", "A4"]));
        assert!(dispatcher.fleet().graph().is_contiguous(&snapshot.traversal_path));
        assert_eq!(snapshot.queue, ids(&["A1", "A2", "A3"]));
    }
}
