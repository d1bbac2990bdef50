//! Vehicle selection: which eligible vehicle should serve a new pickup.

use log::debug;

use crate::graph::{NodeId, RouteGraph};
use crate::vehicle::{Vehicle, VehicleId};

/// What a selector sees of one vehicle that has room for the trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub vehicle_id: VehicleId,
    pub queue_head: Option<NodeId>,
    /// Vehicle revision at the time the candidate was taken.
    pub revision: u64,
}

impl Candidate {
    pub fn of(vehicle: &Vehicle) -> Self {
        Self {
            vehicle_id: vehicle.id().clone(),
            queue_head: vehicle.queue_head().cloned(),
            revision: vehicle.revision(),
        }
    }
}

/// Trait for vehicle selection heuristics.
///
/// Implementations must be deterministic for a given candidate order, and
/// must be `Send + Sync` so one dispatcher can serve concurrent callers.
pub trait VehicleSelector: Send + Sync {
    /// Pick a candidate for a pickup at `pickup`, or `None` if no candidate
    /// can serve it.
    fn select<'a>(
        &self,
        graph: &RouteGraph,
        eligible: &'a [Candidate],
        pickup: &NodeId,
    ) -> Option<&'a Candidate>;
}

/// Prefers idle vehicles, then the vehicle whose next stop is closest to the
/// pickup.
///
/// # Algorithm Behavior
///
/// 1. The first candidate with an empty queue wins outright (distance 0).
/// 2. Otherwise each candidate is scored by the shortest-path distance from
///    its queue head to the pickup, and the smallest score wins.
/// 3. Ties go to the candidate seen first. Candidates that cannot reach the
///    pickup at all are never chosen.
#[derive(Debug, Default)]
pub struct NearestQueueHead;

impl VehicleSelector for NearestQueueHead {
    fn select<'a>(
        &self,
        graph: &RouteGraph,
        eligible: &'a [Candidate],
        pickup: &NodeId,
    ) -> Option<&'a Candidate> {
        let mut best: Option<(&Candidate, f64)> = None;
        for candidate in eligible {
            let Some(head) = &candidate.queue_head else {
                debug!("{} is idle, taking pickup at {pickup}", candidate.vehicle_id);
                return Some(candidate);
            };
            let distance = graph.shortest_path(head, pickup).distance;
            debug!(
                "{}: head {head} is {distance} from pickup {pickup}",
                candidate.vehicle_id
            );
            if distance.is_finite() && best.map_or(true, |(_, min)| distance < min) {
                best = Some((candidate, distance));
            }
        }
        best.map(|(candidate, _)| candidate)
    }
}
