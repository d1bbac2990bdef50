//! Step files: a JSON list of bookings, acknowledgments and splices, applied
//! in order.

use std::error::Error;
use std::fs;
use std::path::Path;

use dispatch_core::zone_insertion::StopRole;
use dispatch_core::{Dispatcher, NodeId, TripRequest, VehicleId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Book(TripRequest),
    Ack {
        vehicle_id: VehicleId,
        node: NodeId,
    },
    Splice {
        vehicle_id: VehicleId,
        node: NodeId,
        role: StopRole,
    },
}

/// Result of one step, printed as one JSON line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<VehicleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn load_steps(path: &Path) -> Result<Vec<Step>, Box<dyn Error>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn replay(dispatcher: &Dispatcher, steps: &[Step]) -> Vec<StepOutcome> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let result = match step {
                Step::Book(request) => dispatcher.make_booking(request).map(Some),
                Step::Ack { vehicle_id, node } => {
                    dispatcher.acknowledge_stop(vehicle_id, node).map(|()| None)
                }
                Step::Splice {
                    vehicle_id,
                    node,
                    role,
                } => dispatcher
                    .splice_stop(vehicle_id, node, *role)
                    .map(|()| None),
            };
            match result {
                Ok(vehicle_id) => StepOutcome {
                    step: index,
                    ok: true,
                    vehicle_id,
                    error: None,
                },
                Err(err) => StepOutcome {
                    step: index,
                    ok: false,
                    vehicle_id: None,
                    error: Some(err.to_string()),
                },
            }
        })
        .collect()
}
