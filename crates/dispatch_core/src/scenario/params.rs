use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;
use crate::graph::{NodeId, DEFAULT_PATH_CACHE_CAPACITY};
use crate::vehicle::VehicleId;

/// Seats per vehicle in the default scenario.
pub const DEFAULT_VEHICLE_CAPACITY: u32 = 10;

/// How often a booking re-runs selection when the chosen vehicle changed
/// between scoring and locking.
pub const DEFAULT_MAX_SELECTION_RETRIES: u32 = 3;

/// Dispatcher tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_selection_retries: u32,
    /// Shortest-path trees kept by the road graph.
    pub path_cache_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_selection_retries: DEFAULT_MAX_SELECTION_RETRIES,
            path_cache_capacity: DEFAULT_PATH_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSpec {
    pub id: VehicleId,
    pub capacity: u32,
}

/// Everything needed to build a fleet: the road graph, the vehicles and the
/// dispatcher tunables.
///
/// `Default` is the three-zone demo network: zones A, B and C each hold a
/// line of three stops two apart, and the third stops of neighbouring zones
/// are joined by roads of weight three. Two vehicles, V1 and V2, with ten
/// seats each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub graph: BTreeMap<NodeId, Vec<(NodeId, f64)>>,
    pub vehicles: Vec<VehicleSpec>,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        let mut config = Self::empty();
        for zone in ['A', 'B', 'C'] {
            config = config
                .with_road(&format!("{zone}1"), &format!("{zone}2"), 2.0)
                .with_road(&format!("{zone}2"), &format!("{zone}3"), 2.0);
        }
        config
            .with_road("A3", "B3", 3.0)
            .with_road("B3", "C3", 3.0)
            .with_vehicle("V1", DEFAULT_VEHICLE_CAPACITY)
            .with_vehicle("V2", DEFAULT_VEHICLE_CAPACITY)
    }
}

impl ScenarioConfig {
    /// No roads, no vehicles.
    pub fn empty() -> Self {
        Self {
            graph: BTreeMap::new(),
            vehicles: Vec::new(),
            dispatch: DispatchConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// One-way edge.
    pub fn with_edge(mut self, from: &str, to: &str, weight: f64) -> Self {
        self.graph
            .entry(NodeId::from(from))
            .or_default()
            .push((NodeId::from(to), weight));
        self
    }

    /// Two-way road: an edge in each direction.
    pub fn with_road(self, a: &str, b: &str, weight: f64) -> Self {
        self.with_edge(a, b, weight).with_edge(b, a, weight)
    }

    pub fn with_vehicle(mut self, id: &str, capacity: u32) -> Self {
        self.vehicles.push(VehicleSpec {
            id: VehicleId::from(id),
            capacity,
        });
        self
    }

    pub fn with_max_selection_retries(mut self, retries: u32) -> Self {
        self.dispatch.max_selection_retries = retries;
        self
    }

    pub fn with_path_cache_capacity(mut self, capacity: usize) -> Self {
        self.dispatch.path_cache_capacity = capacity;
        self
    }
}
