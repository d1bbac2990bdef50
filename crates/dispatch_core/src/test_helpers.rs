//! Test helpers for common test setup and utilities.
//!
//! This module provides shared fixtures so unit tests, integration tests and
//! benchmarks build the same graphs and fleets.

use std::sync::{Arc, Mutex, PoisonError};

use crate::dispatcher::Dispatcher;
use crate::error::RelayError;
use crate::graph::{NodeId, RouteGraph};
use crate::relay::{NullRelay, QueueRelay, QueueUpdate};
use crate::scenario::{build_fleet, ScenarioConfig};

/// Turn string literals into node ids.
pub fn ids(raw: &[&str]) -> Vec<NodeId> {
    raw.iter().map(|s| NodeId::from(*s)).collect()
}

/// A1 - A2 - A3, two-way roads of weight 2.
pub fn line_scenario() -> ScenarioConfig {
    ScenarioConfig::empty()
        .with_road("A1", "A2", 2.0)
        .with_road("A2", "A3", 2.0)
        .with_vehicle("V1", 10)
        .with_vehicle("V2", 10)
}

/// Road graph of [`ScenarioConfig::default`].
///
/// # Panics
///
/// Panics if the default scenario stops being a valid graph (should never happen).
pub fn three_zone_graph() -> RouteGraph {
    RouteGraph::new(
        ScenarioConfig::default()
            .graph
            .into_iter()
            .map(|(node, edges)| (node, edges.into_iter())),
    )
    .expect("default scenario graph is valid")
}

/// Dispatcher over [`line_scenario`] that drops relay updates.
///
/// # Panics
///
/// Panics if the line scenario is invalid (should never happen).
pub fn line_dispatcher() -> Dispatcher {
    dispatcher_for(&line_scenario())
}

/// Dispatcher over the default three-zone scenario that drops relay updates.
pub fn three_zone_dispatcher() -> Dispatcher {
    dispatcher_for(&ScenarioConfig::default())
}

/// Dispatcher over any scenario, with relay updates dropped.
///
/// # Panics
///
/// Panics if `config` is invalid.
pub fn dispatcher_for(config: &ScenarioConfig) -> Dispatcher {
    let fleet = build_fleet(config).expect("test scenario should be valid");
    Dispatcher::new(Arc::new(fleet), config.dispatch).with_relay(Box::new(NullRelay))
}

/// Relay that keeps every update it is handed. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingRelay {
    updates: Arc<Mutex<Vec<QueueUpdate>>>,
}

impl RecordingRelay {
    pub fn updates(&self) -> Vec<QueueUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl QueueRelay for RecordingRelay {
    fn publish(&self, update: &QueueUpdate) -> Result<(), RelayError> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(update.clone());
        Ok(())
    }
}
