use std::sync::Arc;

use log::info;

use super::params::ScenarioConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ScenarioError;
use crate::fleet::FleetState;
use crate::graph::RouteGraph;
use crate::vehicle::Vehicle;

/// Validate `config` and build the road graph and the fleet it describes.
pub fn build_fleet(config: &ScenarioConfig) -> Result<FleetState, ScenarioError> {
    let graph = RouteGraph::with_cache_capacity(
        config
            .graph
            .iter()
            .map(|(node, edges)| (node.clone(), edges.iter().cloned())),
        config.dispatch.path_cache_capacity,
    )?;
    let vehicles = config
        .vehicles
        .iter()
        .map(|spec| Vehicle::new(spec.id.clone(), spec.capacity));
    let fleet = FleetState::new(graph, vehicles)?;
    info!(
        "fleet ready: {} vehicles on {} nodes / {} edges",
        fleet.len(),
        fleet.graph().node_count(),
        fleet.graph().edge_count()
    );
    Ok(fleet)
}

/// Build the fleet and a dispatcher over it with the default selector and
/// relay.
pub fn build_dispatcher(config: &ScenarioConfig) -> Result<Dispatcher, ScenarioError> {
    let fleet = build_fleet(config)?;
    Ok(Dispatcher::new(Arc::new(fleet), config.dispatch))
}
