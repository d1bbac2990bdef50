//! Zone-ordered splicing of a single stop into a consolidated path.
//!
//! Stops are grouped by zone (the first character of the node id). A new stop
//! is placed after the last stop of its own zone, or after the closest lower
//! zone when its zone is not on the path yet, so same-zone stops stay
//! together. The nodes of the shortest path from that anchor to the new stop
//! are spliced in right after the anchor, skipping nodes already on the path.

use std::cmp::Ordering;
use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::graph::{NodeId, RouteGraph};

/// Whether the stop starts a trip or ends one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopRole {
    Pickup,
    Destination,
}

/// Splice `node` into `path` according to its zone.
///
/// A destination is placed relative to its own latest occurrence on the path;
/// if it does not occur yet, the path is left as is.
pub fn insert_stop(graph: &RouteGraph, path: &mut Vec<NodeId>, node: &NodeId, role: StopRole) {
    let search_from = match role {
        StopRole::Pickup => {
            if path.is_empty() {
                if graph.contains(node) {
                    path.push(node.clone());
                }
                return;
            }
            0
        }
        StopRole::Destination => match path.iter().rposition(|stop| stop == node) {
            Some(index) => index,
            None => {
                debug!("destination {node} is not on the path yet, nothing to splice");
                return;
            }
        },
    };

    let anchor = anchor_index(path, search_from, node.zone()).unwrap_or(path.len() - 1);
    splice_after(graph, path, anchor, node);
}

/// Index of the stop a new stop of `zone` should follow, looking only at
/// `path[from..]`.
///
/// The last stop of the same zone if there is one; otherwise the last stop of
/// a lower zone seen before the first stop of a higher zone.
fn anchor_index(path: &[NodeId], from: usize, zone: Option<char>) -> Option<usize> {
    let tail = &path[from..];
    if let Some(offset) = tail.iter().rposition(|stop| stop.zone() == zone) {
        return Some(from + offset);
    }

    let mut nearest = None;
    for (offset, stop) in tail.iter().enumerate() {
        match stop.zone().cmp(&zone) {
            Ordering::Less => nearest = Some(from + offset),
            Ordering::Greater => break,
            Ordering::Equal => {}
        }
    }
    nearest
}

fn splice_after(graph: &RouteGraph, path: &mut Vec<NodeId>, anchor: usize, node: &NodeId) {
    let route = graph.shortest_path(&path[anchor], node);
    if route.is_empty() {
        debug!("no path from {} to {node}, nothing to splice", path[anchor]);
        return;
    }

    let mut present: HashSet<NodeId> = path.iter().cloned().collect();
    let mut at = anchor + 1;
    for stop in route.nodes {
        if present.insert(stop.clone()) {
            path.insert(at, stop);
            at += 1;
        }
    }
}
