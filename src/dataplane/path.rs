//! Shortest-path computation over the topology graph

use crate::switch::SwitchId;
use crate::topology::TopologyGraph;
use crate::{Error, Result};
use std::collections::{HashMap, VecDeque};

/// Minimum hop-count path from `src` to `dst`, both ends included.
///
/// Breadth-first search, so the result is always a simple path. `src == dst`
/// yields `[src]` as long as the switch is in the graph.
pub fn shortest_path(graph: &TopologyGraph, src: SwitchId, dst: SwitchId) -> Result<Vec<SwitchId>> {
    let unreachable = || Error::NotReachable { src, dst };

    if !graph.contains(src) || !graph.contains(dst) {
        return Err(unreachable());
    }
    if src == dst {
        return Ok(vec![src]);
    }

    // predecessor of each visited switch
    let mut parent: HashMap<SwitchId, SwitchId> = HashMap::new();
    let mut queue = VecDeque::from([src]);

    'search: while let Some(current) = queue.pop_front() {
        for next in graph.neighbors(current) {
            if next == src || parent.contains_key(&next) {
                continue;
            }
            parent.insert(next, current);
            if next == dst {
                break 'search;
            }
            queue.push_back(next);
        }
    }

    if !parent.contains_key(&dst) {
        return Err(unreachable());
    }

    let mut path = vec![dst];
    let mut current = dst;
    while let Some(&prev) = parent.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    Ok(path)
}
