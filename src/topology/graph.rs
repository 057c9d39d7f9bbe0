//! Directed switch graph built from a topology snapshot

use super::{Link, Switch, TopologySource};
use crate::switch::{PortNo, SwitchId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Ports used by a directed edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgePorts {
    /// Port on the source switch leading to the neighbor
    pub src_port: PortNo,
    /// Port on the neighbor the traffic arrives on
    pub dst_port: PortNo,
}

impl EdgePorts {
    fn reversed(self) -> Self {
        Self {
            src_port: self.dst_port,
            dst_port: self.src_port,
        }
    }
}

/// Immutable directed graph keyed by switch id.
///
/// Built fresh for every decision. Ordered maps keep neighbor iteration, and
/// therefore path selection among equal-cost paths, deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyGraph {
    adjacency: BTreeMap<SwitchId, BTreeMap<SwitchId, EdgePorts>>,
}

impl TopologyGraph {
    /// Build the graph from the current discovery snapshot.
    pub fn build(source: &dyn TopologySource) -> Self {
        Self::from_parts(&source.all_switches(), &source.all_links())
    }

    /// Every switch becomes a node and every link a directed edge. A link
    /// whose reverse direction was not discovered also gets a synthesized
    /// reverse edge with the ports swapped; discovered edges always take
    /// precedence over synthesized ones. Links touching unknown switches are
    /// skipped.
    pub fn from_parts(switches: &[Switch], links: &[Link]) -> Self {
        let mut adjacency: BTreeMap<SwitchId, BTreeMap<SwitchId, EdgePorts>> = switches
            .iter()
            .map(|s| (s.id, BTreeMap::new()))
            .collect();

        let known: Vec<&Link> = links
            .iter()
            .filter(|link| {
                let ok = adjacency.contains_key(&link.src.switch)
                    && adjacency.contains_key(&link.dst.switch);
                if !ok {
                    trace!(
                        "Skipping link {}/{} -> {}/{}: unknown switch",
                        link.src.switch,
                        link.src.port,
                        link.dst.switch,
                        link.dst.port
                    );
                }
                ok
            })
            .collect();

        let mut discovered = BTreeSet::new();
        for link in &known {
            let ports = EdgePorts {
                src_port: link.src.port,
                dst_port: link.dst.port,
            };
            if let Some(edges) = adjacency.get_mut(&link.src.switch) {
                edges.insert(link.dst.switch, ports);
            }
            discovered.insert((link.src.switch, link.dst.switch));
        }

        for link in &known {
            let (src, dst) = (link.src.switch, link.dst.switch);
            if discovered.contains(&(dst, src)) {
                continue;
            }
            let reverse = EdgePorts {
                src_port: link.src.port,
                dst_port: link.dst.port,
            }
            .reversed();
            if let Some(edges) = adjacency.get_mut(&dst) {
                trace!("Synthesizing reverse edge {} -> {}", dst, src);
                edges.entry(src).or_insert(reverse);
            }
        }

        Self { adjacency }
    }

    pub fn contains(&self, switch: SwitchId) -> bool {
        self.adjacency.contains_key(&switch)
    }

    pub fn edge(&self, src: SwitchId, dst: SwitchId) -> Option<EdgePorts> {
        self.adjacency.get(&src)?.get(&dst).copied()
    }

    /// Outgoing neighbors of `switch`, ascending by id.
    pub fn neighbors(&self, switch: SwitchId) -> impl Iterator<Item = SwitchId> + '_ {
        self.adjacency
            .get(&switch)
            .into_iter()
            .flat_map(|edges| edges.keys().copied())
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Endpoint, StaticTopology};

    fn ep(switch: u64, port: PortNo) -> Endpoint {
        Endpoint::new(SwitchId(switch), port)
    }

    fn switches(ids: &[u64]) -> Vec<Switch> {
        ids.iter()
            .map(|&id| Switch {
                id: SwitchId(id),
                ports: vec![1, 2, 3],
            })
            .collect()
    }

    #[test]
    fn test_empty_snapshot_gives_empty_graph() {
        let graph = TopologyGraph::build(&StaticTopology::new());
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_bidirectional_links_kept_as_discovered() {
        let links = [
            Link {
                src: ep(1, 2),
                dst: ep(2, 3),
            },
            Link {
                src: ep(2, 3),
                dst: ep(1, 2),
            },
        ];
        let graph = TopologyGraph::from_parts(&switches(&[1, 2]), &links);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(
            graph.edge(SwitchId(1), SwitchId(2)),
            Some(EdgePorts {
                src_port: 2,
                dst_port: 3
            })
        );
        assert_eq!(
            graph.edge(SwitchId(2), SwitchId(1)),
            Some(EdgePorts {
                src_port: 3,
                dst_port: 2
            })
        );
    }

    #[test]
    fn test_reverse_edge_synthesized_for_one_way_link() {
        let links = [Link {
            src: ep(1, 2),
            dst: ep(2, 3),
        }];
        let graph = TopologyGraph::from_parts(&switches(&[1, 2]), &links);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(
            graph.edge(SwitchId(2), SwitchId(1)),
            Some(EdgePorts {
                src_port: 3,
                dst_port: 2
            })
        );
    }

    #[test]
    fn test_discovered_edge_wins_over_synthesized() {
        // 2 -> 1 discovered on a different port pair than 1 -> 2 implies
        let links = [
            Link {
                src: ep(1, 2),
                dst: ep(2, 3),
            },
            Link {
                src: ep(2, 1),
                dst: ep(1, 1),
            },
        ];
        let graph = TopologyGraph::from_parts(&switches(&[1, 2]), &links);

        assert_eq!(graph.edge(SwitchId(2), SwitchId(1)).unwrap().src_port, 1);
        assert_eq!(graph.edge(SwitchId(1), SwitchId(2)).unwrap().src_port, 2);
    }

    #[test]
    fn test_links_to_unknown_switches_skipped() {
        let links = [Link {
            src: ep(1, 2),
            dst: ep(9, 1),
        }];
        let graph = TopologyGraph::from_parts(&switches(&[1]), &links);

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.contains(SwitchId(9)));
    }

    #[test]
    fn test_neighbors_sorted() {
        let links = [
            Link {
                src: ep(1, 3),
                dst: ep(3, 1),
            },
            Link {
                src: ep(1, 2),
                dst: ep(2, 1),
            },
        ];
        let graph = TopologyGraph::from_parts(&switches(&[1, 2, 3]), &links);
        let n: Vec<SwitchId> = graph.neighbors(SwitchId(1)).collect();
        assert_eq!(n, vec![SwitchId(2), SwitchId(3)]);
        assert_eq!(graph.neighbors(SwitchId(7)).count(), 0);
    }
}
