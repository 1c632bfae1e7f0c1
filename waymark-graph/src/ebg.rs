//! Edge-based graph construction (spec §4.4): nodes are directed node-based
//! edges, arcs are admissible turns between them. Grounded in the teacher's
//! `ebg::build_adjacency` (incoming/outgoing-by-via-node indexing, one pass
//! per via node pairing every incoming edge with every outgoing edge) with
//! the turn-rule and mode-mask machinery replaced by spec §4.4.3's
//! restriction/barrier/dead-end admissibility rules.
//!
//! Node-based edges here are never compressed chains (assembly keeps every
//! surviving OSM node as its own graph node), so a node-based edge's "last
//! segment" and "first segment" bearings are simply its own endpoint-to-
//! endpoint bearing — the general compressed-chain case in spec §4.4.2
//! collapses to this one.

use rustc_hash::FxHashMap;

use waymark_common::geo::bearing_deci_degrees;
use waymark_common::ids::InternalId;
use waymark_io::nbg_file::{EdgeRecord, NodeRecord, DIR_BACKWARD, DIR_FORWARD};
use waymark_io::restrictions_file::RestrictionRecord;
use waymark_ingest::profile::Profile;

use crate::scc::SccResult;
use crate::turn::{self, TurnContext, TurnInstruction, TurnWeightInputs};

/// One directed node-based edge, i.e. one edge-based node (spec §4.4.2).
#[derive(Debug, Clone, Copy)]
pub struct EdgeBasedNode {
    pub tail: InternalId,
    pub head: InternalId,
    /// Index into the node-based edge list this direction was taken from.
    pub source_edge_index: u32,
    pub weight: i32,
    pub distance_m: i32,
    pub name_id: u32,
    pub is_roundabout: bool,
    pub travel_mode: u8,
    pub component_id: u32,
    pub in_tiny_component: bool,
}

/// An admissible turn (spec §4.4.3-§4.4.5).
#[derive(Debug, Clone, Copy)]
pub struct TurnArc {
    pub from_ebg: u32,
    pub to_ebg: u32,
    pub weight: i32,
    pub instruction: TurnInstruction,
}

pub struct EdgeBasedGraph {
    pub nodes: Vec<EdgeBasedNode>,
    pub arcs: Vec<TurnArc>,
    /// CRC-64 of the node-based edge list, stamped into the CH output so a
    /// query binary can refuse to load data built from a different graph.
    pub source_checksum: u64,
}

fn edge_based_nodes(edges: &[EdgeRecord], scc: &SccResult) -> Vec<EdgeBasedNode> {
    let mut out = Vec::with_capacity(edges.len() * 2);
    for (index, edge) in edges.iter().enumerate() {
        let tiny = scc.is_tiny[edge.source as usize] && scc.is_tiny[edge.target as usize];
        let component_id = if tiny {
            scc.component_of[edge.source as usize].min(scc.component_of[edge.target as usize])
        } else {
            scc.component_of[edge.source as usize]
        };

        if edge.direction & DIR_FORWARD != 0 {
            out.push(EdgeBasedNode {
                tail: edge.source,
                head: edge.target,
                source_edge_index: index as u32,
                weight: edge.weight,
                distance_m: edge.distance_m,
                name_id: edge.name_id,
                is_roundabout: edge.is_roundabout,
                travel_mode: edge.travel_mode,
                component_id,
                in_tiny_component: tiny,
            });
        }
        if edge.direction & DIR_BACKWARD != 0 {
            out.push(EdgeBasedNode {
                tail: edge.target,
                head: edge.source,
                source_edge_index: index as u32,
                weight: edge.weight,
                distance_m: edge.distance_m,
                name_id: edge.name_id,
                is_roundabout: edge.is_roundabout,
                travel_mode: edge.travel_mode,
                component_id,
                in_tiny_component: tiny,
            });
        }
    }
    out
}

struct RestrictionIndex {
    only: FxHashMap<(InternalId, InternalId), InternalId>,
    banned: std::collections::HashSet<(InternalId, InternalId, InternalId)>,
}

fn index_restrictions(restrictions: &[RestrictionRecord]) -> RestrictionIndex {
    let mut only = FxHashMap::default();
    let mut banned = std::collections::HashSet::new();
    for r in restrictions {
        if r.is_only {
            only.insert((r.from_node, r.via_node), r.to_node);
        } else {
            banned.insert((r.from_node, r.via_node, r.to_node));
        }
    }
    RestrictionIndex { only, banned }
}

pub fn build_edge_based_graph(
    nbg_nodes: &[NodeRecord],
    nbg_edges: &[EdgeRecord],
    restrictions: &[RestrictionRecord],
    scc: &SccResult,
    profile: &dyn Profile,
    source_checksum: u64,
) -> EdgeBasedGraph {
    let ebg_nodes = edge_based_nodes(nbg_edges, scc);
    let restriction_index = index_restrictions(restrictions);
    let use_restrictions = profile.use_turn_restrictions();

    let mut incoming_by_nbg: Vec<Vec<u32>> = vec![Vec::new(); nbg_nodes.len()];
    let mut outgoing_by_nbg: Vec<Vec<u32>> = vec![Vec::new(); nbg_nodes.len()];
    for (ebg_id, n) in ebg_nodes.iter().enumerate() {
        outgoing_by_nbg[n.tail as usize].push(ebg_id as u32);
        incoming_by_nbg[n.head as usize].push(ebg_id as u32);
    }

    let mut arcs = Vec::new();

    for via in 0..nbg_nodes.len() {
        let incoming = &incoming_by_nbg[via];
        let outgoing = &outgoing_by_nbg[via];
        if incoming.is_empty() || outgoing.is_empty() {
            continue;
        }

        let via_node = &nbg_nodes[via];
        let is_dead_end = outgoing.len() == 1;

        for &a_id in incoming {
            let a = &ebg_nodes[a_id as usize];
            for &b_id in outgoing {
                let b = &ebg_nodes[b_id as usize];
                let is_reverse = a.tail == b.head;

                if is_reverse && !is_dead_end {
                    continue;
                }
                if via_node.is_barrier && !is_reverse {
                    continue;
                }
                if use_restrictions {
                    if let Some(&only_to) = restriction_index.only.get(&(a.tail, via as InternalId)) {
                        if b.head != only_to {
                            continue;
                        }
                    }
                    if restriction_index
                        .banned
                        .contains(&(a.tail, via as InternalId, b.head))
                    {
                        continue;
                    }
                }

                let from_bearing = bearing_deci_degrees(
                    nbg_nodes[a.tail as usize].lat_e5,
                    nbg_nodes[a.tail as usize].lon_e5,
                    via_node.lat_e5,
                    via_node.lon_e5,
                );
                let to_bearing = bearing_deci_degrees(
                    via_node.lat_e5,
                    via_node.lon_e5,
                    nbg_nodes[b.head as usize].lat_e5,
                    nbg_nodes[b.head as usize].lon_e5,
                );
                let angle = turn::turn_angle_degrees(from_bearing, to_bearing);
                let is_u_turn = turn::is_u_turn(angle);

                let profile_turn_penalty_ds = if profile.has_turn_penalty_function() {
                    profile.turn_function(angle)
                } else {
                    0
                };

                let weight = turn::turn_weight_ds(&TurnWeightInputs {
                    segment_weight_ds: a.weight,
                    via_is_traffic_light: via_node.is_traffic_light,
                    traffic_signal_penalty_ds: profile.traffic_signal_penalty_ds(),
                    u_turn_penalty_ds: profile.u_turn_penalty_ds(),
                    profile_turn_penalty_ds,
                    is_u_turn,
                });

                let same_name = a.name_id == b.name_id && a.name_id != u32::MAX;
                let instruction = turn::classify_instruction(&TurnContext {
                    angle_degrees: angle,
                    from_is_roundabout: a.is_roundabout,
                    to_is_roundabout: b.is_roundabout,
                    via_out_degree: outgoing.len() as u32,
                    same_name,
                });

                arcs.push(TurnArc {
                    from_ebg: a_id,
                    to_ebg: b_id,
                    weight,
                    instruction,
                });
            }
        }
    }

    EdgeBasedGraph {
        nodes: ebg_nodes,
        arcs,
        source_checksum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_ingest::profile::CarProfile;

    fn node(internal_id: InternalId, lat_e5: i32, lon_e5: i32) -> NodeRecord {
        NodeRecord {
            internal_id,
            lon_e5,
            lat_e5,
            is_barrier: false,
            is_traffic_light: false,
        }
    }

    fn edge(source: InternalId, target: InternalId, direction: u16) -> EdgeRecord {
        EdgeRecord {
            source,
            target,
            distance_m: 100,
            direction,
            weight: 100,
            name_id: u32::MAX,
            is_roundabout: false,
            ignore_in_grid: false,
            is_access_restricted: false,
            travel_mode: 0,
        }
    }

    fn scc_all_distinct(n: usize) -> SccResult {
        SccResult {
            component_of: (0..n as u32).collect(),
            is_tiny: vec![false; n],
        }
    }

    #[test]
    fn straight_chain_emits_one_admissible_turn_each_way() {
        let nodes = vec![node(0, 0, 0), node(1, 0, 1000), node(2, 0, 2000)];
        let edges = vec![
            edge(0, 1, DIR_FORWARD | DIR_BACKWARD),
            edge(1, 2, DIR_FORWARD | DIR_BACKWARD),
        ];
        let scc = scc_all_distinct(3);
        let profile = CarProfile::default();

        let graph = build_edge_based_graph(&nodes, &edges, &[], &scc, &profile, 0);
        assert_eq!(graph.nodes.len(), 4);

        let forward_turn = graph
            .arcs
            .iter()
            .find(|a| {
                let from = &graph.nodes[a.from_ebg as usize];
                let to = &graph.nodes[a.to_ebg as usize];
                from.tail == 0 && from.head == 1 && to.tail == 1 && to.head == 2
            })
            .expect("straight continuation should be admissible");
        assert!(forward_turn.weight >= 100);
    }

    #[test]
    fn reverse_turn_is_excluded_except_at_dead_end() {
        let nodes = vec![node(0, 0, 0), node(1, 0, 1000), node(2, 0, 2000)];
        let edges = vec![
            edge(0, 1, DIR_FORWARD | DIR_BACKWARD),
            edge(1, 2, DIR_FORWARD | DIR_BACKWARD),
        ];
        let scc = scc_all_distinct(3);
        let profile = CarProfile::default();
        let graph = build_edge_based_graph(&nodes, &edges, &[], &scc, &profile, 0);

        // At node 1 (degree 4: two in, two out), the 0->1 => 1->0 reversal
        // must not appear since node 1 is not a dead end.
        let reversal_exists = graph.arcs.iter().any(|a| {
            let from = &graph.nodes[a.from_ebg as usize];
            let to = &graph.nodes[a.to_ebg as usize];
            from.tail == 0 && from.head == 1 && to.tail == 1 && to.head == 0
        });
        assert!(!reversal_exists);
    }

    #[test]
    fn dead_end_allows_u_turn() {
        let nodes = vec![node(0, 0, 0), node(1, 0, 1000)];
        let edges = vec![edge(0, 1, DIR_FORWARD | DIR_BACKWARD)];
        let scc = scc_all_distinct(2);
        let profile = CarProfile::default();
        let graph = build_edge_based_graph(&nodes, &edges, &[], &scc, &profile, 0);

        let u_turn_exists = graph.arcs.iter().any(|a| {
            let from = &graph.nodes[a.from_ebg as usize];
            let to = &graph.nodes[a.to_ebg as usize];
            from.tail == 0 && from.head == 1 && to.tail == 1 && to.head == 0
        });
        assert!(u_turn_exists, "dead end must allow the U-turn");
    }

    #[test]
    fn barrier_node_restricts_to_u_turns_only() {
        let mut nodes = vec![node(0, 0, 0), node(1, 0, 1000), node(2, 0, 2000)];
        nodes[1].is_barrier = true;
        let edges = vec![
            edge(0, 1, DIR_FORWARD | DIR_BACKWARD),
            edge(1, 2, DIR_FORWARD | DIR_BACKWARD),
        ];
        let scc = scc_all_distinct(3);
        let profile = CarProfile::default();
        let graph = build_edge_based_graph(&nodes, &edges, &[], &scc, &profile, 0);

        let straight_through = graph.arcs.iter().any(|a| {
            let from = &graph.nodes[a.from_ebg as usize];
            let to = &graph.nodes[a.to_ebg as usize];
            from.tail == 0 && from.head == 1 && to.tail == 1 && to.head == 2
        });
        assert!(!straight_through, "barrier node must reject straight-through turns");
    }

    #[test]
    fn only_restriction_admits_exactly_its_target() {
        let nodes = vec![
            node(0, 0, 0),
            node(1, 0, 1000),
            node(2, 0, 2000),
            node(3, 1000, 1000),
        ];
        let edges = vec![
            edge(0, 1, DIR_FORWARD | DIR_BACKWARD),
            edge(1, 2, DIR_FORWARD | DIR_BACKWARD),
            edge(1, 3, DIR_FORWARD | DIR_BACKWARD),
        ];
        let scc = scc_all_distinct(4);
        let profile = CarProfile::default();
        let restrictions = vec![RestrictionRecord {
            from_node: 0,
            via_node: 1,
            to_node: 3,
            is_only: true,
        }];

        let graph = build_edge_based_graph(&nodes, &edges, &restrictions, &scc, &profile, 0);
        let to_two = graph.arcs.iter().any(|a| {
            let from = &graph.nodes[a.from_ebg as usize];
            let to = &graph.nodes[a.to_ebg as usize];
            from.tail == 0 && from.head == 1 && to.tail == 1 && to.head == 2
        });
        let to_three = graph.arcs.iter().any(|a| {
            let from = &graph.nodes[a.from_ebg as usize];
            let to = &graph.nodes[a.to_ebg as usize];
            from.tail == 0 && from.head == 1 && to.tail == 1 && to.head == 3
        });
        assert!(!to_two, "only-restriction must exclude every other target");
        assert!(to_three, "only-restriction must admit its declared target");
    }

    #[test]
    fn no_restriction_rejects_its_triple() {
        let nodes = vec![node(0, 0, 0), node(1, 0, 1000), node(2, 0, 2000)];
        let edges = vec![
            edge(0, 1, DIR_FORWARD | DIR_BACKWARD),
            edge(1, 2, DIR_FORWARD | DIR_BACKWARD),
        ];
        let scc = scc_all_distinct(3);
        let profile = CarProfile::default();
        let restrictions = vec![RestrictionRecord {
            from_node: 0,
            via_node: 1,
            to_node: 2,
            is_only: false,
        }];

        let graph = build_edge_based_graph(&nodes, &edges, &restrictions, &scc, &profile, 0);
        let forbidden = graph.arcs.iter().any(|a| {
            let from = &graph.nodes[a.from_ebg as usize];
            let to = &graph.nodes[a.to_ebg as usize];
            from.tail == 0 && from.head == 1 && to.tail == 1 && to.head == 2
        });
        assert!(!forbidden);
    }

    #[test]
    fn tiny_component_tags_edge_based_node_with_min_component() {
        let nodes = vec![node(0, 0, 0), node(1, 0, 1000)];
        let edges = vec![edge(0, 1, DIR_FORWARD)];
        let scc = SccResult {
            component_of: vec![5, 2],
            is_tiny: vec![true, true],
        };
        let profile = CarProfile::default();
        let graph = build_edge_based_graph(&nodes, &edges, &[], &scc, &profile, 0);
        assert_eq!(graph.nodes[0].component_id, 2);
        assert!(graph.nodes[0].in_tiny_component);
    }

    #[test]
    fn edge_touching_only_one_tiny_endpoint_is_not_tagged_tiny() {
        let nodes = vec![node(0, 0, 0), node(1, 0, 1000)];
        let edges = vec![edge(0, 1, DIR_FORWARD)];
        let scc = SccResult {
            component_of: vec![5, 2],
            is_tiny: vec![true, false],
        };
        let profile = CarProfile::default();
        let graph = build_edge_based_graph(&nodes, &edges, &[], &scc, &profile, 0);
        assert_eq!(graph.nodes[0].component_id, 5, "untagged edge keeps its source's own component");
        assert!(
            !graph.nodes[0].in_tiny_component,
            "a directed segment merely touching a tiny dead-end must not be tagged tiny"
        );
    }
}
