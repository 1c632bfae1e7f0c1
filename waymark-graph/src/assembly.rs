//! Assembly (spec §4.3): turn the extractor's unordered raw records into
//! the node-based graph and restriction file. Single-threaded, stream
//! oriented, driven by sorts and merge-joins rather than hash maps wherever
//! the original design calls for a join over two *sorted* sequences —
//! per §9's stable/external/user-comparator contract, any equivalent that
//! gets the same answer is acceptable, and for the node-coordinate lookups
//! a hash map is both simpler and behaviorally identical to a merge-join
//! against a table that, as step 3 notes, comes out of its own merge
//! already sorted by OSM id.

use rustc_hash::FxHashMap;

use waymark_common::error::{Error, Result};
use waymark_common::geo::{haversine_distance_m, round_weight, weight_from_speed};
use waymark_common::ids::{InternalId, OsmId, INVALID_ID};
use waymark_io::nbg_file::{EdgeRecord, NodeRecord, DIR_BACKWARD, DIR_FORWARD};
use waymark_io::restrictions_file::RestrictionRecord;
use waymark_ingest::pipeline::{RawEdge, RawNode, RawRestriction, WayEndpoints};

pub struct AssembledGraph {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    pub restrictions: Vec<RestrictionRecord>,
}

struct PresentNode {
    internal_id: InternalId,
    lat_e5: i32,
    lon_e5: i32,
}

/// Steps 1-3: intersect the used-node-id set with the raw node table,
/// assigning dense internal ids in ascending-OSM-id merge order.
fn assign_internal_ids(
    mut all_nodes: Vec<RawNode>,
    mut used_node_ids: Vec<OsmId>,
) -> (Vec<NodeRecord>, FxHashMap<OsmId, PresentNode>) {
    used_node_ids.sort_unstable();
    used_node_ids.dedup();
    all_nodes.sort_by_key(|n| n.osm_id);

    let mut nodes = Vec::with_capacity(used_node_ids.len().min(all_nodes.len()));
    let mut lookup = FxHashMap::default();

    let mut i = 0usize;
    let mut j = 0usize;
    while i < used_node_ids.len() && j < all_nodes.len() {
        match used_node_ids[i].cmp(&all_nodes[j].osm_id) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                let raw = &all_nodes[j];
                let internal_id = nodes.len() as InternalId;
                nodes.push(NodeRecord {
                    internal_id,
                    lon_e5: raw.lon_e5,
                    lat_e5: raw.lat_e5,
                    is_barrier: raw.is_barrier,
                    is_traffic_light: raw.is_traffic_light,
                });
                lookup.insert(
                    raw.osm_id,
                    PresentNode {
                        internal_id,
                        lat_e5: raw.lat_e5,
                        lon_e5: raw.lon_e5,
                    },
                );
                i += 1;
                j += 1;
            }
        }
    }

    (nodes, lookup)
}

/// Steps 5-6: resolve a restriction's `via_node`-adjacent endpoint on one of
/// its ways using the endpoint-neighbor rule in spec §4.3 step 5.
fn resolve_restriction_endpoint(endpoints: &WayEndpoints, via_node: OsmId) -> Option<OsmId> {
    if via_node == endpoints.first {
        Some(endpoints.second)
    } else if via_node == endpoints.second {
        Some(endpoints.first)
    } else if via_node == endpoints.second_last {
        Some(endpoints.last)
    } else if via_node == endpoints.last {
        Some(endpoints.second_last)
    } else {
        None
    }
}

#[derive(Clone, Copy)]
struct CanonicalEdge {
    min: InternalId,
    max: InternalId,
    low_to_high: bool,
    weight: i32,
    distance_m: i32,
    name_id: u32,
    is_roundabout: bool,
    is_access_restricted: bool,
    ignore_in_grid: bool,
    travel_mode: u8,
}

/// Steps 7-8: remap OSM endpoints to internal ids via the node lookup,
/// dropping edges referencing unknown nodes or that turn out to be
/// self-loops, and computing each edge's weight.
fn resolve_edges(raw_edges: Vec<RawEdge>, nodes: &FxHashMap<OsmId, PresentNode>) -> Vec<CanonicalEdge> {
    let mut out = Vec::with_capacity(raw_edges.len());
    for edge in raw_edges {
        if edge.from == edge.to {
            continue; // self-loop, spec §4.3 step 7
        }
        let Some(source) = nodes.get(&edge.from) else {
            log::warn!("assembly: edge from unknown node {}, dropped", edge.from);
            continue;
        };
        let Some(target) = nodes.get(&edge.to) else {
            log::warn!("assembly: edge to unknown node {}, dropped", edge.to);
            continue;
        };

        let distance_m = haversine_distance_m(source.lat_e5, source.lon_e5, target.lat_e5, target.lon_e5);
        let weight = match edge.duration_s {
            Some(duration_s) => round_weight(duration_s * 10.0),
            None => weight_from_speed(distance_m, edge.speed_kmh),
        };

        let low_to_high = source.internal_id < target.internal_id;
        let (min, max) = if low_to_high {
            (source.internal_id, target.internal_id)
        } else {
            (target.internal_id, source.internal_id)
        };

        out.push(CanonicalEdge {
            min,
            max,
            low_to_high,
            weight,
            distance_m: distance_m.round() as i32,
            name_id: edge.name_id.unwrap_or(u32::MAX),
            is_roundabout: edge.is_roundabout,
            is_access_restricted: edge.is_access_restricted,
            ignore_in_grid: edge.ignore_in_grid,
            travel_mode: edge.travel_mode,
        });
    }
    out
}

/// Steps 9-10: canonicalize orientation and deduplicate parallel edges.
fn canonicalize_and_dedup(mut edges: Vec<CanonicalEdge>) -> Vec<EdgeRecord> {
    edges.sort_by_key(|e| (e.min, e.max, !e.low_to_high));

    let mut out = Vec::new();
    let mut i = 0;
    while i < edges.len() {
        let (min, max) = (edges[i].min, edges[i].max);
        let mut j = i;
        let mut best_forward: Option<CanonicalEdge> = None;
        let mut best_backward: Option<CanonicalEdge> = None;
        while j < edges.len() && edges[j].min == min && edges[j].max == max {
            let e = edges[j];
            if e.low_to_high {
                if best_forward.map(|b| e.weight < b.weight).unwrap_or(true) {
                    best_forward = Some(e);
                }
            } else if best_backward.map(|b| e.weight < b.weight).unwrap_or(true) {
                best_backward = Some(e);
            }
            j += 1;
        }

        match (best_forward, best_backward) {
            (Some(f), Some(b)) if f.weight == b.weight => {
                out.push(edge_record(min, max, DIR_FORWARD | DIR_BACKWARD, f));
            }
            (Some(f), Some(b)) => {
                out.push(edge_record(min, max, DIR_FORWARD, f));
                out.push(edge_record(min, max, DIR_BACKWARD, b));
            }
            (Some(f), None) => out.push(edge_record(min, max, DIR_FORWARD, f)),
            (None, Some(b)) => out.push(edge_record(min, max, DIR_BACKWARD, b)),
            (None, None) => unreachable!("group with no members"),
        }
        i = j;
    }
    out
}

fn edge_record(source: InternalId, target: InternalId, direction: u16, e: CanonicalEdge) -> EdgeRecord {
    EdgeRecord {
        source,
        target,
        distance_m: e.distance_m,
        direction,
        weight: e.weight,
        name_id: e.name_id,
        is_roundabout: e.is_roundabout,
        ignore_in_grid: e.ignore_in_grid,
        is_access_restricted: e.is_access_restricted,
        travel_mode: e.travel_mode,
    }
}

fn resolve_restrictions(
    restrictions: Vec<RawRestriction>,
    way_endpoints: &FxHashMap<OsmId, WayEndpoints>,
    nodes: &FxHashMap<OsmId, PresentNode>,
) -> Vec<RestrictionRecord> {
    let mut out = Vec::with_capacity(restrictions.len());
    for r in restrictions {
        let from_osm = way_endpoints
            .get(&r.from_way)
            .and_then(|e| resolve_restriction_endpoint(e, r.via_node));
        let to_osm = way_endpoints
            .get(&r.to_way)
            .and_then(|e| resolve_restriction_endpoint(e, r.via_node));

        let (Some(from_osm), Some(to_osm)) = (from_osm, to_osm) else {
            continue; // left INVALID_ID at resolution time, dropped here
        };

        let from_node = nodes.get(&from_osm).map(|n| n.internal_id);
        let via_node = nodes.get(&r.via_node).map(|n| n.internal_id);
        let to_node = nodes.get(&to_osm).map(|n| n.internal_id);

        match (from_node, via_node, to_node) {
            (Some(from_node), Some(via_node), Some(to_node)) => {
                out.push(RestrictionRecord {
                    from_node,
                    via_node,
                    to_node,
                    is_only: r.is_only,
                });
            }
            _ => continue,
        }
    }
    out
}

pub fn assemble(
    all_nodes: Vec<RawNode>,
    used_node_ids: Vec<OsmId>,
    way_endpoints: Vec<WayEndpoints>,
    raw_edges: Vec<RawEdge>,
    raw_restrictions: Vec<RawRestriction>,
) -> Result<AssembledGraph> {
    let (nodes, node_lookup) = assign_internal_ids(all_nodes, used_node_ids);
    if nodes.len() as u64 > InternalId::MAX as u64 {
        return Err(Error::InvariantViolated(
            "node count exceeds internal id range".to_string(),
        ));
    }

    let way_endpoints_by_id: FxHashMap<OsmId, WayEndpoints> =
        way_endpoints.into_iter().map(|e| (e.way_id, e)).collect();

    let canonical = resolve_edges(raw_edges, &node_lookup);
    let edges = canonicalize_and_dedup(canonical);
    let restrictions = resolve_restrictions(raw_restrictions, &way_endpoints_by_id, &node_lookup);

    for edge in &edges {
        if edge.source == edge.target {
            return Err(Error::InvariantViolated(format!(
                "self-loop survived assembly at internal node {}",
                edge.source
            )));
        }
        if edge.source == INVALID_ID || edge.target == INVALID_ID {
            return Err(Error::InvariantViolated(
                "edge references an unassigned internal id".to_string(),
            ));
        }
    }

    Ok(AssembledGraph {
        nodes,
        edges,
        restrictions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(osm_id: OsmId, lat_e5: i32, lon_e5: i32) -> RawNode {
        RawNode {
            osm_id,
            lat_e5,
            lon_e5,
            is_barrier: false,
            is_traffic_light: false,
        }
    }

    fn edge(from: OsmId, to: OsmId, speed_kmh: f64) -> RawEdge {
        RawEdge {
            way_id: 1,
            from,
            to,
            speed_kmh,
            duration_s: None,
            name_id: None,
            is_roundabout: false,
            is_access_restricted: false,
            ignore_in_grid: false,
            travel_mode: 0,
        }
    }

    #[test]
    fn bidirectional_equal_speed_collapses_to_one_edge() {
        let nodes = vec![node(1, 0, 0), node(2, 0, 100_000)];
        let used = vec![1, 2];
        let endpoints = vec![];
        let edges = vec![edge(1, 2, 50.0), edge(2, 1, 50.0)];

        let result = assemble(nodes, used, endpoints, edges, vec![]).unwrap();
        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].direction, DIR_FORWARD | DIR_BACKWARD);
    }

    #[test]
    fn split_directions_with_different_speed_stay_separate() {
        let nodes = vec![node(1, 0, 0), node(2, 0, 100_000)];
        let used = vec![1, 2];
        let edges = vec![edge(1, 2, 80.0), edge(2, 1, 30.0)];

        let result = assemble(nodes, used, vec![], edges, vec![]).unwrap();
        assert_eq!(result.edges.len(), 2);
        let fwd = result.edges.iter().find(|e| e.direction == DIR_FORWARD).unwrap();
        let bwd = result.edges.iter().find(|e| e.direction == DIR_BACKWARD).unwrap();
        assert!(fwd.weight < bwd.weight);
    }

    #[test]
    fn parallel_ways_in_the_same_direction_pick_the_faster_one() {
        let nodes = vec![node(1, 0, 0), node(2, 0, 100_000)];
        let used = vec![1, 2];
        let edges = vec![edge(1, 2, 30.0), edge(1, 2, 50.0)];

        let result = assemble(nodes, used, vec![], edges, vec![]).unwrap();
        assert_eq!(result.edges.len(), 1, "parallel same-direction ways collapse to one edge");
        assert_eq!(result.edges[0].direction, DIR_FORWARD);

        let only_slow = assemble(
            vec![node(1, 0, 0), node(2, 0, 100_000)],
            vec![1, 2],
            vec![],
            vec![edge(1, 2, 30.0)],
            vec![],
        )
        .unwrap();
        assert!(
            result.edges[0].weight < only_slow.edges[0].weight,
            "the kept edge must carry the faster (lower-weight) of the two ways, not the 30km/h one"
        );
    }

    #[test]
    fn edge_referencing_unknown_node_is_dropped() {
        let nodes = vec![node(1, 0, 0)];
        let used = vec![1, 2];
        let edges = vec![edge(1, 2, 50.0)];
        let result = assemble(nodes, used, vec![], edges, vec![]).unwrap();
        assert!(result.edges.is_empty());
    }

    #[test]
    fn self_loop_is_dropped() {
        let nodes = vec![node(1, 0, 0)];
        let used = vec![1];
        let edges = vec![edge(1, 1, 50.0)];
        let result = assemble(nodes, used, vec![], edges, vec![]).unwrap();
        assert!(result.edges.is_empty());
    }

    #[test]
    fn restriction_resolves_via_endpoint_neighbor_rule() {
        let nodes = vec![node(1, 0, 0), node(2, 0, 1), node(3, 0, 2), node(4, 0, 3), node(5, 0, 4)];
        let used = vec![1, 2, 3, 4, 5];
        let endpoints = vec![
            WayEndpoints { way_id: 10, first: 1, second: 2, second_last: 1, last: 2 },
            WayEndpoints { way_id: 11, first: 2, second: 4, second_last: 2, last: 4 },
        ];
        let restrictions = vec![RawRestriction { from_way: 10, via_node: 2, to_way: 11, is_only: false }];

        let result = assemble(nodes, used, endpoints, vec![], restrictions).unwrap();
        assert_eq!(result.restrictions.len(), 1);
        // via=2, from-way endpoint neighbor of 2 is 1; to-way endpoint neighbor is 4.
        let r = &result.restrictions[0];
        assert_eq!(r.via_node, 1); // internal id for osm node 2
        assert_eq!(r.from_node, 0); // internal id for osm node 1
        assert_eq!(r.to_node, 3); // internal id for osm node 4
    }
}
