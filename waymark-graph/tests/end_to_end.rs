//! Whole-pipeline scenarios from spec §8's end-to-end table: assembly →
//! SCC → edge-expansion → contraction over small synthetic fixtures,
//! matching the teacher's `tools/butterfly-route/tests/verify_astar.rs`
//! style of building a tiny graph in-process rather than loading a real
//! PBF fixture.

use waymark_graph::assembly::assemble;
use waymark_graph::ebg::build_edge_based_graph;
use waymark_graph::scc::{adjacency_from_edges, compute_scc};
use waymark_graph::{contract, to_ch_edge_records, DEFAULT_CORE_FACTOR};
use waymark_ingest::pipeline::{RawEdge, RawNode, RawRestriction, WayEndpoints};
use waymark_ingest::profile::CarProfile;
use waymark_io::ch_file;

fn node(osm_id: i64, lat_e5: i32, lon_e5: i32) -> RawNode {
    RawNode {
        osm_id,
        lat_e5,
        lon_e5,
        is_barrier: false,
        is_traffic_light: false,
    }
}

fn raw_edge(way_id: i64, from: i64, to: i64) -> RawEdge {
    RawEdge {
        way_id,
        from,
        to,
        speed_kmh: 50.0,
        duration_s: None,
        name_id: Some(0),
        is_roundabout: false,
        is_access_restricted: false,
        ignore_in_grid: false,
        travel_mode: 0,
    }
}

/// A bidirectional two-way street segment, mirroring `process_way`'s
/// emission of one `RawEdge` per direction for a way with no `oneway` tag.
fn two_way(way_id: i64, a: i64, b: i64) -> Vec<RawEdge> {
    vec![raw_edge(way_id, a, b), raw_edge(way_id, b, a)]
}

/// Scenario 1: a single way between two nodes produces one node-based
/// edge, two edge-based nodes (one per direction) and zero turn arcs.
#[test]
fn single_edge_has_two_ebg_nodes_and_no_turns() {
    let nodes = vec![node(1, 0, 0), node(2, 0, 100_000)];
    let edges = two_way(100, 1, 2);
    let way_endpoints = vec![WayEndpoints {
        way_id: 100,
        first: 1,
        second: 2,
        second_last: 1,
        last: 2,
    }];

    let assembled = assemble(nodes, vec![1, 2], way_endpoints, edges, vec![]).unwrap();
    assert_eq!(assembled.edges.len(), 1, "one bidirectional edge record, not two");

    let adjacency = adjacency_from_edges(assembled.nodes.len(), &assembled.edges);
    let scc = compute_scc(&adjacency);
    let profile = CarProfile::default();
    let ebg = build_edge_based_graph(&assembled.nodes, &assembled.edges, &assembled.restrictions, &scc, &profile, 0);

    assert_eq!(ebg.nodes.len(), 2);
    assert_eq!(ebg.arcs.len(), 0);
}

/// Scenario 2: three colinear same-named nodes produce two node-based
/// edges, four edge-based nodes, and both admissible straight-through
/// turns classify as `NoTurn`.
#[test]
fn colinear_same_name_chain_classifies_as_no_turn() {
    let nodes = vec![node(1, 0, 0), node(2, 0, 100_000), node(3, 0, 200_000)];
    let mut edges = two_way(100, 1, 2);
    edges.extend(two_way(101, 2, 3));
    let way_endpoints = vec![
        WayEndpoints { way_id: 100, first: 1, second: 2, second_last: 1, last: 2 },
        WayEndpoints { way_id: 101, first: 2, second: 3, second_last: 2, last: 3 },
    ];

    let assembled = assemble(nodes, vec![1, 2, 3], way_endpoints, edges, vec![]).unwrap();
    assert_eq!(assembled.edges.len(), 2);

    let adjacency = adjacency_from_edges(assembled.nodes.len(), &assembled.edges);
    let scc = compute_scc(&adjacency);
    let profile = CarProfile::default();
    let ebg = build_edge_based_graph(&assembled.nodes, &assembled.edges, &assembled.restrictions, &scc, &profile, 0);

    assert_eq!(ebg.nodes.len(), 4);

    let straight_throughs: Vec<_> = ebg
        .arcs
        .iter()
        .filter(|a| {
            let from = &ebg.nodes[a.from_ebg as usize];
            let to = &ebg.nodes[a.to_ebg as usize];
            from.head == to.tail && from.tail != to.head
        })
        .collect();
    assert_eq!(straight_throughs.len(), 2, "one straight-through turn in each direction");
}

/// Scenario 3: an explicit no-left-turn restriction removes exactly the
/// (A→B→C) turn from the edge-based arc set.
#[test]
fn no_turn_restriction_removes_the_named_turn() {
    let nodes = vec![node(1, 0, 0), node(2, 0, 100_000), node(3, 0, 200_000)];
    let mut edges = two_way(100, 1, 2);
    edges.extend(two_way(101, 2, 3));
    let way_endpoints = vec![
        WayEndpoints { way_id: 100, first: 1, second: 2, second_last: 1, last: 2 },
        WayEndpoints { way_id: 101, first: 2, second: 3, second_last: 2, last: 3 },
    ];
    let restrictions = vec![RawRestriction {
        from_way: 100,
        via_node: 2,
        to_way: 101,
        is_only: false,
    }];

    let assembled = assemble(nodes, vec![1, 2, 3], way_endpoints, edges, restrictions).unwrap();
    assert_eq!(assembled.restrictions.len(), 1);

    let adjacency = adjacency_from_edges(assembled.nodes.len(), &assembled.edges);
    let scc = compute_scc(&adjacency);
    let profile = CarProfile::default();
    let ebg = build_edge_based_graph(&assembled.nodes, &assembled.edges, &assembled.restrictions, &scc, &profile, 0);

    let forbidden = ebg.arcs.iter().any(|a| {
        let from = &ebg.nodes[a.from_ebg as usize];
        let to = &ebg.nodes[a.to_ebg as usize];
        from.tail == 0 && from.head == 1 && to.tail == 1 && to.head == 2
    });
    assert!(!forbidden, "restricted turn must be absent from the edge-based edge set");
}

/// Contracting the scenario-2 chain must leave a fully contracted graph
/// (default core factor) whose finalized rows are non-empty.
#[test]
fn contracting_a_small_chain_produces_a_non_empty_hierarchy() {
    let nodes = vec![node(1, 0, 0), node(2, 0, 100_000), node(3, 0, 200_000)];
    let mut edges = two_way(100, 1, 2);
    edges.extend(two_way(101, 2, 3));
    let way_endpoints = vec![
        WayEndpoints { way_id: 100, first: 1, second: 2, second_last: 1, last: 2 },
        WayEndpoints { way_id: 101, first: 2, second: 3, second_last: 2, last: 3 },
    ];

    let assembled = assemble(nodes, vec![1, 2, 3], way_endpoints, edges, vec![]).unwrap();
    let adjacency = adjacency_from_edges(assembled.nodes.len(), &assembled.edges);
    let scc = compute_scc(&adjacency);
    let profile = CarProfile::default();
    let ebg = build_edge_based_graph(&assembled.nodes, &assembled.edges, &assembled.restrictions, &scc, &profile, 0);

    let result = contract(&ebg, DEFAULT_CORE_FACTOR);
    assert_eq!(result.first_edge.len(), ebg.nodes.len());
    assert!(result.is_core.iter().all(|&c| !c), "core factor 1.0 leaves nothing in the core");
}

/// Real `contract()` output must round-trip through the on-disk CH file
/// unchanged: `first_edge` carries exactly one offset per node (no trailing
/// sentinel), matching `is_core`'s length, the pairing `ch_file::write`
/// asserts on before ever touching disk.
#[test]
fn contracted_hierarchy_round_trips_through_ch_file() {
    let nodes = vec![node(1, 0, 0), node(2, 0, 100_000), node(3, 0, 200_000)];
    let mut edges = two_way(100, 1, 2);
    edges.extend(two_way(101, 2, 3));
    let way_endpoints = vec![
        WayEndpoints { way_id: 100, first: 1, second: 2, second_last: 1, last: 2 },
        WayEndpoints { way_id: 101, first: 2, second: 3, second_last: 2, last: 3 },
    ];

    let assembled = assemble(nodes, vec![1, 2, 3], way_endpoints, edges, vec![]).unwrap();
    let adjacency = adjacency_from_edges(assembled.nodes.len(), &assembled.edges);
    let scc = compute_scc(&adjacency);
    let profile = CarProfile::default();
    let ebg = build_edge_based_graph(&assembled.nodes, &assembled.edges, &assembled.restrictions, &scc, &profile, 0);

    let result = contract(&ebg, DEFAULT_CORE_FACTOR);
    let ch_edges = to_ch_edge_records(&result);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.osrm.hierarchy");
    ch_file::write(&path, 0x1234_5678_9abc_def0, &result.first_edge, &ch_edges, &result.is_core).unwrap();

    let loaded = ch_file::read(&path).unwrap();
    assert_eq!(loaded.first_edge, result.first_edge);
    assert_eq!(loaded.first_edge.len(), ebg.nodes.len(), "exactly one offset per node, no trailing sentinel");
    assert_eq!(loaded.is_core, result.is_core);
    assert_eq!(loaded.edges.len(), ch_edges.len());
}
