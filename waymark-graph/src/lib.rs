//! Node-based graph assembly, edge-expansion and contraction hierarchy
//! construction for the waymark-route preprocessing core (spec §4.3-§4.5).

pub mod assembly;
pub mod ch;
pub mod ebg;
pub mod scc;
pub mod turn;

pub use assembly::AssembledGraph;
pub use ch::{contract, ContractionResult, CsrEdge, DEFAULT_CORE_FACTOR};
pub use ebg::{build_edge_based_graph, EdgeBasedGraph, EdgeBasedNode, TurnArc};
pub use scc::{adjacency_from_edges, compute_scc, Adjacency, SccResult};

use waymark_io::ch_file::ChEdgeRecord;

/// Converts a finished contraction into the on-disk edge record shape
/// (spec §6). Kept separate from `ch::contract` so the contraction module
/// has no dependency on `waymark-io`'s wire format.
pub fn to_ch_edge_records(result: &ContractionResult) -> Vec<ChEdgeRecord> {
    result
        .edges
        .iter()
        .map(|e| ChEdgeRecord {
            target: e.target,
            weight: e.weight,
            forward: e.forward,
            backward: e.backward,
            is_shortcut: e.is_shortcut,
            middle_or_original_id: e.middle_or_original_id,
        })
        .collect()
}
