//! Strongly-connected components (spec §4.4.1): iterative Tarjan, converted
//! from recursion to an explicit stack of frames so it survives graphs with
//! millions of nodes without blowing the call stack — the same reason the
//! original source's `TarjanSCC` keeps its own `TarjanStackFrame` stack
//! instead of recursing.

use waymark_common::ids::InternalId;
use waymark_io::nbg_file::{EdgeRecord, DIR_BACKWARD, DIR_FORWARD};

/// Directed adjacency: `forward[v]` lists every `w` such that a traversable
/// edge `v -> w` exists in the node-based graph.
pub struct Adjacency {
    pub forward: Vec<Vec<InternalId>>,
}

/// Builds the directed adjacency `compute_scc` needs from the assembled
/// node-based edge list, expanding each edge's direction bits (spec
/// §4.4.1 runs SCC on the node-based graph, before edge-expansion).
pub fn adjacency_from_edges(node_count: usize, edges: &[EdgeRecord]) -> Adjacency {
    let mut forward = vec![Vec::new(); node_count];
    for edge in edges {
        if edge.direction & DIR_FORWARD != 0 {
            forward[edge.source as usize].push(edge.target);
        }
        if edge.direction & DIR_BACKWARD != 0 {
            forward[edge.target as usize].push(edge.source);
        }
    }
    Adjacency { forward }
}

pub const TINY_COMPONENT_THRESHOLD: usize = 1000;

pub struct SccResult {
    /// `component_of[v]` is the component id assigned to node `v`.
    pub component_of: Vec<u32>,
    /// `is_tiny[v]` is true iff the component containing `v` has fewer than
    /// [`TINY_COMPONENT_THRESHOLD`] nodes (SPEC_FULL.md §11: tiny
    /// components are tagged, not removed).
    pub is_tiny: Vec<bool>,
}

struct Frame {
    node: InternalId,
    child_index: usize,
}

/// Iterative Tarjan's algorithm. Assignment order of component ids is
/// unspecified (spec §4.4.1: "only the equivalence classes matter").
pub fn compute_scc(adjacency: &Adjacency) -> SccResult {
    let n = adjacency.forward.len();
    let mut index = vec![u32::MAX; n];
    let mut low_link = vec![u32::MAX; n];
    let mut on_stack = vec![false; n];
    let mut component_of = vec![u32::MAX; n];

    let mut tarjan_stack: Vec<InternalId> = Vec::new();
    let mut next_index: u32 = 0;
    let mut next_component: u32 = 0;
    let mut component_sizes: Vec<usize> = Vec::new();
    let mut last_progress = 0usize;

    for start in 0..n {
        if n > 0 {
            let progress = start * 100 / n;
            if progress > last_progress {
                last_progress = progress;
                if last_progress % 10 == 0 {
                    log::info!("scc labeling {}% ({} components so far)", last_progress, next_component);
                }
            }
        }

        if index[start] != u32::MAX {
            continue;
        }

        let mut frames: Vec<Frame> = vec![Frame {
            node: start as InternalId,
            child_index: 0,
        }];

        while let Some(frame) = frames.last_mut() {
            let v = frame.node as usize;

            if frame.child_index == 0 {
                index[v] = next_index;
                low_link[v] = next_index;
                next_index += 1;
                tarjan_stack.push(v as InternalId);
                on_stack[v] = true;
            }

            let neighbors = &adjacency.forward[v];
            if frame.child_index < neighbors.len() {
                let w = neighbors[frame.child_index] as usize;
                frame.child_index += 1;

                if index[w] == u32::MAX {
                    frames.push(Frame {
                        node: w as InternalId,
                        child_index: 0,
                    });
                } else if on_stack[w] {
                    low_link[v] = low_link[v].min(index[w]);
                }
                continue;
            }

            // All neighbors visited: close this frame.
            frames.pop();
            if let Some(parent_frame) = frames.last_mut() {
                let parent = parent_frame.node as usize;
                low_link[parent] = low_link[parent].min(low_link[v]);
            }

            if low_link[v] == index[v] {
                let component_id = next_component;
                next_component += 1;
                let mut size = 0;
                loop {
                    let w = tarjan_stack.pop().unwrap() as usize;
                    on_stack[w] = false;
                    component_of[w] = component_id;
                    size += 1;
                    if w == v {
                        break;
                    }
                }
                component_sizes.push(size);
            }
        }
    }

    let is_tiny = component_of
        .iter()
        .map(|&c| component_sizes[c as usize] < TINY_COMPONENT_THRESHOLD)
        .collect();

    SccResult {
        component_of,
        is_tiny,
    }
}
