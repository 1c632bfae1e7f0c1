//! Extractor pipeline (spec §4.2): reader thread draining the primitive
//! source into a bounded queue of batches, worker pool applying profile
//! callbacks and folding results into shared, mutex-guarded accumulators.
//!
//! A "block" in the source's sense (a few thousand primitives, self
//! delimited) becomes, here, a `Vec<Primitive>` batch of up to
//! `BATCH_SIZE` entries — `osmpbf` hands primitives to the reader one at a
//! time rather than as raw blocks, so batching is synthesized at this
//! layer instead of inherited from the wire format. The bounded-queue and
//! sentinel-shutdown contract is unchanged.

use std::sync::{Arc, Mutex};
use std::thread;

use rustc_hash::FxHashMap;

use waymark_common::error::{Error, Result};
use waymark_common::geo::is_mercator_safe;
use waymark_common::ids::OsmId;

use crate::primitive::{for_each_primitive, MemberKind, Primitive};
use crate::profile::Profile;
use crate::queue::BoundedQueue;

/// Default queue capacity (spec §4.2: "a small constant, e.g. 2500").
pub const DEFAULT_QUEUE_CAPACITY: usize = 2500;
const BATCH_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawNode {
    pub osm_id: OsmId,
    pub lat_e5: i32,
    pub lon_e5: i32,
    pub is_barrier: bool,
    pub is_traffic_light: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WayEndpoints {
    pub way_id: OsmId,
    pub first: OsmId,
    pub second: OsmId,
    pub second_last: OsmId,
    pub last: OsmId,
}

#[derive(Debug, Clone)]
pub struct RawEdge {
    pub way_id: OsmId,
    pub from: OsmId,
    pub to: OsmId,
    pub speed_kmh: f64,
    pub duration_s: Option<f64>,
    pub name_id: Option<u32>,
    pub is_roundabout: bool,
    pub is_access_restricted: bool,
    pub ignore_in_grid: bool,
    pub travel_mode: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRestriction {
    pub from_way: OsmId,
    pub via_node: OsmId,
    pub to_way: OsmId,
    pub is_only: bool,
}

/// String-interning map shared across workers (spec §4.2 "Shared-state
/// discipline"). Assigned IDs are dense (0, 1, 2, ...) and stable for the
/// life of the map, satisfying the only contract the spec names.
#[derive(Default)]
pub struct NameInterner {
    ids: FxHashMap<String, u32>,
    names: Vec<String>,
}

impl NameInterner {
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

#[derive(Default)]
struct SharedState {
    all_nodes: Mutex<Vec<RawNode>>,
    used_node_ids: Mutex<Vec<OsmId>>,
    way_endpoints: Mutex<Vec<WayEndpoints>>,
    edges: Mutex<Vec<RawEdge>>,
    restrictions: Mutex<Vec<RawRestriction>>,
    names: Mutex<NameInterner>,
}

pub struct ExtractionResult {
    pub all_nodes: Vec<RawNode>,
    pub used_node_ids: Vec<OsmId>,
    pub way_endpoints: Vec<WayEndpoints>,
    pub edges: Vec<RawEdge>,
    pub restrictions: Vec<RawRestriction>,
    pub names: Vec<String>,
}

fn process_node(profile: &dyn Profile, osm_id: OsmId, lat_e5: i32, lon_e5: i32, tags: &crate::primitive::Tags, state: &SharedState) {
    if !is_mercator_safe(lat_e5) {
        return;
    }
    let out = profile.node_function(tags);
    state.all_nodes.lock().unwrap().push(RawNode {
        osm_id,
        lat_e5,
        lon_e5,
        is_barrier: out.barrier,
        is_traffic_light: out.traffic_light,
    });
}

fn process_way(profile: &dyn Profile, way: &crate::primitive::WayPrimitive, state: &SharedState) {
    let out = profile.way_function(&way.tags);
    if !out.is_traversable() || way.refs.len() < 2 {
        return;
    }

    let name_id = out
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .map(|n| state.names.lock().unwrap().intern(n));

    let refs = &way.refs;
    state.way_endpoints.lock().unwrap().push(WayEndpoints {
        way_id: way.osm_id,
        first: refs[0],
        second: refs[1],
        second_last: refs[refs.len() - 2],
        last: refs[refs.len() - 1],
    });
    state.used_node_ids.lock().unwrap().extend(refs.iter().copied());

    let mut new_edges = Vec::new();
    let make = |from: OsmId, to: OsmId, speed_kmh: f64| RawEdge {
        way_id: way.osm_id,
        from,
        to,
        speed_kmh,
        duration_s: out.duration_s,
        name_id,
        is_roundabout: out.is_roundabout,
        is_access_restricted: out.is_access_restricted,
        ignore_in_grid: out.ignore_in_grid,
        travel_mode: out.travel_mode,
    };

    if out.forward_speed_kmh > 0.0 {
        new_edges.extend(refs.windows(2).map(|p| make(p[0], p[1], out.forward_speed_kmh)));
    }
    if out.backward_speed_kmh > 0.0 {
        new_edges.extend(refs.windows(2).map(|p| make(p[1], p[0], out.backward_speed_kmh)));
    }
    state.edges.lock().unwrap().extend(new_edges);
}

fn process_relation(profile: &dyn Profile, relation: &crate::primitive::RelationPrimitive, state: &SharedState) {
    let is_restriction = relation
        .tags
        .iter()
        .any(|(k, v)| (k == "type" && v == "restriction") || k.starts_with("restriction"));
    if !is_restriction {
        return;
    }

    if let Some((_, except)) = relation.tags.iter().find(|(k, _)| k == "except") {
        let exceptions = profile.exceptions();
        if except.split(';').any(|mode| exceptions.contains(&mode.trim())) {
            return;
        }
    }

    let is_only = relation
        .tags
        .iter()
        .find(|(k, _)| k.starts_with("restriction"))
        .map(|(_, v)| v.starts_with("only_"))
        .unwrap_or(false);

    let member_way = |role: &str| {
        relation
            .members
            .iter()
            .find(|m| m.role == role && m.kind == MemberKind::Way)
            .map(|m| m.ref_id)
    };
    let via_node = relation
        .members
        .iter()
        .find(|m| m.role == "via" && m.kind == MemberKind::Node)
        .map(|m| m.ref_id);

    let (Some(from_way), Some(via_node), Some(to_way)) = (member_way("from"), via_node, member_way("to")) else {
        // way-via restrictions are out of scope (spec §4.2); any relation
        // missing a node-via or a from/to way is dropped silently.
        return;
    };

    state.restrictions.lock().unwrap().push(RawRestriction {
        from_way,
        via_node,
        to_way,
        is_only,
    });
}

/// Run the full extractor pipeline over `path` with the given profile
/// factory (one fresh `Profile` instance per worker thread) and worker
/// count.
pub fn run_extract(
    path: impl AsRef<std::path::Path>,
    profile_factory: impl Fn() -> Box<dyn Profile> + Send + Sync + 'static,
    num_workers: usize,
    queue_capacity: usize,
) -> Result<ExtractionResult> {
    let path = path.as_ref().to_path_buf();
    let queue: Arc<BoundedQueue<Option<Vec<Primitive>>>> =
        Arc::new(BoundedQueue::new(queue_capacity.max(1)));
    let state = Arc::new(SharedState::default());
    let reader_error: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));
    let profile_factory = Arc::new(profile_factory);

    let reader_queue = Arc::clone(&queue);
    let reader_error_slot = Arc::clone(&reader_error);
    let reader = thread::spawn(move || {
        let mut batch = Vec::with_capacity(BATCH_SIZE);
        let result = for_each_primitive(&path, |primitive| {
            batch.push(primitive);
            if batch.len() >= BATCH_SIZE {
                reader_queue.push(Some(std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE))));
            }
        });
        if !batch.is_empty() {
            reader_queue.push(Some(batch));
        }
        if let Err(e) = result {
            *reader_error_slot.lock().unwrap() = Some(e);
        }
        reader_queue.push(None);
    });

    let workers: Vec<_> = (0..num_workers.max(1))
        .map(|_| {
            let queue = Arc::clone(&queue);
            let state = Arc::clone(&state);
            let profile_factory = Arc::clone(&profile_factory);
            thread::spawn(move || {
                let profile = profile_factory();
                loop {
                    match queue.pop() {
                        Some(batch) => {
                            for primitive in batch {
                                match primitive {
                                    Primitive::Node(n) => {
                                        process_node(profile.as_ref(), n.osm_id, n.lat_e5, n.lon_e5, &n.tags, &state)
                                    }
                                    Primitive::Way(w) => process_way(profile.as_ref(), &w, &state),
                                    Primitive::Relation(r) => process_relation(profile.as_ref(), &r, &state),
                                }
                            }
                        }
                        None => {
                            queue.push(None);
                            break;
                        }
                    }
                }
            })
        })
        .collect();

    reader.join().expect("extractor reader thread panicked");
    for worker in workers {
        worker.join().expect("extractor worker thread panicked");
    }

    if let Some(err) = reader_error.lock().unwrap().take() {
        return Err(err);
    }

    let state = Arc::try_unwrap(state)
        .unwrap_or_else(|_| panic!("extractor shared state still referenced after join"));

    let mut used_node_ids = state.used_node_ids.into_inner().unwrap();
    used_node_ids.sort_unstable();
    used_node_ids.dedup();

    Ok(ExtractionResult {
        all_nodes: state.all_nodes.into_inner().unwrap(),
        used_node_ids,
        way_endpoints: state.way_endpoints.into_inner().unwrap(),
        edges: state.edges.into_inner().unwrap(),
        restrictions: state.restrictions.into_inner().unwrap(),
        names: state.names.into_inner().unwrap().into_names(),
    })
}

/// Process an in-memory primitive list directly, bypassing the queue and
/// reader thread. Used by tests and by callers that already have primitives
/// in hand (e.g. a synthetic fixture).
pub fn extract_primitives(
    primitives: impl IntoIterator<Item = Primitive>,
    profile: &dyn Profile,
) -> ExtractionResult {
    let state = SharedState::default();
    for primitive in primitives {
        match primitive {
            Primitive::Node(n) => process_node(profile, n.osm_id, n.lat_e5, n.lon_e5, &n.tags, &state),
            Primitive::Way(w) => process_way(profile, &w, &state),
            Primitive::Relation(r) => process_relation(profile, &r, &state),
        }
    }

    let mut used_node_ids = state.used_node_ids.into_inner().unwrap();
    used_node_ids.sort_unstable();
    used_node_ids.dedup();

    ExtractionResult {
        all_nodes: state.all_nodes.into_inner().unwrap(),
        used_node_ids,
        way_endpoints: state.way_endpoints.into_inner().unwrap(),
        edges: state.edges.into_inner().unwrap(),
        restrictions: state.restrictions.into_inner().unwrap(),
        names: state.names.into_inner().unwrap().into_names(),
    }
}
