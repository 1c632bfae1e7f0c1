//! OSM primitive source and extractor pipeline (spec §4.1, §4.2).

pub mod pipeline;
pub mod primitive;
pub mod profile;
pub mod queue;

pub use pipeline::{run_extract, ExtractionResult, RawEdge, RawNode, RawRestriction, WayEndpoints};
pub use primitive::{for_each_primitive, Primitive};
pub use profile::{CarProfile, Profile};
