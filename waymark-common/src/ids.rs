//! Identifier types (spec §3 "Identifiers").
//!
//! Two universes: sparse 64-bit OSM ids from the input stream, and dense
//! 32-bit internal ids assigned once during assembly. Conversion only ever
//! runs one way — an internal id is an index into a dense array, never
//! reconstructed back into an OSM id without an explicit lookup table.

/// A sparse, externally-assigned OSM identifier (node, way or relation).
pub type OsmId = i64;

/// A dense internal identifier: an index into `0..N`. `u32` caps a single
/// preprocessing run at ~4.29 billion referenced nodes/edges, which covers
/// continent- and planet-scale extracts with headroom.
pub type InternalId = u32;

/// Sentinel for "no internal id" (all-ones), matching spec §3.
pub const INVALID_ID: InternalId = InternalId::MAX;

#[inline]
pub fn is_valid(id: InternalId) -> bool {
    id != INVALID_ID
}
