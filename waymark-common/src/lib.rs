//! Shared types for the waymark-route preprocessing core: dense/sparse
//! identifiers, the error taxonomy shared by every stage, and the geodesic
//! helpers used by assembly and edge-expansion.

pub mod error;
pub mod geo;
pub mod ids;

pub use error::{Error, Result};
pub use ids::{InternalId, OsmId, INVALID_ID};
