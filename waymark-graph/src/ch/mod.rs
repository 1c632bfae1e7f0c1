//! Contraction hierarchy construction (spec §4.5). Grounded in the
//! teacher's `nbg_ch::contraction` for the CSR/witness-search code shape,
//! but the ordering is the spec's dynamic priority-driven one rather than
//! the teacher's precomputed nested-dissection permutation, so it lives in
//! its own `ordering` module instead of reusing the teacher's.

pub mod contraction;
pub mod ordering;

pub use contraction::{contract, ContractionResult, CsrEdge, DEFAULT_CORE_FACTOR};
