//! Binary formats and external-memory infrastructure for the
//! waymark-route preprocessing core (spec §4.3, §6, §9).

pub mod ch_file;
pub mod crc;
pub mod extvec;
pub mod framing;
pub mod names_file;
pub mod nbg_file;
pub mod restrictions_file;

pub use waymark_common::error::{Error, Result};
