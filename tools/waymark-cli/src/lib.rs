//! Shared CLI plumbing for `waymark-extract` and `waymark-prepare`.

pub mod config;
