//! Error taxonomy shared across the preprocessing pipeline (spec §7).
//!
//! Per-record problems (a malformed way, a restriction with a missing
//! endpoint) are not represented here: those are logged at `warn!` and the
//! offending record is dropped in place, per §7's propagation rule. Only
//! process-level, stage-aborting failures get a variant.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A block in the primitive source was malformed, used an unrecognized
    /// compression scheme, or did not parse as the expected structure.
    #[error("malformed input block: {0}")]
    InputFormat(String),

    /// The primitive source's header advertised a `required_features` entry
    /// this implementation does not understand.
    #[error("unsupported required feature: {0}")]
    UnsupportedFeature(String),

    /// An assembly-stage invariant could not be satisfied after the
    /// sort/merge passes (e.g. more edges reference missing nodes than the
    /// stage is willing to silently drop, or no nodes survived at all).
    #[error("input integrity violated: {0}")]
    InputIntegrity(String),

    /// A profile callback raised an error while classifying a primitive.
    #[error("profile error while classifying osm id {osm_id}: {message}")]
    Profile { osm_id: i64, message: String },

    /// The external-memory backing store could not grow (disk full, quota).
    #[error("out of space writing {path}: {source}")]
    OutOfSpace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A postcondition inside assembly, edge-expansion or contraction
    /// failed. Always fatal; indicates a logic bug, not bad input.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    /// Clean end of the primitive source's underlying stream. Callers
    /// *should* treat this as pipeline completion rather than failure, but
    /// it still travels through `Result` since the source has no other way
    /// to signal "no more blocks."
    #[error("end of stream")]
    EndOfStream,

    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.raw_os_error() == Some(libc_enospc()) {
            Error::OutOfSpace { path, source }
        } else {
            Error::Io { path, source }
        }
    }
}

#[cfg(unix)]
fn libc_enospc() -> i32 {
    28 // ENOSPC
}

#[cfg(not(unix))]
fn libc_enospc() -> i32 {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_stream_is_terminal_but_not_fatal_text() {
        assert_eq!(Error::EndOfStream.to_string(), "end of stream");
    }

    #[test]
    fn profile_error_carries_the_offending_id() {
        let e = Error::Profile {
            osm_id: 42,
            message: "bad tag".into(),
        };
        assert!(e.to_string().contains("42"));
    }
}
