//! Ini-style config file for the two preprocessing tools (spec §6
//! "Environment variables / config"): `Memory = <gigabytes>` bounds the
//! external-memory working set, `Threads = <count>` sizes the worker pool.
//! Parsed as TOML rather than a bespoke ini reader, since the teacher's
//! `butterfly-plan` crate already reaches for `toml` for its own config —
//! this crate follows the same precedent instead of hand-rolling a parser.

use std::path::Path;

use serde::Deserialize;

use waymark_common::error::{Error, Result};

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    preprocess: PreprocessTable,
}

#[derive(Debug, Default, Deserialize)]
struct PreprocessTable {
    memory_gb: Option<u32>,
    threads: Option<usize>,
}

/// Resolved settings after merging the config file with CLI flag overrides
/// (flags win, matching the teacher's clap-first, file-second precedence).
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub memory_gb: Option<u32>,
    pub threads: usize,
}

/// Reads `[preprocess]` from a TOML file; `memory_gb`/`threads` are applied
/// as defaults that `overlay` may override with explicit CLI flags.
pub fn load(path: Option<&Path>, memory_gb_flag: Option<u32>, threads_flag: Option<usize>) -> Result<Config> {
    let file = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            toml::from_str::<FileConfig>(&text)
                .map_err(|e| Error::InputFormat(format!("{}: {e}", path.display())))?
        }
        None => FileConfig::default(),
    };

    let memory_gb = memory_gb_flag.or(file.preprocess.memory_gb);
    let threads = threads_flag
        .or(file.preprocess.threads)
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));

    Ok(Config { memory_gb, threads })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_falls_back_to_available_parallelism() {
        let config = load(None, None, None).unwrap();
        assert!(config.threads >= 1);
        assert!(config.memory_gb.is_none());
    }

    #[test]
    fn cli_flags_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waymark.toml");
        std::fs::write(&path, "[preprocess]\nmemory_gb = 8\nthreads = 2\n").unwrap();

        let from_file = load(Some(&path), None, None).unwrap();
        assert_eq!(from_file.memory_gb, Some(8));
        assert_eq!(from_file.threads, 2);

        let overridden = load(Some(&path), Some(32), Some(16)).unwrap();
        assert_eq!(overridden.memory_gb, Some(32));
        assert_eq!(overridden.threads, 16);
    }

    #[test]
    fn missing_preprocess_table_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();
        let config = load(Some(&path), None, None).unwrap();
        assert!(config.memory_gb.is_none());
        assert!(config.threads >= 1);
    }
}
