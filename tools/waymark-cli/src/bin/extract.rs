//! `waymark-extract <input.osm{.pbf,.bz2,}>` — runs spec §4.1-§4.3,
//! producing `<base>.osrm`, `<base>.osrm.restrictions`, `<base>.osrm.names`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use waymark_cli::config;
use waymark_graph::assembly;
use waymark_ingest::profile::CarProfile;
use waymark_ingest::{run_extract, Profile};
use waymark_io::names_file::NamesWriter;
use waymark_io::{nbg_file, restrictions_file};

#[derive(Parser)]
#[command(name = "waymark-extract")]
#[command(about = "Run the streaming OSM extractor and node-based graph assembly")]
struct Cli {
    /// Input primitive source (.osm, .osm.pbf, .osm.bz2).
    input: PathBuf,

    /// Path to the ini-style config file (Memory=/Threads=).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the config file's worker thread count.
    #[arg(long)]
    threads: Option<usize>,

    /// Override the config file's memory bound, in gigabytes.
    #[arg(long = "memory-gb")]
    memory_gb: Option<u32>,
}

fn base_path(input: &Path) -> PathBuf {
    let name = input.file_name().and_then(|n| n.to_str()).unwrap_or("output");
    let base = name
        .strip_suffix(".osm.pbf")
        .or_else(|| name.strip_suffix(".osm.bz2"))
        .or_else(|| name.strip_suffix(".osm"))
        .unwrap_or(name);
    input.with_file_name(base)
}

fn profile_factory() -> Box<dyn Profile> {
    Box::new(CarProfile::default())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env().init();
    let cli = Cli::parse();

    let config = config::load(cli.config.as_deref(), cli.memory_gb, cli.threads)
        .context("loading config file")?;
    log::info!("extracting {} with {} worker threads", cli.input.display(), config.threads);

    let start = Instant::now();
    let extraction = run_extract(&cli.input, profile_factory, config.threads, 64)
        .context("running extractor pipeline")?;
    log::info!(
        "extracted {} nodes, {} way endpoints, {} edges, {} restrictions in {:.2}s",
        extraction.all_nodes.len(),
        extraction.way_endpoints.len(),
        extraction.edges.len(),
        extraction.restrictions.len(),
        start.elapsed().as_secs_f64(),
    );

    let assembly_start = Instant::now();
    let assembled = assembly::assemble(
        extraction.all_nodes,
        extraction.used_node_ids,
        extraction.way_endpoints,
        extraction.edges,
        extraction.restrictions,
    )
    .context("assembling node-based graph")?;
    log::info!(
        "assembled {} nodes, {} edges, {} restrictions in {:.2}s",
        assembled.nodes.len(),
        assembled.edges.len(),
        assembled.restrictions.len(),
        assembly_start.elapsed().as_secs_f64(),
    );

    let base = base_path(&cli.input);
    let nbg_path = base.with_extension("osrm");
    let restrictions_path = PathBuf::from(format!("{}.restrictions", nbg_path.display()));
    let names_path = PathBuf::from(format!("{}.names", nbg_path.display()));

    nbg_file::write(&nbg_path, assembled.nodes, assembled.edges).context("writing node-based graph")?;
    restrictions_file::write(&restrictions_path, assembled.restrictions).context("writing restrictions")?;

    let mut names_writer = NamesWriter::create(&names_path).context("creating names file")?;
    for name in &extraction.names {
        names_writer.push(name).context("writing name")?;
    }
    names_writer.finish().context("finalizing names file")?;

    log::info!("wrote {}, {}, {}", nbg_path.display(), restrictions_path.display(), names_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_strips_known_extensions() {
        assert_eq!(base_path(Path::new("berlin.osm.pbf")), PathBuf::from("berlin"));
        assert_eq!(base_path(Path::new("berlin.osm.bz2")), PathBuf::from("berlin"));
        assert_eq!(base_path(Path::new("berlin.osm")), PathBuf::from("berlin"));
    }

    #[test]
    fn base_path_leaves_unrecognized_extensions_alone() {
        assert_eq!(base_path(Path::new("berlin.xml")), PathBuf::from("berlin.xml"));
    }
}
