//! `waymark-prepare <base>.osrm` — runs spec §4.4-§4.5, producing the
//! edge-based graph's turn-weight data baked into a contracted hierarchy
//! file (`<base>.osrm.hierarchy`).

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use waymark_cli::config;
use waymark_graph::{adjacency_from_edges, build_edge_based_graph, compute_scc, contract, to_ch_edge_records};
use waymark_ingest::profile::CarProfile;
use waymark_io::{ch_file, nbg_file, restrictions_file};

#[derive(Parser)]
#[command(name = "waymark-prepare")]
#[command(about = "Run edge-expansion and contraction hierarchy construction")]
struct Cli {
    /// Node-based graph produced by `waymark-extract`.
    input: PathBuf,

    /// Path to the ini-style config file (Memory=/Threads=).
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    threads: Option<usize>,

    #[arg(long = "memory-gb")]
    memory_gb: Option<u32>,

    /// Fraction of remaining nodes the contractor stops at (spec §4.5.6).
    #[arg(long = "core-factor", default_value_t = waymark_graph::DEFAULT_CORE_FACTOR)]
    core_factor: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env().init();
    let cli = Cli::parse();

    let config = config::load(cli.config.as_deref(), cli.memory_gb, cli.threads)
        .context("loading config file")?;
    log::info!("preparing {} with {} worker threads", cli.input.display(), config.threads);

    let nbg_bytes = std::fs::read(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let source_checksum = waymark_io::crc::checksum(&nbg_bytes);

    let nbg = nbg_file::read(&cli.input).context("reading node-based graph")?;
    let restrictions_path = PathBuf::from(format!("{}.restrictions", cli.input.display()));
    let restrictions = restrictions_file::read(&restrictions_path).context("reading restrictions")?;
    log::info!(
        "loaded {} nodes, {} edges, {} restrictions",
        nbg.nodes.len(),
        nbg.edges.len(),
        restrictions.len(),
    );

    let scc_start = Instant::now();
    let adjacency = adjacency_from_edges(nbg.nodes.len(), &nbg.edges);
    let scc = compute_scc(&adjacency);
    let tiny_count = scc.is_tiny.iter().filter(|&&t| t).count();
    log::info!(
        "computed strongly connected components in {:.2}s ({} nodes in tiny components)",
        scc_start.elapsed().as_secs_f64(),
        tiny_count,
    );

    let profile = CarProfile::default();
    let ebg_start = Instant::now();
    let ebg = build_edge_based_graph(&nbg.nodes, &nbg.edges, &restrictions, &scc, &profile, source_checksum);
    log::info!(
        "built edge-based graph: {} nodes, {} turn arcs in {:.2}s",
        ebg.nodes.len(),
        ebg.arcs.len(),
        ebg_start.elapsed().as_secs_f64(),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .context("building contraction thread pool")?;

    let contraction_start = Instant::now();
    let result = pool.install(|| contract(&ebg, cli.core_factor));
    let core_count = result.is_core.iter().filter(|&&c| c).count();
    log::info!(
        "contracted hierarchy: {} edges, {} core nodes remaining, in {:.2}s",
        result.edges.len(),
        core_count,
        contraction_start.elapsed().as_secs_f64(),
    );

    let hierarchy_path = PathBuf::from(format!("{}.hierarchy", cli.input.display()));
    let ch_edges = to_ch_edge_records(&result);
    ch_file::write(&hierarchy_path, source_checksum, &result.first_edge, &ch_edges, &result.is_core)
        .context("writing contracted hierarchy")?;

    log::info!("wrote {}", hierarchy_path.display());
    Ok(())
}
