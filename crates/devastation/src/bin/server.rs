//! # Devastation Server
//!
//! Headless simulation on the reference grid with file-backed state.
//!
//! ## Usage
//!
//! ```bash
//! # Defaults, runs until killed
//! ./devastation_server
//!
//! # Custom config, ten minutes, state under /var/lib/devastation
//! DEVASTATION_STATE_DIR=/var/lib/devastation DEVASTATION_RUN_SECONDS=600 \
//!     RUST_LOG=devastation=debug ./devastation_server config.toml
//! ```
//!
//! State is loaded on start, saved every status interval and on exit. An
//! empty world gets one source at the origin so there is something to watch.

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use devastation::core::{
    Clock, DevastationConfig, DevastationResult, FileBlobStore, StaticWardHost, SystemClock,
};
use devastation::world::{BlockPos, BlockRegistry, ChunkCoord, FlatTerrain, VoxelWorld};
use devastation::{Simulation, SimulationLoop};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Surface height of the reference grid.
const SURFACE_Y: i32 = 64;

/// Chunks loaded around the origin in each direction.
const LOADED_RADIUS: i32 = 3;

/// Time between status lines and autosaves.
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

/// Sleep between loop updates.
const IDLE: Duration = Duration::from_millis(2);

const STATE_DIR_VAR: &str = "DEVASTATION_STATE_DIR";
const RUN_SECONDS_VAR: &str = "DEVASTATION_RUN_SECONDS";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        error!(%err, "server stopped");
        std::process::exit(1);
    }
}

fn run() -> DevastationResult<()> {
    let config = match env::args().nth(1) {
        Some(path) => {
            info!(%path, "loading configuration");
            DevastationConfig::load(&path)?
        }
        None => DevastationConfig::default(),
    };
    let state_dir = env::var(STATE_DIR_VAR).unwrap_or_else(|_| "devastation_state".to_owned());
    let run_for = env::var(RUN_SECONDS_VAR)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs);
    let store = FileBlobStore::new(state_dir)?;

    let registry = BlockRegistry::with_default_catalog();
    let mut world = VoxelWorld::with_terrain(FlatTerrain::layered(&registry, SURFACE_Y));
    world.ensure_loaded_around(ChunkCoord::new(0, 0), LOADED_RADIUS);
    info!(chunks = world.loaded_chunk_count(), "reference grid ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let mut sim = Simulation::new(world, StaticWardHost::new(), registry, config, clock)?;
    sim.load(&store);
    if sim.sources().is_empty() && sim.chunks().is_empty() {
        sim.add_source_at(BlockPos::new(0, SURFACE_Y, 0));
    }
    let status = sim.aggregate_status();
    info!(
        dir = %store.dir().display(),
        sources = status.sources,
        chunks = status.chunks,
        wards = status.wards,
        "state loaded"
    );

    let events = sim.events();
    let mut sim_loop = SimulationLoop::new();
    let started = Instant::now();
    let mut last_status = Instant::now();

    loop {
        sim_loop.update(&mut sim);

        let drained = events.drain();
        if !drained.is_empty() {
            debug!(events = drained.len(), "events drained");
        }

        if last_status.elapsed() >= STATUS_INTERVAL {
            let status = serde_json::to_string(&sim.aggregate_status())?;
            info!(%status, "status");
            sim_loop.stats().log_summary();
            sim_loop.reset_stats();
            sim.save(&store)?;
            last_status = Instant::now();
        }

        if run_for.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        thread::sleep(IDLE);
    }

    sim.save(&store)?;
    info!(ticks = sim_loop.ticks(), "state saved, shutting down");
    Ok(())
}
