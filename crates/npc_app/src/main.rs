//! # npc_app: NPC movement demo
//!
//! Builds the simulation, restores the saved scenario, and runs one round of
//! errands through the polling bridge.
//!
//! ## Startup Sequence
//!
//! 1. Parse the CLI (every flag also reads an `NPC_*` variable).
//! 2. Restore `<storage-dir>/<scenario>.json` if it exists.
//! 3. Spawn the bridge and place any untracked villagers on the map.
//! 4. Walk every villager to a random destination and wait for arrival.
//! 5. Shut the bridge down, which saves the final positions.

mod scenario;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use npc_math::Bounds;
use npc_persist::{FileStorage, PersistenceAdapter};
use npc_position::{MapId, MovementConfig, MovementStatus};
use npc_runtime::{PollingBridge, Simulation, SnapshotFeed, TravelOutcome};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Width and height of the demo map, in map units.
const MAP_SIZE: (f64, f64) = (800.0, 600.0);

#[derive(Debug, Parser)]
#[command(name = "npc_app", about = "Walk a village of NPCs around a map")]
struct Args {
    /// Directory holding saved scenarios
    #[arg(long, env = "NPC_STORAGE_DIR", default_value = "saves")]
    storage_dir: PathBuf,

    /// Scenario key; also the id of the demo map
    #[arg(long, env = "NPC_SCENARIO", default_value = "village")]
    scenario: String,

    /// Walking speed in map units per second
    #[arg(long, env = "NPC_SPEED", default_value_t = npc_position::config::DEFAULT_SPEED)]
    speed: f64,

    /// Snapshot sampling interval in milliseconds
    #[arg(long, env = "NPC_POLL_INTERVAL_MS", default_value_t = npc_position::config::DEFAULT_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Inset from the map edge for random placement
    #[arg(long, env = "NPC_DEFAULT_MARGIN", default_value_t = npc_position::config::DEFAULT_MARGIN)]
    default_margin: f64,

    /// Scheduler ticks per second while anything moves
    #[arg(long, env = "NPC_FRAME_RATE", default_value_t = npc_position::config::DEFAULT_FRAME_RATE)]
    frame_rate: f64,

    /// Number of villagers in the roster
    #[arg(long, env = "NPC_COUNT", default_value_t = 5)]
    npc_count: usize,

    /// Seed for placement and destinations; random if unset
    #[arg(long, env = "NPC_SEED")]
    seed: Option<u64>,
}

impl Args {
    fn movement_config(&self) -> MovementConfig {
        MovementConfig::default()
            .with_speed(self.speed)
            .with_poll_interval_ms(self.poll_interval_ms)
            .with_default_margin(self.default_margin)
            .with_frame_rate(self.frame_rate)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("npc_app=info".parse()?))
        .init();

    let args = Args::parse();
    info!(scenario = %args.scenario, dir = %args.storage_dir.display(), "npc demo starting");

    let storage = FileStorage::new(&args.storage_dir);
    let adapter = PersistenceAdapter::new(storage, args.scenario.as_str())?;
    let mut simulation = Simulation::new(args.movement_config())?.with_persistence(adapter);
    let mut rng = match args.seed {
        Some(seed) => {
            simulation = simulation.with_seed(seed);
            fastrand::Rng::with_seed(seed.wrapping_add(1))
        }
        None => fastrand::Rng::new(),
    };

    let report = simulation.restore();
    info!(restored = report.restored, skipped = report.skipped, "scenario restored");

    let (handle, task) = PollingBridge::spawn(simulation);
    let map = MapId::new(args.scenario.as_str());
    let watcher = tokio::spawn(watch_map(handle.subscribe(Some(map.clone()))));

    let (width, height) = MAP_SIZE;
    let bounds = Bounds::from_size(width, height)?;
    let seeds = scenario::roster(args.npc_count);
    let placed = handle
        .initialize_for_map(map.clone(), seeds.clone(), bounds, None)
        .await?;
    info!(placed = placed.len(), tracked = handle.get_all().len(), "roster on map");

    let area = bounds.inset(args.default_margin)?;
    let mut trips = JoinSet::new();
    for (seed, target) in scenario::errands(&seeds, &area, &mut rng) {
        let handle = handle.clone();
        trips.spawn(async move {
            let outcome = handle.travel(seed.id.clone(), target).await;
            (seed, outcome)
        });
    }

    while let Some(joined) = trips.join_next().await {
        let (seed, outcome) = joined?;
        match outcome? {
            TravelOutcome::Arrived(done) => {
                info!(id = %done.id, name = %seed.name, x = done.position.x, y = done.position.y, "arrived");
            }
            TravelOutcome::NotFound => warn!(id = %seed.id, "villager vanished before leaving"),
            TravelOutcome::Interrupted => warn!(id = %seed.id, "errand interrupted"),
        }
    }

    handle.shutdown().await?;
    let simulation = task.await?;
    watcher.await?;

    let idle = simulation
        .get_all()
        .iter()
        .filter(|e| e.status == MovementStatus::Idle)
        .count();
    info!(entities = simulation.store().len(), idle, "npc demo finished");
    Ok(())
}

/// Log how many villagers on the map are walking, whenever that changes.
async fn watch_map(mut feed: SnapshotFeed) {
    let mut walking = None;
    loop {
        let Ok(entities) = feed.changed().await else {
            debug!("snapshot feed closed");
            break;
        };
        let now = entities.iter().filter(|e| e.status == MovementStatus::Moving).count();
        debug!(sequence = feed.sequence(), entities = entities.len(), walking = now, "snapshot");
        if walking != Some(now) {
            info!(map = ?feed.map(), walking = now, of = entities.len(), "village activity");
            walking = Some(now);
        }
    }
}
