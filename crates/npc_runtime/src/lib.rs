//! # npc_runtime
//!
//! The running NPC movement subsystem.
//!
//! A [`Simulation`] is built once by the application's composition root. It
//! owns the position store, the movement scheduler and (optionally) the
//! persistence adapter, and is the only thing that ever writes entity state.
//! The [`PollingBridge`] moves the simulation into a single tokio task and
//! exposes it to the rest of the application:
//!
//! 1. Commands arrive over a channel from any number of [`BridgeHandle`]s.
//! 2. After every command the store is resampled before the reply is sent,
//!    so an awaited command is always followed by a fresh snapshot.
//! 3. While anything is moving, a frame interval ticks the scheduler.
//! 4. A fixed sampling interval republishes the store as a
//!    [`WorldSnapshot`], which [`SnapshotFeed`]s read, optionally filtered by
//!    map.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use npc_math::{Bounds, DVec2};
//! use npc_position::MovementConfig;
//! use npc_runtime::{EntitySeed, PollingBridge, Simulation};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let simulation = Simulation::new(MovementConfig::default())?;
//!     let (handle, task) = PollingBridge::spawn(simulation);
//!
//!     let bounds = Bounds::from_size(800.0, 600.0)?;
//!     handle
//!         .initialize_for_map("market", vec![EntitySeed::new("npc-1", "Mira")], bounds, None)
//!         .await?;
//!     handle.travel("npc-1", DVec2::new(400.0, 300.0)).await?;
//!
//!     handle.shutdown().await?;
//!     let _simulation = task.await?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod error;
pub mod feed;
pub mod placement;
pub mod simulation;

pub use bridge::{BridgeHandle, PollingBridge, TravelOutcome};
pub use error::BridgeError;
pub use feed::{SnapshotFeed, WorldSnapshot};
pub use placement::EntitySeed;
pub use simulation::Simulation;
