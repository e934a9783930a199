//! # npc_position
//!
//! The authoritative state of every tracked NPC and the loop that moves them.
//!
//! This crate provides:
//!
//! - [`EntityRecord`]: one tracked entity, its position and movement state.
//! - [`EntitySnapshot`]: an owned, callback-free copy handed to consumers.
//! - [`PositionStore`]: the single owner of all records; every mutation
//!   passes through it.
//! - [`MovementScheduler`]: converts elapsed time into interpolated progress
//!   for every moving entity, once per tick.
//! - [`MovementConfig`]: speed, sampling cadence, frame rate and placement
//!   margin.
//! - [`PositionError`]: rejected input.

pub mod config;
pub mod error;
pub mod record;
pub mod scheduler;
pub mod store;

pub use config::MovementConfig;
pub use error::{CommandOutcome, PositionError};
pub use record::{
    ActiveMove, CompletionCallback, EntityId, EntityRecord, EntitySnapshot, MapId, Motion,
    MoveCompletion, MovementStatus,
};
pub use scheduler::{MovementScheduler, TickReport};
pub use store::PositionStore;
