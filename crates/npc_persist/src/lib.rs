//! # npc_persist
//!
//! Durable snapshots of the NPC position store.
//!
//! This crate provides:
//!
//! - [`codec`]: the JSON snapshot layout and its encode/decode helpers.
//! - [`storage`]: the [`SnapshotStorage`] trait with in-memory and
//!   file-backed implementations.
//! - [`adapter`]: [`PersistenceAdapter`], which saves and restores a
//!   [`PositionStore`](npc_position::PositionStore) under a scenario key and
//!   never lets a storage failure reach the caller.
//! - [`error`]: persistence-layer error types.

pub mod adapter;
pub mod codec;
pub mod error;
pub mod storage;

pub use adapter::{LoadReport, PersistenceAdapter};
pub use codec::{DecodedSnapshot, PersistedEntity, decode_snapshot, encode_snapshot};
pub use error::PersistenceError;
pub use storage::{FileStorage, MemoryStorage, SnapshotStorage};
