//! Polling bridge: the consumer-facing side of the runtime.
//!
//! The bridge is a single tokio task that owns the [`Simulation`]. Nothing
//! else can reach the store, so commands and ticks can never interleave and
//! no lock guards entity state. The task multiplexes three sources:
//!
//! 1. **Commands** from [`BridgeHandle`]s. Each is applied, the store is
//!    resampled, and only then is the reply sent.
//! 2. **Frames** while the scheduler is active. Elapsed time since the last
//!    frame becomes the tick's `dt`. The frame branch is disabled while
//!    idle, so an idle world costs nothing.
//! 3. **Samples** at the configured poll interval, republishing the store
//!    whether or not anything changed.

use std::fmt;
use std::sync::Arc;

use npc_math::{Bounds, DVec2};
use npc_position::{
    CommandOutcome, CompletionCallback, EntityId, EntitySnapshot, MapId, MoveCompletion,
    MovementStatus, PositionError,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::BridgeError;
use crate::feed::{SnapshotFeed, WorldSnapshot};
use crate::placement::EntitySeed;
use crate::simulation::Simulation;

/// Queued commands per bridge before senders wait.
const COMMAND_BUFFER: usize = 64;

/// How a [`BridgeHandle::travel`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TravelOutcome {
    /// The entity reached its target.
    Arrived(MoveCompletion),
    /// No entity with that id is tracked.
    NotFound,
    /// The move was superseded, stopped, or the entity removed.
    Interrupted,
}

enum Command {
    SetPosition {
        id: EntityId,
        name: String,
        position: DVec2,
        status: MovementStatus,
        reply: oneshot::Sender<Result<(), PositionError>>,
    },
    MoveTo {
        id: EntityId,
        target: DVec2,
        on_complete: Option<CompletionCallback>,
        reply: oneshot::Sender<Result<CommandOutcome, PositionError>>,
    },
    Remove {
        id: EntityId,
        reply: oneshot::Sender<CommandOutcome>,
    },
    Clear {
        reply: oneshot::Sender<usize>,
    },
    StopAll {
        reply: oneshot::Sender<usize>,
    },
    InitializeForMap {
        map: MapId,
        entities: Vec<EntitySeed>,
        bounds: Bounds,
        margin: Option<f64>,
        reply: oneshot::Sender<Result<Vec<EntityId>, PositionError>>,
    },
    Shutdown,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetPosition { id, .. } => write!(f, "SetPosition({id})"),
            Self::MoveTo { id, target, .. } => write!(f, "MoveTo({id} -> {target})"),
            Self::Remove { id, .. } => write!(f, "Remove({id})"),
            Self::Clear { .. } => f.write_str("Clear"),
            Self::StopAll { .. } => f.write_str("StopAll"),
            Self::InitializeForMap { map, entities, .. } => {
                write!(f, "InitializeForMap({map}, {} entities)", entities.len())
            }
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// The task that owns the simulation.
#[derive(Debug)]
pub struct PollingBridge {
    simulation: Simulation,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<Arc<WorldSnapshot>>,
    sequence: u64,
}

impl PollingBridge {
    /// Wrap `simulation`, returning the bridge and its first handle.
    ///
    /// The bridge does nothing until [`PollingBridge::run`] is polled.
    #[must_use]
    pub fn new(simulation: Simulation) -> (Self, BridgeHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let initial = Arc::new(WorldSnapshot {
            sequence: 0,
            entities: simulation.get_all(),
        });
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let bridge = Self {
            simulation,
            commands: command_rx,
            snapshots: snapshot_tx,
            sequence: 0,
        };
        let handle = BridgeHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (bridge, handle)
    }

    /// Spawn the bridge on the current tokio runtime.
    ///
    /// The join handle yields the simulation back after shutdown.
    #[must_use]
    pub fn spawn(simulation: Simulation) -> (BridgeHandle, JoinHandle<Simulation>) {
        let (bridge, handle) = Self::new(simulation);
        (handle, tokio::spawn(bridge.run()))
    }

    /// Run until [`BridgeHandle::shutdown`] is called or every handle is
    /// dropped. The store is saved one last time before returning.
    pub async fn run(mut self) -> Simulation {
        let config = self.simulation.config().clone();

        let mut poll = time::interval(config.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frame = time::interval(config.frame_interval());
        frame.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_frame = Instant::now();

        info!(
            poll_interval_ms = config.poll_interval_ms,
            frame_rate = config.frame_rate,
            entities = self.simulation.store().len(),
            "position bridge started"
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("all bridge handles dropped");
                        break;
                    };
                    let was_active = self.simulation.is_active();
                    if !self.apply(command) {
                        break;
                    }
                    if !was_active && self.simulation.is_active() {
                        // Measure the first frame from now, not from the
                        // end of the previous burst of movement.
                        frame.reset();
                        last_frame = Instant::now();
                    }
                }
                _ = frame.tick(), if self.simulation.is_active() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f64();
                    last_frame = now;
                    let report = self.simulation.tick(dt);
                    if !report.completed.is_empty() || !report.still_active {
                        self.resample();
                    }
                }
                _ = poll.tick() => self.resample(),
            }
        }

        self.simulation.save();
        self.resample();
        info!(sequence = self.sequence, "position bridge stopped");
        self.simulation
    }

    /// Apply one command. Returns `false` when the bridge should stop.
    fn apply(&mut self, command: Command) -> bool {
        debug!(?command, "bridge command");
        match command {
            Command::SetPosition {
                id,
                name,
                position,
                status,
                reply,
            } => {
                let result = self.simulation.set_position(id, name, position, status);
                self.respond(reply, result);
            }
            Command::MoveTo {
                id,
                target,
                on_complete,
                reply,
            } => {
                let result = self.simulation.move_to(id.as_str(), target, on_complete);
                self.respond(reply, result);
            }
            Command::Remove { id, reply } => {
                let outcome = self.simulation.remove(id.as_str());
                self.respond(reply, outcome);
            }
            Command::Clear { reply } => {
                let removed = self.simulation.clear();
                self.respond(reply, removed);
            }
            Command::StopAll { reply } => {
                let stopped = self.simulation.stop_all();
                self.respond(reply, stopped);
            }
            Command::InitializeForMap {
                map,
                entities,
                bounds,
                margin,
                reply,
            } => {
                let result = self
                    .simulation
                    .initialize_for_map(map, &entities, bounds, margin);
                self.respond(reply, result);
            }
            Command::Shutdown => return false,
        }
        true
    }

    /// Resample, then answer, so the caller never reads a stale snapshot.
    fn respond<T>(&mut self, reply: oneshot::Sender<T>, value: T) {
        self.resample();
        // The caller may have given up waiting; that is not our problem.
        let _ = reply.send(value);
    }

    fn resample(&mut self) {
        self.sequence += 1;
        let snapshot = WorldSnapshot {
            sequence: self.sequence,
            entities: self.simulation.get_all(),
        };
        self.snapshots.send_replace(Arc::new(snapshot));
    }
}

/// A cloneable handle for issuing commands and reading snapshots.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Arc<WorldSnapshot>>,
}

impl BridgeHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, BridgeError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| BridgeError::Closed)?;
        response.await.map_err(|_| BridgeError::Closed)
    }

    /// Insert or overwrite an idle entity.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidInput`] for rejected input,
    /// [`BridgeError::Closed`] if the bridge has stopped.
    pub async fn set_position(
        &self,
        id: impl Into<EntityId>,
        name: impl Into<String>,
        position: DVec2,
        status: MovementStatus,
    ) -> Result<(), BridgeError> {
        let (id, name) = (id.into(), name.into());
        Ok(self
            .request(|reply| Command::SetPosition {
                id,
                name,
                position,
                status,
                reply,
            })
            .await??)
    }

    /// Start a move. `on_complete` runs on the bridge task when the entity
    /// arrives, and must not block.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidInput`] for a non-finite target,
    /// [`BridgeError::Closed`] if the bridge has stopped.
    pub async fn move_to(
        &self,
        id: impl Into<EntityId>,
        target: DVec2,
        on_complete: Option<CompletionCallback>,
    ) -> Result<CommandOutcome, BridgeError> {
        let id = id.into();
        Ok(self
            .request(|reply| Command::MoveTo {
                id,
                target,
                on_complete,
                reply,
            })
            .await??)
    }

    /// Start a move and wait for it to finish.
    ///
    /// # Errors
    ///
    /// See [`BridgeHandle::move_to`].
    pub async fn travel(
        &self,
        id: impl Into<EntityId>,
        target: DVec2,
    ) -> Result<TravelOutcome, BridgeError> {
        let (arrived, arrival) = oneshot::channel();
        let on_complete: CompletionCallback = Box::new(move |done: &MoveCompletion| {
            let _ = arrived.send(done.clone());
        });

        match self.move_to(id, target, Some(on_complete)).await? {
            CommandOutcome::NotFound => Ok(TravelOutcome::NotFound),
            CommandOutcome::Applied => Ok(match arrival.await {
                Ok(done) => TravelOutcome::Arrived(done),
                Err(_) => TravelOutcome::Interrupted,
            }),
        }
    }

    /// Delete an entity.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Closed`] if the bridge has stopped.
    pub async fn remove(&self, id: impl Into<EntityId>) -> Result<CommandOutcome, BridgeError> {
        let id = id.into();
        self.request(|reply| Command::Remove { id, reply }).await
    }

    /// Delete every entity. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Closed`] if the bridge has stopped.
    pub async fn clear(&self) -> Result<usize, BridgeError> {
        self.request(|reply| Command::Clear { reply }).await
    }

    /// Freeze every moving entity. Returns how many were stopped.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Closed`] if the bridge has stopped.
    pub async fn stop_all(&self) -> Result<usize, BridgeError> {
        self.request(|reply| Command::StopAll { reply }).await
    }

    /// Place untracked entities at random inside `bounds` inset by `margin`
    /// (the configured default if `None`). Returns the newly placed ids.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidInput`] for unusable bounds, margin or ids,
    /// [`BridgeError::Closed`] if the bridge has stopped.
    pub async fn initialize_for_map(
        &self,
        map: impl Into<MapId>,
        entities: Vec<EntitySeed>,
        bounds: Bounds,
        margin: Option<f64>,
    ) -> Result<Vec<EntityId>, BridgeError> {
        let map = map.into();
        Ok(self
            .request(|reply| Command::InitializeForMap {
                map,
                entities,
                bounds,
                margin,
                reply,
            })
            .await??)
    }

    /// Ask the bridge to save and stop.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Closed`] if the bridge had already stopped.
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| BridgeError::Closed)
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<WorldSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Latest copy of one entity.
    #[must_use]
    pub fn get_position(&self, id: &str) -> Option<EntitySnapshot> {
        self.snapshots.borrow().get(id).cloned()
    }

    /// Latest copies of every entity.
    #[must_use]
    pub fn get_all(&self) -> Vec<EntitySnapshot> {
        self.snapshots.borrow().entities.clone()
    }

    /// Subscribe to publications, optionally narrowed to one map.
    #[must_use]
    pub fn subscribe(&self, map: Option<MapId>) -> SnapshotFeed {
        SnapshotFeed::new(self.snapshots.clone(), map)
    }
}
