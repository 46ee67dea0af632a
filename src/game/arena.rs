//! Arena state and authoritative tick loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::ArenaConfig;
use crate::ws::protocol::ServerMsg;

use super::collision::CollisionSystem;
use super::physics::PhysicsSystem;
use super::registry::{SessionError, SessionId, SessionRegistry};
use super::round::RoundSystem;
use super::snapshot::SnapshotBuilder;
use super::world::{RoundStatus, World};
use super::Command;

/// Capacity of the session -> game loop command queue
pub const COMMAND_QUEUE: usize = 1024;

/// Handle used by connection tasks to reach the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub command_tx: mpsc::Sender<Command>,
    pub tick_rate: u32,
    player_count: Arc<AtomicUsize>,
    session_count: Arc<AtomicUsize>,
}

impl ArenaHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn session_count(&self) -> usize {
        self.session_count.load(Ordering::Relaxed)
    }
}

/// The authoritative arena: sole owner and writer of the world
pub struct GameArena {
    world: World,
    sessions: SessionRegistry,
    command_rx: mpsc::Receiver<Command>,
    tick_duration: Duration,
    tick_delta: f32,
    tick: u64,
    player_count: Arc<AtomicUsize>,
    session_count: Arc<AtomicUsize>,
}

impl GameArena {
    /// Create an arena and the handle its sessions talk to
    pub fn new(config: ArenaConfig, seed: u64) -> (Self, ArenaHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let player_count = Arc::new(AtomicUsize::new(0));
        let session_count = Arc::new(AtomicUsize::new(0));

        let handle = ArenaHandle {
            command_tx,
            tick_rate: config.tick_rate,
            player_count: player_count.clone(),
            session_count: session_count.clone(),
        };

        let arena = Self {
            tick_duration: config.tick_duration(),
            tick_delta: config.tick_delta(),
            world: World::new(config, seed),
            sessions: SessionRegistry::new(),
            command_rx,
            tick: 0,
            player_count,
            session_count,
        };

        (arena, handle)
    }

    /// Run the fixed-rate tick loop until `shutdown` flips to true or its
    /// sender goes away
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            tick_rate = self.world.config.tick_rate,
            width = self.world.config.width,
            height = self.world.config.height,
            "Game loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let started = Instant::now();
            self.tick(started);

            let elapsed = started.elapsed();
            if elapsed > self.tick_duration {
                debug!(
                    tick = self.tick,
                    elapsed_us = elapsed.as_micros() as u64,
                    "Tick overran its budget"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.tick_duration.saturating_sub(elapsed)) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(tick = self.tick, "Game loop stopped");
    }

    /// Run one tick: apply queued commands, simulate, broadcast
    pub fn tick(&mut self, now: Instant) {
        self.tick += 1;

        // Session mutations land strictly before the simulation pass
        self.process_commands();

        match self.world.round.status {
            RoundStatus::InProgress => {
                PhysicsSystem::step(&mut self.world, now);
                CollisionSystem::resolve(&mut self.world);
                RoundSystem::evaluate(&mut self.world);
            }
            RoundStatus::Finished => {
                RoundSystem::advance_cooldown(&mut self.world, self.tick_delta);
            }
            RoundStatus::Waiting => {}
        }

        self.broadcast();

        self.player_count
            .store(self.world.players.len(), Ordering::Relaxed);
        self.session_count
            .store(self.sessions.len(), Ordering::Relaxed);
    }

    /// Drain the command queue
    fn process_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                Command::Connect {
                    session_id,
                    outbound,
                } => {
                    self.sessions.connect(session_id, outbound);
                }
                Command::Join { session_id, name } => {
                    self.handle_join(session_id, name);
                }
                Command::Input {
                    session_id,
                    target_x,
                    target_y,
                } => {
                    match self
                        .sessions
                        .input(&mut self.world, session_id, target_x, target_y)
                    {
                        Ok(()) => {}
                        Err(e @ SessionError::InvalidTarget(..)) => {
                            warn!(session_id = %session_id, error = %e, "Malformed input rejected");
                        }
                        Err(e) => {
                            debug!(session_id = %session_id, error = %e, "Input ignored");
                        }
                    }
                }
                Command::Disconnect { session_id } => {
                    self.sessions.disconnect(&mut self.world, session_id);
                }
            }
        }
    }

    fn handle_join(&mut self, session_id: SessionId, name: Option<String>) {
        let player_id = match self.sessions.join(&mut self.world, session_id, name) {
            Ok(id) => id,
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Join ignored");
                return;
            }
        };

        match SnapshotBuilder::encode(&ServerMsg::Welcome { player_id }) {
            Ok(payload) => {
                if self.sessions.send_to(&session_id, payload).is_err() {
                    self.drop_session(session_id);
                }
            }
            Err(e) => error!(session_id = %session_id, error = %e, "Failed to encode welcome"),
        }
    }

    /// Flush queued notifications, then the world snapshot, to every session
    fn broadcast(&mut self) {
        let notifications = self.world.take_notifications();
        if self.sessions.is_empty() {
            return;
        }

        let mut messages: Vec<ServerMsg> = notifications
            .into_iter()
            .map(|message| ServerMsg::Notification { message })
            .collect();
        messages.push(SnapshotBuilder::build(&self.world));

        for msg in &messages {
            let payload = match SnapshotBuilder::encode(msg) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(tick = self.tick, error = %e, "Failed to encode broadcast");
                    continue;
                }
            };

            let failed = SnapshotBuilder::fan_out(self.sessions.recipients(), &payload);
            for session_id in failed {
                self.drop_session(session_id);
            }
        }
    }

    /// Disconnect a session the arena can no longer deliver to. Dropping its
    /// outbound sender ends the session's writer task.
    fn drop_session(&mut self, session_id: SessionId) {
        if let Some(player_id) = self.sessions.disconnect(&mut self.world, session_id) {
            info!(session_id = %session_id, player_id = %player_id, "Dropped unresponsive session");
        }
    }
}
