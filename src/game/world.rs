//! Arena entities and the World aggregate owned by the game loop

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

use crate::config::ArenaConfig;

/// Opaque player identity, unique for the lifetime of the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A ship steered toward its owner's last reported target point
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub radius: f32,
    pub alive: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String, x: f32, y: f32, radius: f32) -> Self {
        Self {
            id,
            name,
            x,
            y,
            target_x: x,
            target_y: y,
            radius,
            alive: true,
        }
    }

    /// Bring the player back for a new round at `(x, y)`, holding position there
    pub fn respawn(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.target_x = x;
        self.target_y = y;
        self.alive = true;
    }
}

/// A falling obstacle
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Downward speed in pixels per tick
    pub speed: f32,
}

impl Obstacle {
    /// Create an obstacle just above the top edge at column `x`.
    ///
    /// Speed scales inversely with size: a minimum-radius obstacle falls at
    /// the base speed, one twice as wide at half of it.
    pub fn new(x: f32, radius: f32, config: &ArenaConfig) -> Self {
        Self {
            x,
            y: -radius,
            radius,
            speed: obstacle_speed(radius, config),
        }
    }

    /// Fully below the bottom edge
    pub fn is_off_screen(&self, height: f32) -> bool {
        self.y > height + self.radius
    }
}

pub fn obstacle_speed(radius: f32, config: &ArenaConfig) -> f32 {
    config.obstacle_base_speed / (radius / config.obstacle_min_radius)
}

/// Round lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// No simulation, waiting for a player
    Waiting,
    /// Simulation active
    InProgress,
    /// Round decided, cooling down before the next one
    Finished,
}

/// Sole survivor of a decided round
#[derive(Debug, Clone, PartialEq)]
pub struct Winner {
    pub id: PlayerId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Round {
    pub status: RoundStatus,
    pub winner: Option<Winner>,
    /// Seconds left before the next round, only while finished
    pub timer: Option<f32>,
}

impl Default for Round {
    fn default() -> Self {
        Self {
            status: RoundStatus::Waiting,
            winner: None,
            timer: None,
        }
    }
}

/// All mutable simulation state
pub struct World {
    pub config: ArenaConfig,
    pub players: HashMap<PlayerId, Player>,
    pub obstacles: Vec<Obstacle>,
    pub round: Round,
    pub rng: ChaCha8Rng,
    /// Time of the last obstacle spawn; unset until the round's first step
    pub last_spawn: Option<Instant>,
    notifications: Vec<String>,
}

impl World {
    pub fn new(config: ArenaConfig, seed: u64) -> Self {
        Self {
            config,
            players: HashMap::new(),
            obstacles: Vec::new(),
            round: Round::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            last_spawn: None,
            notifications: Vec::new(),
        }
    }

    /// Random point inside the playfield, clear of the edge margin
    pub fn random_spawn_point(&mut self) -> (f32, f32) {
        let margin = self.config.spawn_margin;
        let x = self.rng.gen_range(margin..=self.config.width - margin);
        let y = self.rng.gen_range(margin..=self.config.height - margin);
        (x, y)
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    /// Queue a message for every session on the next broadcast
    pub fn notify(&mut self, message: impl Into<String>) {
        self.notifications.push(message.into());
    }

    #[cfg(test)]
    pub fn pending_notifications(&self) -> &[String] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notifications)
    }
}
