//! Ship movement and the obstacle spawn/fall/prune cycle

use rand::Rng;
use std::time::Instant;
use tracing::trace;

use super::world::{Obstacle, RoundStatus, World};

/// Physics system advancing players and obstacles by one tick
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance the world by one tick. No-op outside an active round.
    pub fn step(world: &mut World, now: Instant) {
        if world.round.status != RoundStatus::InProgress {
            return;
        }

        Self::move_players(world);
        Self::spawn_obstacles(world, now);
        Self::advance_obstacles(world);
    }

    /// Exponential approach: cover `gain` of the remaining distance each tick
    pub fn approach(position: f32, target: f32, gain: f32) -> f32 {
        position + (target - position) * gain
    }

    fn move_players(world: &mut World) {
        let gain = world.config.player_gain;
        for player in world.players.values_mut().filter(|p| p.alive) {
            player.x = Self::approach(player.x, player.target_x, gain);
            player.y = Self::approach(player.y, player.target_y, gain);
        }
    }

    /// Spawn at most one obstacle per elapsed wall-clock interval.
    ///
    /// The first call of a round only arms the clock, so the first obstacle
    /// appears one interval after the round starts.
    fn spawn_obstacles(world: &mut World, now: Instant) {
        let last = match world.last_spawn {
            Some(last) => last,
            None => {
                world.last_spawn = Some(now);
                return;
            }
        };

        if now.saturating_duration_since(last) <= world.config.obstacle_spawn_interval {
            return;
        }

        let config = &world.config;
        let x = world.rng.gen_range(0.0..=config.width);
        let radius = world
            .rng
            .gen_range(config.obstacle_min_radius..=config.obstacle_max_radius);
        let obstacle = Obstacle::new(x, radius, config);
        trace!(x, radius, speed = obstacle.speed, "Spawned obstacle");

        world.obstacles.push(obstacle);
        world.last_spawn = Some(now);
    }

    fn advance_obstacles(world: &mut World) {
        let height = world.config.height;
        for obstacle in &mut world.obstacles {
            obstacle.y += obstacle.speed;
        }
        world.obstacles.retain(|o| !o.is_off_screen(height));
    }
}
