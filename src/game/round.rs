//! Round lifecycle: waiting -> in_progress -> finished -> in_progress | waiting
//!
//! A round starts as soon as the first player joins. It ends once at most
//! one of two or more players is left alive; a lone player never wins by
//! outlasting nobody, so solo rounds run until someone else joins or the
//! player leaves. After a cooldown the next round starts with everyone
//! revived, or the arena goes back to waiting if nobody is left.

use tracing::info;

use super::world::{RoundStatus, Winner, World};

pub const GAME_BEGINS: &str = "The first player has joined. The game begins!";
pub const NEW_ROUND: &str = "New round starting now!";
pub const NO_SURVIVORS: &str = "No survivors!";
pub const WAITING_FOR_PLAYERS: &str = "Waiting for players.";

/// Round state machine transitions
pub struct RoundSystem;

impl RoundSystem {
    /// waiting -> in_progress, triggered by the first player joining
    pub fn start(world: &mut World) {
        if world.round.status != RoundStatus::Waiting || world.players.is_empty() {
            return;
        }
        Self::reset(world);
        info!(players = world.players.len(), "Round started");
        world.notify(GAME_BEGINS);
    }

    /// in_progress -> finished once the round is decided
    pub fn evaluate(world: &mut World) {
        if world.round.status != RoundStatus::InProgress {
            return;
        }

        let total = world.players.len();
        if total <= 1 {
            return;
        }

        if world.alive_count() > 1 {
            return;
        }

        let winner = world.players.values().find(|p| p.alive).map(|p| Winner {
            id: p.id,
            name: p.name.clone(),
        });

        world.round.status = RoundStatus::Finished;
        world.round.timer = Some(world.config.round_cooldown_secs);
        world.obstacles.clear();
        world.last_spawn = None;

        match &winner {
            Some(w) => {
                info!(player_id = %w.id, name = %w.name, players = total, "Round won");
                world.notify(format!("{} wins the round!", w.name));
            }
            None => {
                info!(players = total, "Round ended with no survivors");
                world.notify(NO_SURVIVORS);
            }
        }
        world.round.winner = winner;
    }

    /// Count down a finished round by `dt` simulated seconds
    pub fn advance_cooldown(world: &mut World, dt: f32) {
        if world.round.status != RoundStatus::Finished {
            return;
        }

        let remaining = world.round.timer.unwrap_or(0.0) - dt;
        if remaining > 0.0 {
            world.round.timer = Some(remaining);
            return;
        }

        // A leave that empties the world already forced waiting; this arm
        // only covers players removed without going through a leave
        if world.players.is_empty() {
            Self::to_waiting(world);
        } else {
            Self::reset(world);
            info!(players = world.players.len(), "Next round started");
            world.notify(NEW_ROUND);
        }
    }

    /// Forced return to waiting when the last player leaves
    pub fn on_world_empty(world: &mut World) {
        if world.round.status != RoundStatus::Waiting {
            Self::to_waiting(world);
        }
    }

    fn to_waiting(world: &mut World) {
        world.round.status = RoundStatus::Waiting;
        world.round.winner = None;
        world.round.timer = None;
        world.obstacles.clear();
        world.last_spawn = None;
        info!("Arena waiting for players");
        world.notify(WAITING_FOR_PLAYERS);
    }

    /// Fresh in_progress round: no obstacles, everyone alive somewhere new
    fn reset(world: &mut World) {
        world.obstacles.clear();
        world.last_spawn = None;

        let ids: Vec<_> = world.players.keys().copied().collect();
        for id in ids {
            let (x, y) = world.random_spawn_point();
            if let Some(player) = world.players.get_mut(&id) {
                player.respawn(x, y);
            }
        }

        world.round.status = RoundStatus::InProgress;
        world.round.winner = None;
        world.round.timer = None;
    }
}
