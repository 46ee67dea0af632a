//! Collision detection and elimination

use tracing::info;

use super::world::{PlayerId, RoundStatus, World};

/// Circle overlap tests and the elimination pass
pub struct CollisionSystem;

impl CollisionSystem {
    /// Strict circle overlap on squared distances; touching circles do not collide
    pub fn overlaps(x1: f32, y1: f32, r1: f32, x2: f32, y2: f32, r2: f32) -> bool {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let reach = r1 + r2;
        dx * dx + dy * dy < reach * reach
    }

    /// Eliminate every alive player overlapping any obstacle.
    ///
    /// Each newly eliminated player yields one notification, however many
    /// obstacles hit them this tick. Returns the eliminated ids.
    pub fn resolve(world: &mut World) -> Vec<PlayerId> {
        if world.round.status != RoundStatus::InProgress {
            return Vec::new();
        }

        let mut eliminated = Vec::new();
        for player in world.players.values_mut().filter(|p| p.alive) {
            let hit = world.obstacles.iter().any(|o| {
                Self::overlaps(player.x, player.y, player.radius, o.x, o.y, o.radius)
            });
            if hit {
                player.alive = false;
                eliminated.push((player.id, player.name.clone()));
            }
        }

        eliminated
            .into_iter()
            .map(|(id, name)| {
                info!(player_id = %id, name = %name, "Player eliminated");
                world.notify(format!("{name} was eliminated!"));
                id
            })
            .collect()
    }
}
