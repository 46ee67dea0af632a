//! Snapshot building and fan-out to sessions

use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::ws::protocol::{GameInfo, ObstacleSnapshot, PlayerSnapshot, ServerMsg};

use super::registry::{Outbound, SessionId};
use super::world::World;

/// Snapshot builder and broadcaster
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Build the per-tick world snapshot
    pub fn build(world: &World) -> ServerMsg {
        let players = world
            .players
            .values()
            .map(|p| PlayerSnapshot {
                id: p.id,
                name: p.name.clone(),
                x: p.x,
                y: p.y,
                radius: p.radius,
                is_alive: p.alive,
            })
            .collect();

        let asteroids = world
            .obstacles
            .iter()
            .map(|o| ObstacleSnapshot {
                x: o.x,
                y: o.y,
                radius: o.radius,
            })
            .collect();

        ServerMsg::GameState {
            players,
            asteroids,
            game_info: GameInfo {
                status: world.round.status,
                winner: world.round.winner.as_ref().map(|w| w.name.clone()),
                timer: world.round.timer.map(|t| t.max(0.0)),
            },
        }
    }

    /// Serialize once so every recipient shares the same buffer
    pub fn encode(msg: &ServerMsg) -> Result<Arc<str>, serde_json::Error> {
        serde_json::to_string(msg).map(Arc::from)
    }

    /// Offer `payload` to every recipient without waiting.
    ///
    /// Returns the sessions whose queue was full or closed; the caller drops
    /// them. One bad recipient never affects delivery to the others.
    pub fn fan_out<'a>(
        recipients: impl IntoIterator<Item = (SessionId, &'a Outbound)>,
        payload: &Arc<str>,
    ) -> Vec<SessionId> {
        let mut failed = Vec::new();
        for (session_id, outbound) in recipients {
            match outbound.try_send(Arc::clone(payload)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(session_id = %session_id, "Outbound queue full, dropping slow session");
                    failed.push(session_id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(session_id = %session_id, "Outbound queue closed");
                    failed.push(session_id);
                }
            }
        }
        failed
    }
}
