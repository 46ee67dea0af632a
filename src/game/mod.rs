//! Game simulation modules

pub mod arena;
pub mod collision;
pub mod physics;
pub mod registry;
pub mod round;
pub mod snapshot;
pub mod world;

pub use arena::{ArenaHandle, GameArena};
pub use registry::{Outbound, SessionId};

/// Session-originated mutation, applied by the game loop at the next tick
#[derive(Debug)]
pub enum Command {
    /// A transport connection opened
    Connect {
        session_id: SessionId,
        outbound: Outbound,
    },
    /// Client asked to join the arena
    Join {
        session_id: SessionId,
        name: Option<String>,
    },
    /// Client moved its steering target
    Input {
        session_id: SessionId,
        target_x: f32,
        target_y: f32,
    },
    /// Transport connection closed
    Disconnect { session_id: SessionId },
}
