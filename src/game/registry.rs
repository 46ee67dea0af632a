//! Session registry - maps live connections to player identities

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::round::RoundSystem;
use super::world::{Player, PlayerId, World};

/// Display name used when a client joins without one
pub const DEFAULT_NAME: &str = "Anonymous";
/// Longest display name kept, in characters
pub const MAX_NAME_LEN: usize = 24;

/// Identity of one transport connection
pub type SessionId = Uuid;

/// Bounded queue of serialized messages drained by a session's writer task
pub type Outbound = mpsc::Sender<Arc<str>>;

/// Session-level errors. None of these are fatal; callers log and move on.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SessionError {
    #[error("Unknown session {0}")]
    UnknownSession(SessionId),

    #[error("Session already joined as player {0}")]
    AlreadyJoined(PlayerId),

    #[error("Session has not joined yet")]
    NotJoined,

    #[error("Non-finite steering target ({0}, {1})")]
    InvalidTarget(f32, f32),
}

/// A connected client
#[derive(Debug)]
pub struct Session {
    pub outbound: Outbound,
    pub player_id: Option<PlayerId>,
}

/// Connected sessions and their players
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[cfg(test)]
    pub fn player_of(&self, session_id: &SessionId) -> Option<PlayerId> {
        self.sessions.get(session_id).and_then(|s| s.player_id)
    }

    /// Register a freshly connected session
    pub fn connect(&mut self, session_id: SessionId, outbound: Outbound) {
        self.sessions.insert(
            session_id,
            Session {
                outbound,
                player_id: None,
            },
        );
        debug!(session_id = %session_id, sessions = self.sessions.len(), "Session connected");
    }

    /// Create a player for the session and place it in the world
    pub fn join(
        &mut self,
        world: &mut World,
        session_id: SessionId,
        name: Option<String>,
    ) -> Result<PlayerId, SessionError> {
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(SessionError::UnknownSession(session_id))?;
        if let Some(existing) = session.player_id {
            return Err(SessionError::AlreadyJoined(existing));
        }

        let name = display_name(name);
        let (x, y) = world.random_spawn_point();
        let player_id = PlayerId::new();
        world.players.insert(
            player_id,
            Player::new(player_id, name.clone(), x, y, world.config.player_radius),
        );
        session.player_id = Some(player_id);

        info!(
            session_id = %session_id,
            player_id = %player_id,
            name = %name,
            players = world.players.len(),
            "Player joined"
        );
        world.notify(format!("{name} has joined the game!"));

        if world.players.len() == 1 {
            RoundSystem::start(world);
        }

        Ok(player_id)
    }

    /// Steer the session's player. Dead players ignore input.
    ///
    /// Non-finite targets are rejected without touching the world; finite
    /// ones are clamped to the playfield.
    pub fn input(
        &self,
        world: &mut World,
        session_id: SessionId,
        target_x: f32,
        target_y: f32,
    ) -> Result<(), SessionError> {
        let player_id = self
            .sessions
            .get(&session_id)
            .ok_or(SessionError::UnknownSession(session_id))?
            .player_id
            .ok_or(SessionError::NotJoined)?;

        if !(target_x.is_finite() && target_y.is_finite()) {
            return Err(SessionError::InvalidTarget(target_x, target_y));
        }

        let (width, height) = (world.config.width, world.config.height);
        if let Some(player) = world.players.get_mut(&player_id) {
            if player.alive {
                player.target_x = target_x.clamp(0.0, width);
                player.target_y = target_y.clamp(0.0, height);
            }
        }
        Ok(())
    }

    /// Forget the session and remove its player, if it had one
    pub fn disconnect(&mut self, world: &mut World, session_id: SessionId) -> Option<PlayerId> {
        let session = self.sessions.remove(&session_id)?;
        debug!(session_id = %session_id, sessions = self.sessions.len(), "Session disconnected");

        let player_id = session.player_id?;
        let player = world.players.remove(&player_id)?;

        info!(
            session_id = %session_id,
            player_id = %player_id,
            name = %player.name,
            players = world.players.len(),
            "Player left"
        );
        world.notify(format!("{} has left the game.", player.name));

        if world.players.is_empty() {
            RoundSystem::on_world_empty(world);
        }

        Some(player_id)
    }

    /// Queue a message for one session without waiting
    pub fn send_to(
        &self,
        session_id: &SessionId,
        payload: Arc<str>,
    ) -> Result<(), mpsc::error::TrySendError<Arc<str>>> {
        match self.sessions.get(session_id) {
            Some(session) => session.outbound.try_send(payload),
            None => Err(mpsc::error::TrySendError::Closed(payload)),
        }
    }

    /// Outbound queues of every connected session
    pub fn recipients(&self) -> impl Iterator<Item = (SessionId, &Outbound)> + '_ {
        self.sessions.iter().map(|(id, s)| (*id, &s.outbound))
    }
}

fn display_name(name: Option<String>) -> String {
    let trimmed = name.as_deref().map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        trimmed.chars().take(MAX_NAME_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::game::world::{Obstacle, RoundStatus};
    use crate::ws::protocol::ClientMsg;
    use tokio_test::{assert_err, assert_ok};

    fn setup() -> (SessionRegistry, World) {
        (SessionRegistry::new(), World::new(ArenaConfig::default(), 13))
    }

    fn connect(registry: &mut SessionRegistry) -> (SessionId, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(8);
        let id = SessionId::new_v4();
        registry.connect(id, tx);
        (id, rx)
    }

    #[test]
    fn join_places_player_and_starts_round() {
        let (mut registry, mut world) = setup();
        let (session, _rx) = connect(&mut registry);

        let player_id = assert_ok!(registry.join(&mut world, session, Some("Ada".into())));

        let player = &world.players[&player_id];
        assert_eq!(player.name, "Ada");
        assert!(player.alive);
        assert!((100.0..=700.0).contains(&player.x));
        assert!((100.0..=500.0).contains(&player.y));
        assert_eq!(registry.player_of(&session), Some(player_id));
        assert_eq!(world.round.status, RoundStatus::InProgress);
        assert_eq!(
            world.pending_notifications(),
            ["Ada has joined the game!", crate::game::round::GAME_BEGINS]
        );
    }

    #[test]
    fn second_join_is_rejected() {
        let (mut registry, mut world) = setup();
        let (session, _rx) = connect(&mut registry);

        let first = assert_ok!(registry.join(&mut world, session, None));
        let err = assert_err!(registry.join(&mut world, session, Some("Again".into())));

        assert_eq!(err, SessionError::AlreadyJoined(first));
        assert_eq!(world.players.len(), 1);
    }

    #[test]
    fn names_default_and_truncate() {
        assert_eq!(display_name(None), DEFAULT_NAME);
        assert_eq!(display_name(Some("   ".into())), DEFAULT_NAME);
        assert_eq!(display_name(Some("  Bo ".into())), "Bo");
        assert_eq!(display_name(Some("x".repeat(40))).chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn later_joins_do_not_restart_round() {
        let (mut registry, mut world) = setup();
        let (a, _ra) = connect(&mut registry);
        let (b, _rb) = connect(&mut registry);

        registry.join(&mut world, a, Some("A".into())).unwrap();
        world.obstacles.push(Obstacle::new(5.0, 10.0, &world.config));
        world.take_notifications();

        registry.join(&mut world, b, Some("B".into())).unwrap();
        assert_eq!(world.obstacles.len(), 1);
        assert_eq!(world.pending_notifications(), ["B has joined the game!"]);
    }

    #[test]
    fn input_requires_join_and_life() {
        let (mut registry, mut world) = setup();
        let (session, _rx) = connect(&mut registry);

        assert_eq!(
            registry.input(&mut world, session, 1.0, 2.0),
            Err(SessionError::NotJoined)
        );
        assert!(matches!(
            registry.input(&mut world, SessionId::new_v4(), 1.0, 2.0),
            Err(SessionError::UnknownSession(_))
        ));

        let id = registry.join(&mut world, session, None).unwrap();
        assert_ok!(registry.input(&mut world, session, 320.0, 240.0));
        assert_eq!(world.players[&id].target_x, 320.0);
        assert_eq!(world.players[&id].target_y, 240.0);

        world.players.get_mut(&id).unwrap().alive = false;
        assert_ok!(registry.input(&mut world, session, 10.0, 10.0));
        assert_eq!(world.players[&id].target_x, 320.0);
    }

    #[test]
    fn out_of_range_numbers_leave_target_untouched() {
        let (mut registry, mut world) = setup();
        let (session, _rx) = connect(&mut registry);
        let id = registry.join(&mut world, session, None).unwrap();
        registry.input(&mut world, session, 250.0, 150.0).unwrap();

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"input","mouse_pos":[1e39,300]}"#).unwrap();
        let ClientMsg::Input { mouse_pos: [x, y] } = msg else {
            panic!("expected input, got {msg:?}");
        };

        let err = assert_err!(registry.input(&mut world, session, x, y));
        assert!(matches!(err, SessionError::InvalidTarget(..)));
        assert_err!(registry.input(&mut world, session, f32::NAN, 10.0));
        assert_eq!(world.players[&id].target_x, 250.0);
        assert_eq!(world.players[&id].target_y, 150.0);
    }

    #[test]
    fn targets_are_clamped_to_playfield() {
        let (mut registry, mut world) = setup();
        let (session, _rx) = connect(&mut registry);
        let id = registry.join(&mut world, session, None).unwrap();

        assert_ok!(registry.input(&mut world, session, -50.0, 9000.0));
        assert_eq!(world.players[&id].target_x, 0.0);
        assert_eq!(world.players[&id].target_y, world.config.height);
    }

    #[test]
    fn repeated_input_is_idempotent() {
        let (mut registry, mut world) = setup();
        let (session, _rx) = connect(&mut registry);
        let id = registry.join(&mut world, session, None).unwrap();

        registry.input(&mut world, session, 400.0, 300.0).unwrap();
        let once = (world.players[&id].target_x, world.players[&id].target_y);
        for _ in 0..10 {
            registry.input(&mut world, session, 400.0, 300.0).unwrap();
        }
        assert_eq!((world.players[&id].target_x, world.players[&id].target_y), once);
    }

    #[test]
    fn last_leave_returns_to_waiting() {
        let (mut registry, mut world) = setup();
        let (session, _rx) = connect(&mut registry);
        let id = registry.join(&mut world, session, Some("Solo".into())).unwrap();
        world.obstacles.push(Obstacle::new(5.0, 10.0, &world.config));
        world.take_notifications();

        assert_eq!(registry.disconnect(&mut world, session), Some(id));

        assert!(world.players.is_empty());
        assert!(world.obstacles.is_empty());
        assert_eq!(world.round.status, RoundStatus::Waiting);
        assert!(registry.is_empty());
        assert_eq!(
            world.pending_notifications(),
            ["Solo has left the game.", crate::game::round::WAITING_FOR_PLAYERS]
        );
    }

    #[test]
    fn leave_with_others_keeps_round() {
        let (mut registry, mut world) = setup();
        let (a, _ra) = connect(&mut registry);
        let (b, _rb) = connect(&mut registry);
        registry.join(&mut world, a, Some("A".into())).unwrap();
        registry.join(&mut world, b, Some("B".into())).unwrap();

        registry.disconnect(&mut world, a);
        assert_eq!(world.players.len(), 1);
        assert_eq!(world.round.status, RoundStatus::InProgress);
    }

    #[test]
    fn disconnect_before_join_or_twice_is_harmless() {
        let (mut registry, mut world) = setup();
        let (session, _rx) = connect(&mut registry);

        assert_eq!(registry.disconnect(&mut world, session), None);
        assert_eq!(registry.disconnect(&mut world, session), None);
        assert!(world.pending_notifications().is_empty());
    }

    #[test]
    fn send_to_unknown_session_reports_closed() {
        let registry = SessionRegistry::new();
        let result = registry.send_to(&SessionId::new_v4(), Arc::from("x"));
        assert!(matches!(result, Err(mpsc::error::TrySendError::Closed(_))));
    }
}
