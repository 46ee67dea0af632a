//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::world::{PlayerId, RoundStatus};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the arena; only the first join on a connection counts
    Join {
        /// Display name, "Anonymous" when omitted
        #[serde(default)]
        name: Option<String>,
    },

    /// Steering target in playfield coordinates
    Input {
        /// Mouse position as [x, y]
        mouse_pos: [f32; 2],
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once to a client right after it joins
    Welcome { player_id: PlayerId },

    /// Full world snapshot, sent every tick
    GameState {
        players: Vec<PlayerSnapshot>,
        asteroids: Vec<ObstacleSnapshot>,
        game_info: GameInfo,
    },

    /// Human-readable event (joins, leaves, eliminations, round changes)
    Notification { message: String },
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub is_alive: bool,
}

/// Obstacle state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleSnapshot {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// Round state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInfo {
    pub status: RoundStatus,
    /// Name of the last round's sole survivor
    pub winner: Option<String>,
    /// Seconds until the next round, while finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_join_with_and_without_name() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"join","name":"Ada"}"#).unwrap();
        assert_eq!(msg, ClientMsg::Join { name: Some("Ada".into()) });

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        assert_eq!(msg, ClientMsg::Join { name: None });
    }

    #[test]
    fn parses_input() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"input","mouse_pos":[120.5,80]}"#).unwrap();
        assert_eq!(msg, ClientMsg::Input { mouse_pos: [120.5, 80.0] });
    }

    #[test]
    fn rejects_malformed_messages() {
        for raw in [
            "not json",
            r#"{"name":"no type"}"#,
            r#"{"type":"input"}"#,
            r#"{"type":"input","mouse_pos":[1]}"#,
            r#"{"type":"input","mouse_pos":"here"}"#,
            r#"{"type":"teleport"}"#,
        ] {
            assert!(serde_json::from_str::<ClientMsg>(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn game_state_wire_shape() {
        let msg = ServerMsg::GameState {
            players: vec![],
            asteroids: vec![ObstacleSnapshot {
                x: 1.0,
                y: 2.0,
                radius: 10.0,
            }],
            game_info: GameInfo {
                status: RoundStatus::InProgress,
                winner: None,
                timer: None,
            },
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "game_state",
                "players": [],
                "asteroids": [{"x": 1.0, "y": 2.0, "radius": 10.0}],
                "game_info": {"status": "in_progress", "winner": null}
            })
        );
    }

    #[test]
    fn notification_wire_shape() {
        let msg = ServerMsg::Notification {
            message: "hi".into(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "notification", "message": "hi"})
        );
    }
}
