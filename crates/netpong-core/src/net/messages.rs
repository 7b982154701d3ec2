use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{MapStyle, PaddleSize, Side};
use crate::engine::BallState;
use crate::player::{Player, PlayerId};
use crate::powerup::PowerUpView;

/// Full authoritative state, broadcast by the host every frame.
/// Followers replace their mirror with it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    /// Monotonic per match. Receivers drop snapshots that are not newer than the last one.
    pub seq: u64,
    pub ball: BallState,
    /// Paddle offset along its axis of travel.
    pub paddles: BTreeMap<Side, f32>,
    pub paddle_sizes: BTreeMap<Side, PaddleSize>,
    pub scores: BTreeMap<Side, u32>,
    #[serde(default)]
    pub last_winner: Option<Side>,
    #[serde(default)]
    pub last_loser: Option<Side>,
    #[serde(default)]
    pub power_ups: Vec<PowerUpView>,
}

/// Every frame on the wire, as a JSON object tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    // Follower -> host
    PaddleMove {
        delta: f32,
        #[serde(default)]
        rotation: f32,
        /// Filled in by the server from the sender's seat.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        side: Option<Side>,
    },
    UpdateScore {
        side: Side,
    },

    // Host -> followers
    SetBallVelocity {
        x: f32,
        y: f32,
    },
    GameStateUpdate {
        snapshot: SyncSnapshot,
    },
    /// Winner and loser as wire codes (LEFT=1, RIGHT=2, BOTTOM=3, TOP=4).
    ResetRound {
        last_winner: u8,
        last_loser: u8,
    },
    GameOver {
        winner: Side,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tournament_id: Option<String>,
    },

    // Lobby
    JoinRoom {
        /// `None` creates a new room.
        #[serde(default)]
        room_code: Option<String>,
        player_name: String,
        #[serde(default)]
        protocol_version: u8,
    },
    JoinRoomResponse {
        success: bool,
        #[serde(default)]
        room_code: Option<String>,
        #[serde(default)]
        player_id: Option<PlayerId>,
        #[serde(default)]
        error: Option<String>,
    },
    PlayerList {
        players: Vec<Player>,
        leader_id: PlayerId,
    },
    StartGame {
        player_count: u8,
        map_style: MapStyle,
        #[serde(default)]
        power_ups: bool,
    },
    GameStarted {
        side: Side,
        is_host: bool,
        player_count: u8,
        map_style: MapStyle,
        power_ups: bool,
    },
    SessionClosed {
        reason: String,
    },
}

/// Wire names of every message kind, in declaration order.
pub const MESSAGE_TYPES: &[&str] = &[
    "paddle_move",
    "update_score",
    "set_ball_velocity",
    "game_state_update",
    "reset_round",
    "game_over",
    "join_room",
    "join_room_response",
    "player_list",
    "start_game",
    "game_started",
    "session_closed",
];

impl WireMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PaddleMove { .. } => "paddle_move",
            Self::UpdateScore { .. } => "update_score",
            Self::SetBallVelocity { .. } => "set_ball_velocity",
            Self::GameStateUpdate { .. } => "game_state_update",
            Self::ResetRound { .. } => "reset_round",
            Self::GameOver { .. } => "game_over",
            Self::JoinRoom { .. } => "join_room",
            Self::JoinRoomResponse { .. } => "join_room_response",
            Self::PlayerList { .. } => "player_list",
            Self::StartGame { .. } => "start_game",
            Self::GameStarted { .. } => "game_started",
            Self::SessionClosed { .. } => "session_closed",
        }
    }

    /// Messages only the host may send; the server relays them to followers.
    pub fn is_host_to_follower(&self) -> bool {
        matches!(
            self,
            Self::SetBallVelocity { .. }
                | Self::GameStateUpdate { .. }
                | Self::ResetRound { .. }
                | Self::GameOver { .. }
        )
    }

    /// Messages followers send; the server relays them to the host.
    pub fn is_follower_to_host(&self) -> bool {
        matches!(self, Self::PaddleMove { .. } | Self::UpdateScore { .. })
    }

    /// Build a `reset_round` from sides.
    pub fn reset_round(winner: Side, loser: Side) -> Self {
        Self::ResetRound {
            last_winner: winner.wire_code(),
            last_loser: loser.wire_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_match_serde_tags() {
        let msgs = [
            WireMessage::PaddleMove {
                delta: 1.0,
                rotation: 0.0,
                side: None,
            },
            WireMessage::UpdateScore { side: Side::Left },
            WireMessage::SetBallVelocity { x: 0.5, y: 0.0 },
            WireMessage::reset_round(Side::Left, Side::Right),
            WireMessage::GameOver {
                winner: Side::Top,
                tournament_id: None,
            },
            WireMessage::SessionClosed {
                reason: "bye".into(),
            },
        ];
        for msg in msgs {
            let value = serde_json::to_value(&msg).unwrap();
            assert_eq!(value["type"], msg.type_name());
            assert!(MESSAGE_TYPES.contains(&msg.type_name()));
        }
    }

    #[test]
    fn reset_round_uses_wire_codes() {
        let json = serde_json::to_string(&WireMessage::reset_round(Side::Top, Side::Bottom)).unwrap();
        assert_eq!(json, r#"{"type":"reset_round","last_winner":4,"last_loser":3}"#);
    }

    #[test]
    fn paddle_move_side_is_optional() {
        let msg: WireMessage =
            serde_json::from_str(r#"{"type":"paddle_move","delta":-0.8}"#).unwrap();
        assert_eq!(
            msg,
            WireMessage::PaddleMove {
                delta: -0.8,
                rotation: 0.0,
                side: None
            }
        );
        let stamped = serde_json::to_string(&WireMessage::PaddleMove {
            delta: 0.8,
            rotation: 0.0,
            side: Some(Side::Right),
        })
        .unwrap();
        assert!(stamped.contains(r#""side":"right""#));
    }

    #[test]
    fn relay_direction() {
        assert!(WireMessage::SetBallVelocity { x: 0.0, y: 0.0 }.is_host_to_follower());
        assert!(WireMessage::UpdateScore { side: Side::Left }.is_follower_to_host());
        let join = WireMessage::JoinRoom {
            room_code: None,
            player_name: "a".into(),
            protocol_version: 1,
        };
        assert!(!join.is_host_to_follower() && !join.is_follower_to_host());
    }
}
