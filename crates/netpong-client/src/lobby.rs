use netpong_core::config::{MapStyle, MatchConfig, Side};
use netpong_core::engine::Role;
use netpong_core::net::channel::{ChannelError, SyncChannel};
use netpong_core::net::messages::WireMessage;
use netpong_core::net::protocol::PROTOCOL_VERSION;
use netpong_core::player::{Player, PlayerId};
use netpong_core::powerup::PowerUpKind;

use crate::ws_channel::WsChannel;

/// What this client asks the lobby for.
#[derive(Debug, Clone)]
pub struct LobbyOptions {
    /// Room to join. `None` creates a new room and makes us its leader.
    pub room: Option<String>,
    pub name: String,
    /// Players the leader waits for before starting (2 or 4).
    pub player_count: u8,
    pub map_style: MapStyle,
    pub power_ups: bool,
}

impl Default for LobbyOptions {
    fn default() -> Self {
        Self {
            room: None,
            name: "Player".to_string(),
            player_count: 2,
            map_style: MapStyle::Classic,
            power_ups: false,
        }
    }
}

/// Where we ended up once the match started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub room_code: String,
    pub player_id: PlayerId,
    pub side: Side,
    pub is_host: bool,
    pub player_count: u8,
    pub map_style: MapStyle,
    pub power_ups: bool,
}

impl Seat {
    pub fn role(&self) -> Role {
        if self.is_host { Role::Host } else { Role::Follower }
    }

    /// Match settings agreed by the lobby. Power-ups enable every kind.
    pub fn match_config(&self) -> MatchConfig {
        let config = MatchConfig::networked(self.player_count, self.map_style);
        if self.power_ups {
            config.with_power_ups(PowerUpKind::ALL)
        } else {
            config
        }
    }
}

#[derive(Debug)]
pub enum LobbyError {
    Channel(ChannelError),
    /// The server refused the join.
    Rejected(String),
    /// The room went away or the socket closed before the match started.
    Closed(String),
    /// The match started without us. We are only watching.
    Spectating,
}

impl std::fmt::Display for LobbyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel(e) => write!(f, "{e}"),
            Self::Rejected(reason) => write!(f, "join rejected: {reason}"),
            Self::Closed(reason) => write!(f, "lobby closed: {reason}"),
            Self::Spectating => write!(f, "match started without this player"),
        }
    }
}

impl std::error::Error for LobbyError {}

impl From<ChannelError> for LobbyError {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

/// Joined room, as reported by `join_room_response`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub room_code: String,
    pub player_id: PlayerId,
}

/// Send `join_room` and wait for the server's answer.
pub async fn join(channel: &mut WsChannel, options: &LobbyOptions) -> Result<Joined, LobbyError> {
    channel.send(&WireMessage::JoinRoom {
        room_code: options.room.clone(),
        player_name: options.name.clone(),
        protocol_version: PROTOCOL_VERSION,
    })?;

    loop {
        let Some(msg) = channel.recv().await else {
            return Err(LobbyError::Closed("connection closed during join".into()));
        };
        match msg {
            WireMessage::JoinRoomResponse {
                success: true,
                room_code: Some(room_code),
                player_id: Some(player_id),
                ..
            } => {
                tracing::info!(room = %room_code, player_id, "Joined room");
                return Ok(Joined {
                    room_code,
                    player_id,
                });
            },
            WireMessage::JoinRoomResponse { error, .. } => {
                return Err(LobbyError::Rejected(
                    error.unwrap_or_else(|| "unknown error".to_string()),
                ));
            },
            other => tracing::debug!(kind = other.type_name(), "Ignoring message before join"),
        }
    }
}

/// True when `leader_id` is us and enough players are waiting.
fn should_start(players: &[Player], leader_id: PlayerId, me: PlayerId, player_count: u8) -> bool {
    leader_id == me && players.len() >= player_count as usize
}

/// Wait in the lobby until `game_started`. The leader sends `start_game`
/// once the room holds enough players.
pub async fn wait_for_start(
    channel: &mut WsChannel,
    options: &LobbyOptions,
    joined: &Joined,
) -> Result<Seat, LobbyError> {
    let me = joined.player_id;
    let mut start_sent = false;
    loop {
        let Some(msg) = channel.recv().await else {
            return Err(LobbyError::Closed("connection closed in lobby".into()));
        };
        match msg {
            WireMessage::PlayerList { players, leader_id } => {
                if players.iter().any(|p| p.id == me && p.is_spectator) {
                    return Err(LobbyError::Spectating);
                }
                tracing::info!(
                    players = players.len(),
                    needed = options.player_count,
                    "Waiting for players"
                );
                if !start_sent && should_start(&players, leader_id, me, options.player_count) {
                    channel.send(&WireMessage::StartGame {
                        player_count: options.player_count,
                        map_style: options.map_style,
                        power_ups: options.power_ups,
                    })?;
                    start_sent = true;
                }
            },
            WireMessage::GameStarted {
                side,
                is_host,
                player_count,
                map_style,
                power_ups,
            } => {
                tracing::info!(%side, is_host, player_count, "Match starting");
                return Ok(Seat {
                    room_code: joined.room_code.clone(),
                    player_id: me,
                    side,
                    is_host,
                    player_count,
                    map_style,
                    power_ups,
                });
            },
            WireMessage::SessionClosed { reason } => return Err(LobbyError::Closed(reason)),
            other => tracing::debug!(kind = other.type_name(), "Ignoring message in lobby"),
        }
    }
}
