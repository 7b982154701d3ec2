use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{MapStyle, Side};
use crate::player::{Player, PlayerId};

/// Letters used in room codes. I and O are left out to avoid confusion with 1 and 0.
const CODE_LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Generate a room code of the form `ABCD-1234`.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    let letters: String = (0..4)
        .map(|_| CODE_LETTERS[rng.random_range(0..CODE_LETTERS.len())] as char)
        .collect();
    let digits: u16 = rng.random_range(0..10_000);
    format!("{letters}-{digits:04}")
}

/// Check that a code has the `ABCD-1234` shape.
pub fn is_valid_room_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 9
        && bytes[..4].iter().all(|b| b.is_ascii_uppercase())
        && bytes[4] == b'-'
        && bytes[5..].iter().all(|b| b.is_ascii_digit())
}

/// Room limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub max_players: u8,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self { max_players: 8 }
    }
}

/// Current state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Lobby,
    Running,
    Finished,
}

/// Settings the leader picked when starting the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStart {
    pub player_count: u8,
    pub map_style: MapStyle,
    pub power_ups: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    NotLeader,
    NotInLobby,
    InvalidPlayerCount(u8),
    NotEnoughPlayers { needed: u8, present: usize },
    RoomFull,
}

impl std::fmt::Display for RoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotLeader => write!(f, "only the room leader can start the game"),
            Self::NotInLobby => write!(f, "game already in progress"),
            Self::InvalidPlayerCount(n) => write!(f, "player count must be 2 or 4, got {n}"),
            Self::NotEnoughPlayers { needed, present } => {
                write!(f, "need {needed} players, room has {present}")
            },
            Self::RoomFull => write!(f, "room is full"),
        }
    }
}

impl std::error::Error for RoomError {}

/// A lobby room: the players in join order plus the leader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub code: String,
    pub leader_id: PlayerId,
    pub players: Vec<Player>,
    pub state: RoomState,
    pub config: RoomConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<MatchStart>,
}

impl Room {
    pub fn new(code: String, leader: Player) -> Self {
        Self {
            code,
            leader_id: leader.id,
            players: vec![leader],
            state: RoomState::Lobby,
            config: RoomConfig::default(),
            started: None,
        }
    }

    pub fn add_player(&mut self, mut player: Player) -> Result<(), RoomError> {
        if self.players.len() >= self.config.max_players as usize {
            return Err(RoomError::RoomFull);
        }
        player.is_leader = false;
        // Late joiners watch.
        player.is_spectator = self.state != RoomState::Lobby;
        player.side = None;
        self.players.push(player);
        Ok(())
    }

    /// Remove a player. Promotes the next player to leader if the leader left.
    /// Returns the removed player.
    pub fn remove_player(&mut self, player_id: PlayerId) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.id == player_id)?;
        let removed = self.players.remove(idx);
        if removed.id == self.leader_id
            && let Some(next) = self.players.first_mut()
        {
            next.is_leader = true;
            self.leader_id = next.id;
        }
        Some(removed)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    /// Seat players in join order on LEFT, RIGHT, BOTTOM, TOP. The leader is
    /// always first and so always hosts on LEFT. Extra players become spectators.
    pub fn start(
        &mut self,
        requester: PlayerId,
        start: MatchStart,
    ) -> Result<Vec<(PlayerId, Side)>, RoomError> {
        if requester != self.leader_id {
            return Err(RoomError::NotLeader);
        }
        if self.state != RoomState::Lobby {
            return Err(RoomError::NotInLobby);
        }
        if start.player_count != 2 && start.player_count != 4 {
            return Err(RoomError::InvalidPlayerCount(start.player_count));
        }
        if self.players.len() < start.player_count as usize {
            return Err(RoomError::NotEnoughPlayers {
                needed: start.player_count,
                present: self.players.len(),
            });
        }

        // Leader first, then everyone else in join order.
        let leader = self.leader_id;
        self.players.sort_by_key(|p| p.id != leader);

        let seats = &Side::ALL[..start.player_count as usize];
        let mut assigned = Vec::with_capacity(seats.len());
        for (i, player) in self.players.iter_mut().enumerate() {
            match seats.get(i) {
                Some(&side) => {
                    player.side = Some(side);
                    player.is_spectator = false;
                    assigned.push((player.id, side));
                },
                None => {
                    player.side = None;
                    player.is_spectator = true;
                },
            }
        }
        self.state = RoomState::Running;
        self.started = Some(start);
        Ok(assigned)
    }

    /// Player seated on `side`, if any.
    pub fn seated_on(&self, side: Side) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|p| p.side == Some(side))
            .map(|p| p.id)
    }

    pub fn is_seated(&self, player_id: PlayerId) -> bool {
        self.player(player_id).is_some_and(|p| p.side.is_some())
    }
}
