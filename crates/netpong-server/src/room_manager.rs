use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

use netpong_core::config::Side;
use netpong_core::net::messages::WireMessage;
use netpong_core::net::protocol::{ProtocolError, encode_message};
use netpong_core::player::{Player, PlayerId, sanitize_name};
use netpong_core::room::{MatchStart, Room, RoomError, RoomState, generate_room_code};

/// Per-player sender for outbound WebSocket text frames.
/// Bounded so a slow client cannot exhaust memory; full channels drop frames.
pub type PlayerSender = mpsc::Sender<Utf8Bytes>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyError {
    RoomNotFound,
    Room(RoomError),
}

impl std::fmt::Display for LobbyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomNotFound => write!(f, "room not found"),
            Self::Room(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LobbyError {}

impl From<RoomError> for LobbyError {
    fn from(e: RoomError) -> Self {
        Self::Room(e)
    }
}

/// Why an in-game message was not relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    RoomNotFound,
    NotRunning,
    /// Sender has no side in the running match.
    NotSeated,
    /// Host-only message from someone other than the host.
    NotHost,
    /// Follower-only message from the host.
    FromHost,
    /// `update_score` naming a side other than the sender's.
    WrongSide,
    /// Lobby message sent mid-connection.
    NotRelayable,
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::RoomNotFound => "room not found",
            Self::NotRunning => "no match running",
            Self::NotSeated => "sender is not seated",
            Self::NotHost => "only the host may send this",
            Self::FromHost => "the host may not send this",
            Self::WrongSide => "score claim for another side",
            Self::NotRelayable => "message is not relayed",
        };
        write!(f, "{reason}")
    }
}

impl std::error::Error for RelayError {}

/// Public view of a room for the HTTP API.
#[derive(Debug, Clone, Serialize)]
pub struct RoomStatus {
    pub code: String,
    pub state: RoomState,
    pub leader_id: PlayerId,
    pub players: Vec<Player>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<MatchStart>,
}

/// Room and connection counts, by lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoomStats {
    pub active: usize,
    pub lobby: usize,
    pub running: usize,
    pub finished: usize,
    /// Open connections across every room.
    pub players: usize,
    pub spectators: usize,
}

struct RoomEntry {
    room: Room,
    connections: HashMap<PlayerId, PlayerSender>,
    last_activity: Instant,
}

impl RoomEntry {
    fn send_to(&self, player_id: PlayerId, frame: Utf8Bytes) {
        if let Some(sender) = self.connections.get(&player_id)
            && let Err(e) = sender.try_send(frame)
        {
            tracing::debug!(
                player_id, room = %self.room.code, error = %e,
                "Failed to send to player (slow or disconnected)"
            );
        }
    }

    /// Send to every connection except `exclude`. Returns how many were reached.
    fn broadcast(&self, exclude: Option<PlayerId>, frame: &Utf8Bytes) -> usize {
        let mut sent = 0;
        for (&pid, sender) in &self.connections {
            if Some(pid) == exclude {
                continue;
            }
            match sender.try_send(frame.clone()) {
                Ok(()) => sent += 1,
                Err(e) => tracing::debug!(
                    player_id = pid, room = %self.room.code, error = %e,
                    "Skipping broadcast to slow client"
                ),
            }
        }
        sent
    }

    fn player_list(&self) -> WireMessage {
        WireMessage::PlayerList {
            players: self.room.players.clone(),
            leader_id: self.room.leader_id,
        }
    }
}

/// Encode for the wire, logging failures.
fn frame(msg: &WireMessage) -> Option<Utf8Bytes> {
    match encode_message(msg) {
        Ok(text) => Some(Utf8Bytes::from(text)),
        Err(e) => {
            tracing::warn!(kind = msg.type_name(), error = %e, "Failed to encode message");
            None
        },
    }
}

/// Manages all active rooms and their connected players.
pub struct RoomManager {
    rooms: HashMap<String, RoomEntry>,
    next_player_id: PlayerId,
    max_players: u8,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(8)
    }
}

impl RoomManager {
    pub fn new(max_players: u8) -> Self {
        Self {
            rooms: HashMap::new(),
            next_player_id: 1,
            max_players,
        }
    }

    fn alloc_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    /// Create a new room led by the caller. Returns (room_code, player_id).
    pub fn create_room(&mut self, player_name: &str, sender: PlayerSender) -> (String, PlayerId) {
        let code = generate_unique_room_code(&self.rooms);
        let player_id = self.alloc_player_id();
        let player = Player {
            id: player_id,
            display_name: sanitize_name(player_name, player_id),
            is_leader: true,
            is_spectator: false,
            side: None,
        };
        let mut room = Room::new(code.clone(), player);
        room.config.max_players = self.max_players;
        let mut connections = HashMap::new();
        connections.insert(player_id, sender);
        self.rooms.insert(
            code.clone(),
            RoomEntry {
                room,
                connections,
                last_activity: Instant::now(),
            },
        );
        tracing::info!(player_id, room = %code, "Room created");
        (code, player_id)
    }

    /// Join an existing room. Players joining mid-game enter as spectators.
    pub fn join_room(
        &mut self,
        room_code: &str,
        player_name: &str,
        sender: PlayerSender,
    ) -> Result<PlayerId, LobbyError> {
        if !self.rooms.contains_key(room_code) {
            return Err(LobbyError::RoomNotFound);
        }
        let player_id = self.alloc_player_id();
        let entry = self
            .rooms
            .get_mut(room_code)
            .ok_or(LobbyError::RoomNotFound)?;
        entry.room.add_player(Player {
            id: player_id,
            display_name: sanitize_name(player_name, player_id),
            is_leader: false,
            is_spectator: false,
            side: None,
        })?;
        entry.connections.insert(player_id, sender);
        entry.last_activity = Instant::now();
        Ok(player_id)
    }

    /// Remove a player from their room. A seated player leaving a running
    /// match ends it for everyone with `session_closed`.
    /// Returns the room code if the room was destroyed (empty after leave).
    pub fn leave_room(&mut self, room_code: &str, player_id: PlayerId) -> Option<String> {
        let entry = self.rooms.get_mut(room_code)?;
        entry.connections.remove(&player_id);

        let ends_match = entry.room.state == RoomState::Running && entry.room.is_seated(player_id);
        let removed = entry.room.remove_player(player_id);

        if entry.room.players.is_empty() {
            self.rooms.remove(room_code);
            tracing::info!(room = room_code, "Room destroyed");
            return Some(room_code.to_string());
        }

        if ends_match {
            entry.room.state = RoomState::Finished;
            let name = removed.map_or_else(|| format!("Player{player_id}"), |p| p.display_name);
            let reason = format!("{name} disconnected");
            tracing::info!(player_id, room = room_code, "Seated player left, ending match");
            if let Some(data) = frame(&WireMessage::SessionClosed { reason }) {
                entry.broadcast(None, &data);
            }
        }
        None
    }

    /// Seat players and tell each one its side. The leader hosts on LEFT.
    pub fn start_game(
        &mut self,
        room_code: &str,
        requester_id: PlayerId,
        start: MatchStart,
    ) -> Result<Vec<(PlayerId, Side)>, LobbyError> {
        let entry = self
            .rooms
            .get_mut(room_code)
            .ok_or(LobbyError::RoomNotFound)?;
        let seats = entry.room.start(requester_id, start)?;
        entry.last_activity = Instant::now();

        for &(player_id, side) in &seats {
            let msg = WireMessage::GameStarted {
                side,
                is_host: side == Side::Left,
                player_count: start.player_count,
                map_style: start.map_style,
                power_ups: start.power_ups,
            };
            if let Some(data) = frame(&msg) {
                entry.send_to(player_id, data);
            }
            tracing::info!(player_id, room = room_code, %side, "Side assigned");
        }
        if let Some(data) = frame(&entry.player_list()) {
            entry.broadcast(None, &data);
        }
        Ok(seats)
    }

    /// Route an in-game message. Host messages fan out to everyone else;
    /// follower messages go to the host with the sender's side stamped on.
    /// Returns the number of connections reached.
    pub fn relay(
        &mut self,
        room_code: &str,
        from: PlayerId,
        msg: WireMessage,
    ) -> Result<usize, RelayError> {
        let entry = self
            .rooms
            .get_mut(room_code)
            .ok_or(RelayError::RoomNotFound)?;
        if entry.room.state != RoomState::Running {
            return Err(RelayError::NotRunning);
        }
        let sender_side = entry
            .room
            .player(from)
            .and_then(|p| p.side)
            .ok_or(RelayError::NotSeated)?;
        let host = entry.room.seated_on(Side::Left);

        if msg.is_host_to_follower() {
            if host != Some(from) {
                return Err(RelayError::NotHost);
            }
            if let WireMessage::GameOver { winner, .. } = &msg {
                tracing::info!(room = room_code, %winner, "Match finished");
                entry.room.state = RoomState::Finished;
            }
            let Some(data) = frame(&msg) else {
                return Ok(0);
            };
            return Ok(entry.broadcast(Some(from), &data));
        }

        let stamped = match msg {
            WireMessage::PaddleMove {
                delta, rotation, ..
            } => WireMessage::PaddleMove {
                delta,
                rotation,
                side: Some(sender_side),
            },
            WireMessage::UpdateScore { side } if side != sender_side => {
                return Err(RelayError::WrongSide);
            },
            claim @ WireMessage::UpdateScore { .. } => claim,
            _ => return Err(RelayError::NotRelayable),
        };
        if host == Some(from) {
            return Err(RelayError::FromHost);
        }
        let Some(host) = host else {
            return Ok(0);
        };
        match (frame(&stamped), entry.connections.contains_key(&host)) {
            (Some(data), true) => {
                entry.send_to(host, data);
                Ok(1)
            },
            _ => Ok(0),
        }
    }

    /// Build and broadcast a `player_list` to everyone in the room.
    pub fn broadcast_player_list(&self, room_code: &str) {
        if let Some(entry) = self.rooms.get(room_code)
            && let Some(data) = frame(&entry.player_list())
        {
            entry.broadcast(None, &data);
        }
    }

    /// Build a successful `join_room_response`.
    pub fn make_join_response(
        player_id: PlayerId,
        room_code: &str,
    ) -> Result<String, ProtocolError> {
        encode_message(&WireMessage::JoinRoomResponse {
            success: true,
            room_code: Some(room_code.to_string()),
            player_id: Some(player_id),
            error: None,
        })
    }

    /// Build a failed `join_room_response`.
    pub fn make_join_error(error: &str) -> Result<String, ProtocolError> {
        encode_message(&WireMessage::JoinRoomResponse {
            success: false,
            room_code: None,
            player_id: None,
            error: Some(error.to_string()),
        })
    }

    pub fn get_leader_id(&self, room_code: &str) -> Option<PlayerId> {
        self.rooms.get(room_code).map(|e| e.room.leader_id)
    }

    pub fn get_room_state(&self, room_code: &str) -> Option<RoomState> {
        self.rooms.get(room_code).map(|e| e.room.state)
    }

    pub fn room_status(&self, room_code: &str) -> Option<RoomStatus> {
        self.rooms.get(room_code).map(|e| RoomStatus {
            code: e.room.code.clone(),
            state: e.room.state,
            leader_id: e.room.leader_id,
            players: e.room.players.clone(),
            started: e.room.started,
        })
    }

    pub fn stats(&self) -> RoomStats {
        let mut stats = RoomStats {
            active: self.rooms.len(),
            ..RoomStats::default()
        };
        for entry in self.rooms.values() {
            match entry.room.state {
                RoomState::Lobby => stats.lobby += 1,
                RoomState::Running => stats.running += 1,
                RoomState::Finished => stats.finished += 1,
            }
            stats.players += entry.connections.len();
            stats.spectators += entry.room.players.iter().filter(|p| p.is_spectator).count();
        }
        stats
    }

    /// Touch room activity timestamp (call on any incoming message).
    pub fn touch_activity(&mut self, room_code: &str) {
        if let Some(entry) = self.rooms.get_mut(room_code) {
            entry.last_activity = Instant::now();
        }
    }

    /// Remove rooms that have been idle for longer than `max_idle`.
    /// Returns the number of rooms removed.
    pub fn cleanup_idle_rooms(&mut self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.rooms.len();
        self.rooms
            .retain(|_, entry| now.duration_since(entry.last_activity) < max_idle);
        before - self.rooms.len()
    }

    #[cfg(test)]
    pub fn get_players(&self, room_code: &str) -> Option<Vec<Player>> {
        self.rooms.get(room_code).map(|e| e.room.players.clone())
    }

    #[cfg(test)]
    pub fn room_exists(&self, room_code: &str) -> bool {
        self.rooms.contains_key(room_code)
    }
}

/// Generate a unique room code, retrying on collision with existing rooms.
fn generate_unique_room_code(existing: &HashMap<String, RoomEntry>) -> String {
    loop {
        let code = generate_room_code();
        if !existing.contains_key(&code) {
            return code;
        }
    }
}
