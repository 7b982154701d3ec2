//! Headless netpong client. Joins a room over WebSocket, waits for the match
//! to start, then runs it as host or follower.

pub mod lobby;
pub mod runner;
pub mod ws_channel;

pub use lobby::{Joined, LobbyError, LobbyOptions, Seat};
pub use runner::{MatchSummary, RunOptions, run_match};
pub use ws_channel::{ConnectError, WsChannel};
