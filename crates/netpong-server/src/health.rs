use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use netpong_core::net::protocol::PROTOCOL_VERSION;

use crate::room_manager::RoomStats;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `saturated` once the WebSocket cap is reached.
    pub status: &'static str,
    pub version: &'static str,
    pub protocol_version: u8,
    pub connections: Connections,
    pub rooms: RoomStats,
}

#[derive(Serialize)]
pub struct Connections {
    pub websocket: usize,
    pub capacity: usize,
}

impl HealthResponse {
    fn new(websocket: usize, capacity: usize, rooms: RoomStats) -> Self {
        Self {
            status: if websocket >= capacity { "saturated" } else { "healthy" },
            version: env!("CARGO_PKG_VERSION"),
            protocol_version: PROTOCOL_VERSION,
            connections: Connections {
                websocket,
                capacity,
            },
            rooms,
        }
    }
}

/// `GET /health`: connection load and rooms by lifecycle state.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let websocket = state.ws_connection_count.load(Ordering::Relaxed);
    let rooms = state.rooms.read().await.stats();
    Json(HealthResponse::new(
        websocket,
        state.config.limits.max_ws_connections,
        rooms,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_rooms_by_state() {
        let rooms = RoomStats {
            active: 3,
            lobby: 1,
            running: 2,
            players: 7,
            ..RoomStats::default()
        };
        let json = serde_json::to_value(HealthResponse::new(5, 200, rooms)).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["connections"]["websocket"], 5);
        assert_eq!(json["rooms"]["running"], 2);
        assert_eq!(json["rooms"]["players"], 7);
        assert_eq!(json["protocol_version"], PROTOCOL_VERSION);
    }

    #[test]
    fn full_server_is_saturated() {
        let resp = HealthResponse::new(200, 200, RoomStats::default());
        assert_eq!(resp.status, "saturated");
    }
}
