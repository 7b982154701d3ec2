use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{ConnectInfo, FromRequest, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use netpong_core::net::messages::WireMessage;
use netpong_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, ProtocolError, decode_message,
};
use netpong_core::player::PlayerId;
use netpong_core::room::{MatchStart, is_valid_room_code};

use crate::rate_limit::TokenBucket;
use crate::room_manager::RoomManager;
use crate::state::{AppState, ConnectionGuard, IpConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    // Per-IP connection limit
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));
    let max_per_ip = state.config.limits.max_ws_per_ip;
    let ip_guard =
        IpConnectionGuard::try_acquire(ip, Arc::clone(&state.ws_per_ip), max_per_ip).await;
    let Some(ip_guard) = ip_guard else {
        tracing::warn!(%ip, max_per_ip, "Per-IP WS connection limit reached");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    };

    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, ip_guard))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState, _ip_guard: IpConnectionGuard) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // The first frame must be a join_room.
    let first = match ws_receiver.next().await {
        Some(Ok(Message::Text(text))) => text,
        _ => return,
    };
    let (requested_code, player_name, protocol_version) = match decode_message(first.as_str()) {
        Ok(WireMessage::JoinRoom {
            room_code,
            player_name,
            protocol_version,
        }) => (room_code, player_name, protocol_version),
        Ok(other) => {
            tracing::warn!(kind = other.type_name(), "First frame was not join_room");
            send_join_error(&mut ws_sender, "Expected join_room").await;
            return;
        },
        Err(e) => {
            tracing::warn!(error = %e, "Undecodable first frame");
            return;
        },
    };

    if protocol_version != 0 && protocol_version != PROTOCOL_VERSION {
        send_join_error(
            &mut ws_sender,
            &format!("Protocol version mismatch: client={protocol_version}, server={PROTOCOL_VERSION}"),
        )
        .await;
        return;
    }

    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.player_message_buffer);
    let joined = attempt_join(requested_code.as_deref(), &player_name, tx, &state).await;
    let (room_code, player_id) = match joined {
        Ok(joined) => joined,
        Err(err) => {
            send_join_error(&mut ws_sender, &err).await;
            return;
        },
    };

    let delivered = match RoomManager::make_join_response(player_id, &room_code) {
        Ok(response) => ws_sender.send(Message::Text(response.into())).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode join_room_response");
            false
        },
    };
    if !delivered {
        state.rooms.write().await.leave_room(&room_code, player_id);
        return;
    }
    tracing::info!(player_id, room = %room_code, "Player joined");

    {
        let rooms = state.rooms.read().await;
        rooms.broadcast_player_list(&room_code);
    }

    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, &room_code, player_id).await;

    // Player disconnected, clean up
    let mut rooms = state.rooms.write().await;
    let destroyed = rooms.leave_room(&room_code, player_id);
    if destroyed.is_none() {
        rooms.broadcast_player_list(&room_code);
    }
    drop(rooms);

    tracing::info!(player_id, room = %room_code, "Player disconnected");
}

/// Create a room when no code is given, otherwise join the named one.
async fn attempt_join(
    requested_code: Option<&str>,
    player_name: &str,
    tx: mpsc::Sender<Utf8Bytes>,
    state: &AppState,
) -> Result<(String, PlayerId), String> {
    let code = requested_code
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty());
    let mut rooms = state.rooms.write().await;
    match code {
        None => Ok(rooms.create_room(player_name, tx)),
        Some(code) if !is_valid_room_code(&code) => Err("Invalid room code".to_string()),
        Some(code) => rooms
            .join_room(&code, player_name, tx)
            .map(|player_id| (code, player_id))
            .map_err(|e| e.to_string()),
    }
}

async fn send_join_error(ws_sender: &mut SplitSink<WebSocket, Message>, error: &str) {
    if let Ok(response) = RoomManager::make_join_error(error)
        && let Err(e) = ws_sender.send(Message::Text(response.into())).await
    {
        tracing::warn!(error = %e, "Failed to send join error response");
    }
}

fn spawn_writer(mut ws_sender: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Utf8Bytes>) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Text(data)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });
}

async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    room_code: &str,
    player_id: PlayerId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = TokenBucket::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            if rate_limiter.dropped() == 1 {
                tracing::warn!(player_id, room_code, "Rate limited, dropping frames");
            }
            continue;
        }
        let dropped = rate_limiter.end_burst();
        if dropped > 0 {
            tracing::debug!(player_id, room_code, dropped, "Rate limit burst over");
        }
        if text.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let msg = match decode_message(text.as_str()) {
            Ok(m) => m,
            Err(ProtocolError::UnknownMessageType(kind)) => {
                tracing::warn!(player_id, room_code, %kind, "Dropping unknown message type");
                continue;
            },
            Err(e) => {
                tracing::warn!(player_id, room_code, error = %e, "Dropping malformed frame");
                continue;
            },
        };

        let mut rooms = state.rooms.write().await;
        rooms.touch_activity(room_code);
        match msg {
            WireMessage::StartGame {
                player_count,
                map_style,
                power_ups,
            } => {
                let start = MatchStart {
                    player_count,
                    map_style,
                    power_ups,
                };
                match rooms.start_game(room_code, player_id, start) {
                    Ok(seats) => tracing::info!(
                        player_id,
                        room_code,
                        seats = seats.len(),
                        map = map_style.as_str(),
                        "Game started"
                    ),
                    Err(e) => tracing::warn!(
                        player_id,
                        room_code,
                        error = %e,
                        "Failed to start game"
                    ),
                }
            },
            other => {
                let kind = other.type_name();
                if let Err(e) = rooms.relay(room_code, player_id, other) {
                    tracing::debug!(player_id, room_code, kind, error = %e, "Message not relayed");
                }
            },
        }
    }
}
