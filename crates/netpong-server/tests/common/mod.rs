use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use netpong_core::config::MapStyle;
use netpong_core::net::messages::WireMessage;
use netpong_core::net::protocol::{PROTOCOL_VERSION, encode_message};
use netpong_core::player::PlayerId;
use netpong_core::test_helpers::decode;

use netpong_server::build_app;
use netpong_server::config::ServerConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send one message as a JSON text frame.
pub async fn ws_send(stream: &mut WsStream, msg: &WireMessage) {
    let text = encode_message(msg).unwrap();
    stream.send(Message::Text(text.into())).await.unwrap();
}

/// Send a raw text frame.
pub async fn ws_send_raw(stream: &mut WsStream, text: &str) {
    stream.send(Message::Text(text.into())).await.unwrap();
}

fn join(room_code: Option<&str>, name: &str) -> WireMessage {
    WireMessage::JoinRoom {
        room_code: room_code.map(str::to_string),
        player_name: name.to_string(),
        protocol_version: PROTOCOL_VERSION,
    }
}

/// Create a room. Returns (player_id, room_code).
pub async fn ws_create_room(stream: &mut WsStream, name: &str) -> (PlayerId, String) {
    ws_send(stream, &join(None, name)).await;
    match ws_read_msg(stream).await {
        WireMessage::JoinRoomResponse {
            success: true,
            room_code: Some(code),
            player_id: Some(id),
            ..
        } => (id, code),
        other => panic!("Expected successful join_room_response, got: {other:?}"),
    }
}

/// Join a room by code and return the raw `join_room_response`.
pub async fn ws_join_room(stream: &mut WsStream, room_code: &str, name: &str) -> WireMessage {
    ws_send(stream, &join(Some(room_code), name)).await;
    ws_read_msg(stream).await
}

/// Read the next message (5s timeout).
pub async fn ws_read_msg(stream: &mut WsStream) -> WireMessage {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return decode(text.as_str()),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read a message, returning None on timeout.
pub async fn ws_try_read_msg(stream: &mut WsStream, timeout_ms: u64) -> Option<WireMessage> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return decode(text.as_str()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read messages until one matches, skipping lobby noise such as `player_list`.
pub async fn ws_read_until(
    stream: &mut WsStream,
    mut pred: impl FnMut(&WireMessage) -> bool,
) -> WireMessage {
    loop {
        let msg = ws_read_msg(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
}

/// A room with `n` connected players. The first one leads.
pub async fn ws_room(server: &TestServer, n: usize) -> (String, Vec<WsStream>) {
    let mut leader = ws_connect(&server.ws_url()).await;
    let (_, code) = ws_create_room(&mut leader, "Alice").await;
    let mut streams = vec![leader];
    for i in 1..n {
        let mut s = ws_connect(&server.ws_url()).await;
        match ws_join_room(&mut s, &code, &format!("Player{}", i + 1)).await {
            WireMessage::JoinRoomResponse { success: true, .. } => {},
            other => panic!("Expected successful join, got: {other:?}"),
        }
        streams.push(s);
    }
    // Everyone sees the full roster before the test continues.
    for s in streams.iter_mut() {
        ws_read_until(s, |m| {
            matches!(m, WireMessage::PlayerList { players, .. } if players.len() == n)
        })
        .await;
    }
    (code, streams)
}

pub fn start_game(player_count: u8) -> WireMessage {
    WireMessage::StartGame {
        player_count,
        map_style: MapStyle::Classic,
        power_ups: false,
    }
}

/// Start a match from the leader and wait for every seated player's `game_started`.
pub async fn ws_start(streams: &mut [WsStream], player_count: u8) -> Vec<WireMessage> {
    ws_send(&mut streams[0], &start_game(player_count)).await;
    let mut started = Vec::new();
    for s in streams.iter_mut().take(player_count as usize) {
        started.push(ws_read_until(s, |m| matches!(m, WireMessage::GameStarted { .. })).await);
    }
    started
}
