#[allow(dead_code)]
mod common;

use std::collections::BTreeMap;

use common::{
    TestServer, start_game, ws_connect, ws_create_room, ws_join_room, ws_read_msg, ws_read_until,
    ws_room, ws_send, ws_send_raw, ws_start, ws_try_read_msg,
};
use netpong_core::config::{MapStyle, Side};
use netpong_core::net::messages::WireMessage;
use netpong_core::room::is_valid_room_code;
use netpong_core::test_helpers::ready_engine;

#[tokio::test]
async fn create_room() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    let (player_id, room_code) = ws_create_room(&mut stream, "Alice").await;
    assert_eq!(player_id, 1);
    assert!(is_valid_room_code(&room_code));

    match ws_read_msg(&mut stream).await {
        WireMessage::PlayerList { players, leader_id } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].display_name, "Alice");
            assert!(players[0].is_leader);
            assert_eq!(leader_id, player_id);
        },
        other => panic!("Expected player_list, got: {other:?}"),
    }
}

#[tokio::test]
async fn join_existing_room() {
    let server = TestServer::new().await;

    let mut leader = ws_connect(&server.ws_url()).await;
    let (leader_id, room_code) = ws_create_room(&mut leader, "Alice").await;
    let _ = ws_read_msg(&mut leader).await; // player_list (1)

    let mut client = ws_connect(&server.ws_url()).await;
    match ws_join_room(&mut client, &room_code, "Bob").await {
        WireMessage::JoinRoomResponse {
            success,
            player_id,
            room_code: code,
            ..
        } => {
            assert!(success);
            assert_eq!(player_id, Some(2));
            assert_eq!(code.as_deref(), Some(room_code.as_str()));
        },
        other => panic!("Expected join_room_response, got: {other:?}"),
    }

    for stream in [&mut client, &mut leader] {
        match ws_read_msg(stream).await {
            WireMessage::PlayerList { players, leader_id: id } => {
                assert_eq!(players.len(), 2);
                assert_eq!(id, leader_id);
            },
            other => panic!("Expected player_list, got: {other:?}"),
        }
    }
}

#[tokio::test]
async fn join_accepts_lowercase_code() {
    let server = TestServer::new().await;
    let mut leader = ws_connect(&server.ws_url()).await;
    let (_, room_code) = ws_create_room(&mut leader, "Alice").await;

    let mut client = ws_connect(&server.ws_url()).await;
    let resp = ws_join_room(&mut client, &room_code.to_lowercase(), "Bob").await;
    assert!(matches!(resp, WireMessage::JoinRoomResponse { success: true, .. }));
}

#[tokio::test]
async fn join_nonexistent_room() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    match ws_join_room(&mut stream, "ZZZZ-9999", "Bob").await {
        WireMessage::JoinRoomResponse { success, error, .. } => {
            assert!(!success);
            assert_eq!(error.as_deref(), Some("room not found"));
        },
        other => panic!("Expected join_room_response, got: {other:?}"),
    }
}

#[tokio::test]
async fn join_with_malformed_code() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    match ws_join_room(&mut stream, "not a code", "Bob").await {
        WireMessage::JoinRoomResponse { success, error, .. } => {
            assert!(!success);
            assert_eq!(error.as_deref(), Some("Invalid room code"));
        },
        other => panic!("Expected join_room_response, got: {other:?}"),
    }
}

#[tokio::test]
async fn protocol_version_mismatch_is_rejected() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    ws_send(
        &mut stream,
        &WireMessage::JoinRoom {
            room_code: None,
            player_name: "Alice".into(),
            protocol_version: 99,
        },
    )
    .await;
    match ws_read_msg(&mut stream).await {
        WireMessage::JoinRoomResponse { success, error, .. } => {
            assert!(!success);
            assert!(error.unwrap().contains("Protocol version mismatch"));
        },
        other => panic!("Expected join_room_response, got: {other:?}"),
    }
}

#[tokio::test]
async fn first_frame_must_be_join_room() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    ws_send(&mut stream, &start_game(2)).await;
    match ws_read_msg(&mut stream).await {
        WireMessage::JoinRoomResponse { success, .. } => assert!(!success),
        other => panic!("Expected join_room_response, got: {other:?}"),
    }
}

#[tokio::test]
async fn start_game_assigns_sides() {
    let server = TestServer::new().await;
    let (_, mut streams) = ws_room(&server, 2).await;

    let started = ws_start(&mut streams, 2).await;
    assert_eq!(
        started[0],
        WireMessage::GameStarted {
            side: Side::Left,
            is_host: true,
            player_count: 2,
            map_style: MapStyle::Classic,
            power_ups: false,
        }
    );
    assert_eq!(
        started[1],
        WireMessage::GameStarted {
            side: Side::Right,
            is_host: false,
            player_count: 2,
            map_style: MapStyle::Classic,
            power_ups: false,
        }
    );
}

#[tokio::test]
async fn four_player_seating_follows_join_order() {
    let server = TestServer::new().await;
    let (_, mut streams) = ws_room(&server, 5).await;

    let started = ws_start(&mut streams, 4).await;
    let sides: Vec<Side> = started
        .iter()
        .map(|m| match m {
            WireMessage::GameStarted { side, .. } => *side,
            other => panic!("Expected game_started, got: {other:?}"),
        })
        .collect();
    assert_eq!(sides, vec![Side::Left, Side::Right, Side::Bottom, Side::Top]);

    // The fifth player watches and gets the seated roster instead.
    match ws_read_msg(&mut streams[4]).await {
        WireMessage::PlayerList { players, .. } => {
            let spectators = players.iter().filter(|p| p.is_spectator).count();
            assert_eq!(spectators, 1);
        },
        other => panic!("Expected player_list, got: {other:?}"),
    }
}

#[tokio::test]
async fn non_leader_cannot_start() {
    let server = TestServer::new().await;
    let (_, mut streams) = ws_room(&server, 2).await;

    ws_send(&mut streams[1], &start_game(2)).await;
    assert!(ws_try_read_msg(&mut streams[0], 200).await.is_none());
    assert!(ws_try_read_msg(&mut streams[1], 50).await.is_none());
}

#[tokio::test]
async fn snapshots_relay_from_host_to_follower() {
    let server = TestServer::new().await;
    let (_, mut streams) = ws_room(&server, 2).await;
    ws_start(&mut streams, 2).await;
    // Drain the post-start roster.
    for s in streams.iter_mut() {
        ws_read_until(s, |m| matches!(m, WireMessage::PlayerList { .. })).await;
    }

    let (engine, _) = ready_engine(2);
    let scores: BTreeMap<Side, u32> = [(Side::Left, 3), (Side::Right, 1)].into_iter().collect();
    let snapshot = engine.snapshot(7, &scores, Vec::new());
    let update = WireMessage::GameStateUpdate {
        snapshot: snapshot.clone(),
    };
    ws_send(&mut streams[0], &update).await;

    assert_eq!(ws_read_msg(&mut streams[1]).await, update);
    // Never echoed back to the host.
    assert!(ws_try_read_msg(&mut streams[0], 100).await.is_none());
}

#[tokio::test]
async fn follower_paddle_move_reaches_host_with_side() {
    let server = TestServer::new().await;
    let (_, mut streams) = ws_room(&server, 2).await;
    ws_start(&mut streams, 2).await;
    ws_read_until(&mut streams[0], |m| matches!(m, WireMessage::PlayerList { .. })).await;

    ws_send(
        &mut streams[1],
        &WireMessage::PaddleMove {
            delta: -0.8,
            rotation: 0.0,
            side: None,
        },
    )
    .await;
    assert_eq!(
        ws_read_msg(&mut streams[0]).await,
        WireMessage::PaddleMove {
            delta: -0.8,
            rotation: 0.0,
            side: Some(Side::Right),
        }
    );
}

#[tokio::test]
async fn follower_cannot_impersonate_host() {
    let server = TestServer::new().await;
    let (_, mut streams) = ws_room(&server, 2).await;
    ws_start(&mut streams, 2).await;
    ws_read_until(&mut streams[0], |m| matches!(m, WireMessage::PlayerList { .. })).await;

    ws_send(
        &mut streams[1],
        &WireMessage::GameOver {
            winner: Side::Right,
            tournament_id: None,
        },
    )
    .await;
    assert!(ws_try_read_msg(&mut streams[0], 200).await.is_none());
}

#[tokio::test]
async fn unknown_and_malformed_frames_are_dropped() {
    let server = TestServer::new().await;
    let (_, mut streams) = ws_room(&server, 2).await;
    ws_start(&mut streams, 2).await;
    ws_read_until(&mut streams[0], |m| matches!(m, WireMessage::PlayerList { .. })).await;

    ws_send_raw(&mut streams[1], r#"{"type":"teleport_ball","x":1}"#).await;
    ws_send_raw(&mut streams[1], "not json").await;
    ws_send(
        &mut streams[1],
        &WireMessage::UpdateScore { side: Side::Right },
    )
    .await;

    // The connection survives and the valid frame still arrives.
    assert_eq!(
        ws_read_msg(&mut streams[0]).await,
        WireMessage::UpdateScore { side: Side::Right }
    );
}

#[tokio::test]
async fn seated_disconnect_closes_session() {
    let server = TestServer::new().await;
    let (_, mut streams) = ws_room(&server, 2).await;
    ws_start(&mut streams, 2).await;

    let follower = streams.pop().unwrap();
    drop(follower);

    let msg = ws_read_until(&mut streams[0], |m| {
        matches!(m, WireMessage::SessionClosed { .. })
    })
    .await;
    match msg {
        WireMessage::SessionClosed { reason } => assert!(reason.contains("Player2")),
        other => panic!("Expected session_closed, got: {other:?}"),
    }
}

#[tokio::test]
async fn late_joiner_watches_running_match() {
    let server = TestServer::new().await;
    let (room_code, mut streams) = ws_room(&server, 2).await;
    ws_start(&mut streams, 2).await;

    let mut late = ws_connect(&server.ws_url()).await;
    let resp = ws_join_room(&mut late, &room_code, "Late").await;
    assert!(matches!(resp, WireMessage::JoinRoomResponse { success: true, .. }));
    match ws_read_msg(&mut late).await {
        WireMessage::PlayerList { players, .. } => {
            let me = players.iter().find(|p| p.display_name == "Late").unwrap();
            assert!(me.is_spectator);
            assert!(me.side.is_none());
        },
        other => panic!("Expected player_list, got: {other:?}"),
    }

    // Spectators receive host broadcasts.
    ws_send(
        &mut streams[0],
        &WireMessage::SetBallVelocity { x: 0.5, y: -0.2 },
    )
    .await;
    assert_eq!(
        ws_read_msg(&mut late).await,
        WireMessage::SetBallVelocity { x: 0.5, y: -0.2 }
    );
}
