use std::net::SocketAddr;
use std::time::Duration;

use netpong_client::{
    Joined, LobbyError, LobbyOptions, RunOptions, Seat, WsChannel, lobby, run_match,
};
use netpong_core::config::Side;
use netpong_core::engine::Role;
use netpong_core::presentation::SceneRegistry;
use netpong_core::session::Match;
use netpong_core::tuning::PongTuning;
use netpong_server::build_app;
use netpong_server::config::ServerConfig;

async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Frames run far above the normal tick rate here.
    let mut config = ServerConfig::default();
    config.limits.ws_rate_limit_per_sec = 100_000.0;
    let (app, _state) = build_app(config);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    format!("ws://{addr}/ws")
}

fn options(room: Option<&str>, name: &str) -> LobbyOptions {
    LobbyOptions {
        room: room.map(str::to_string),
        name: name.to_string(),
        ..LobbyOptions::default()
    }
}

struct Seated {
    channel: WsChannel,
    seat: Seat,
}

/// Leader and one joiner, both through the lobby to `game_started`.
async fn seat_two(url: &str) -> (Seated, Seated) {
    let host_opts = options(None, "Alice");
    let mut host_ch = WsChannel::connect(url).await.unwrap();
    let host_joined = lobby::join(&mut host_ch, &host_opts).await.unwrap();

    let follower_opts = options(Some(&host_joined.room_code), "Bob");
    let mut follower_ch = WsChannel::connect(url).await.unwrap();
    let follower_joined: Joined = lobby::join(&mut follower_ch, &follower_opts).await.unwrap();
    assert_eq!(follower_joined.room_code, host_joined.room_code);

    let (host_seat, follower_seat) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(
            lobby::wait_for_start(&mut host_ch, &host_opts, &host_joined),
            lobby::wait_for_start(&mut follower_ch, &follower_opts, &follower_joined),
        )
    })
    .await
    .expect("lobby timed out");

    (
        Seated {
            channel: host_ch,
            seat: host_seat.unwrap(),
        },
        Seated {
            channel: follower_ch,
            seat: follower_seat.unwrap(),
        },
    )
}

fn build(seated: Seated, tuning: &PongTuning) -> (Match, SceneRegistry) {
    let config = seated.seat.match_config();
    let scene = SceneRegistry::with_standard_assets(config.active_sides().iter().copied());
    let m = Match::networked(
        config,
        seated.seat.role(),
        seated.seat.side,
        tuning.clone(),
        Box::new(seated.channel),
    )
    .unwrap();
    (m, scene)
}

/// A short race so a match finishes quickly.
fn fast_tuning() -> PongTuning {
    PongTuning {
        win_score: 3,
        ..PongTuning::default()
    }
}

#[tokio::test]
async fn lobby_seats_leader_as_host() {
    let url = start_server().await;
    let (host, follower) = seat_two(&url).await;

    assert_eq!(host.seat.side, Side::Left);
    assert_eq!(host.seat.role(), Role::Host);
    assert_eq!(follower.seat.side, Side::Right);
    assert_eq!(follower.seat.role(), Role::Follower);
    assert_eq!(host.seat.room_code, follower.seat.room_code);
    assert_eq!(host.seat.player_count, 2);
}

#[tokio::test]
async fn join_unknown_room_is_rejected() {
    let url = start_server().await;
    let mut channel = WsChannel::connect(&url).await.unwrap();
    match lobby::join(&mut channel, &options(Some("ZZZZ-9999"), "Bob")).await {
        Err(LobbyError::Rejected(reason)) => assert_eq!(reason, "room not found"),
        other => panic!("Expected rejection, got: {other:?}"),
    }
}

#[tokio::test]
async fn follower_mirrors_host_to_game_over() {
    let url = start_server().await;
    let (host, follower) = seat_two(&url).await;
    let tuning = fast_tuning();
    let (mut host_match, mut host_scene) = build(host, &tuning);
    let (mut follower_match, mut follower_scene) = build(follower, &tuning);

    // Park the follower's paddle at the top so every serve gets past it.
    follower_match.key_down("i");

    let host_opts = RunOptions {
        fps: 1000,
        autopilot: false,
        max_frames: Some(20_000),
    };
    let follower_opts = RunOptions {
        max_frames: Some(40_000),
        ..host_opts
    };
    let (host_summary, follower_summary) = tokio::join!(
        run_match(
            &mut host_match,
            &mut host_scene,
            &tuning,
            host_opts,
            std::future::pending(),
        ),
        run_match(
            &mut follower_match,
            &mut follower_scene,
            &tuning,
            follower_opts,
            std::future::pending(),
        ),
    );
    let host_summary = host_summary.unwrap();
    let follower_summary = follower_summary.unwrap();

    assert_eq!(host_summary.winner, Some(Side::Left));
    assert_eq!(host_summary.scores.get(&Side::Left), Some(&3));
    assert!(!host_summary.connection_lost);

    assert_eq!(follower_summary.winner, host_summary.winner);
    assert_eq!(follower_summary.scores, host_summary.scores);
    assert!(!follower_summary.connection_lost);
}

#[tokio::test]
async fn host_leaving_ends_follower_match() {
    let url = start_server().await;
    let (host, follower) = seat_two(&url).await;
    let tuning = PongTuning::default();
    drop(host);

    let (mut follower_match, mut scene) = build(follower, &tuning);
    let opts = RunOptions {
        fps: 1000,
        autopilot: true,
        max_frames: Some(5_000),
    };
    let summary = run_match(
        &mut follower_match,
        &mut scene,
        &tuning,
        opts,
        std::future::pending(),
    )
    .await
    .unwrap();
    assert!(summary.connection_lost);
    assert_eq!(summary.winner, None);
}
