pub mod bot;
pub mod config;
pub mod controls;
pub mod engine;
pub mod geometry;
pub mod net;
pub mod player;
pub mod powerup;
pub mod presentation;
pub mod room;
pub mod score;
pub mod session;
pub mod tuning;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::config::{MapStyle, MatchConfig, Side};
    use crate::engine::{AuthoritativeEngine, PongEngine, Role};
    use crate::net::channel::LoopbackChannel;
    use crate::net::messages::WireMessage;
    use crate::player::{Player, PlayerId};
    use crate::presentation::SceneRegistry;
    use crate::session::Match;
    use crate::tuning::PongTuning;

    /// Create `n` test players with sequential IDs starting at 1. The first one leads.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player {
                id: i as PlayerId + 1,
                display_name: format!("Player{}", i + 1),
                is_leader: i == 0,
                is_spectator: false,
                side: None,
            })
            .collect()
    }

    /// Initialized authoritative engine plus a scene with every asset registered.
    pub fn ready_engine(player_count: u8) -> (AuthoritativeEngine, SceneRegistry) {
        let config = MatchConfig::local(player_count, MapStyle::Classic);
        let mut engine = AuthoritativeEngine::new(PongTuning::default());
        engine
            .initialize(&config)
            .expect("fresh engine must initialize");
        let scene = SceneRegistry::with_standard_assets(config.active_sides().iter().copied());
        (engine, scene)
    }

    /// Host on LEFT and follower on RIGHT, joined by an in-process channel.
    pub fn loopback_pair(config: &MatchConfig) -> (Match, Match) {
        let (a, b) = LoopbackChannel::pair();
        let host = Match::networked(
            config.clone(),
            Role::Host,
            Side::Left,
            PongTuning::default(),
            Box::new(a),
        )
        .expect("host match must build");
        let follower = Match::networked(
            config.clone(),
            Role::Follower,
            Side::Right,
            PongTuning::default(),
            Box::new(b),
        )
        .expect("follower match must build");
        (host, follower)
    }

    /// Decode a JSON frame, panicking with the frame text on failure.
    pub fn decode(text: &str) -> WireMessage {
        crate::net::protocol::decode_message(text)
            .unwrap_or_else(|e| panic!("bad frame {text}: {e}"))
    }
}
