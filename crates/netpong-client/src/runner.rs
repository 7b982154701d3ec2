use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use netpong_core::bot::bot_intent;
use netpong_core::config::Side;
use netpong_core::controls::binding_for;
use netpong_core::engine::EngineError;
use netpong_core::net::protocol::DEFAULT_TICK_RATE_HZ;
use netpong_core::presentation::Presentation;
use netpong_core::score::ScoreBoard;
use netpong_core::session::{Match, MatchEvent};
use netpong_core::tuning::PongTuning;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Frames per second. Zero is treated as one.
    pub fps: u32,
    /// Let the bot policy press our keys.
    pub autopilot: bool,
    /// Stop after this many frames even if the match is still running.
    pub max_frames: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fps: DEFAULT_TICK_RATE_HZ,
            autopilot: false,
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub winner: Option<Side>,
    pub scores: BTreeMap<Side, u32>,
    pub frames: u64,
    pub connection_lost: bool,
}

/// Key state the autopilot wants for one paddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Steer {
    Positive,
    Negative,
    Hold,
}

fn steer_for(speed: f32) -> Steer {
    if speed > 0.0 {
        Steer::Positive
    } else if speed < 0.0 {
        Steer::Negative
    } else {
        Steer::Hold
    }
}

/// Drive our own paddle with the bot policy through the normal key path,
/// so followers send `paddle_move` exactly like a human would.
fn autopilot(m: &mut Match, tuning: &PongTuning) {
    let Some(side) = m.side() else {
        return;
    };
    let bots = BTreeSet::from([side]);
    let speed = bot_intent(m.engine(), &bots, tuning).get(side);
    let keys = binding_for(side);
    match steer_for(speed) {
        Steer::Positive => {
            m.key_up(keys.negative);
            m.key_down(keys.positive);
        },
        Steer::Negative => {
            m.key_up(keys.positive);
            m.key_down(keys.negative);
        },
        Steer::Hold => {
            m.key_up(keys.positive);
            m.key_up(keys.negative);
        },
    }
}

fn log_event(event: MatchEvent, scores: &ScoreBoard) {
    match event {
        MatchEvent::RoundScored { winner, loser } => {
            tracing::info!(
                %winner,
                %loser,
                leader = scores.leader().map(Side::as_str),
                scores = ?scores.as_map(),
                "Point"
            );
        },
        MatchEvent::PowerUpCollected { kind, side } => {
            tracing::debug!(?kind, %side, "Power-up collected");
        },
        MatchEvent::GameOver { winner } => {
            tracing::info!(%winner, scores = ?scores.as_map(), "Game over");
        },
        MatchEvent::ConnectionLost => tracing::warn!("Connection lost"),
    }
}

/// Run `m` at a fixed frame rate until it ends, `max_frames` pass, or
/// `shutdown` resolves. The match is destroyed before returning.
pub async fn run_match(
    m: &mut Match,
    scene: &mut dyn Presentation,
    tuning: &PongTuning,
    options: RunOptions,
    shutdown: impl Future<Output = ()>,
) -> Result<MatchSummary, EngineError> {
    let period = Duration::from_secs_f64(1.0 / f64::from(options.fps.max(1)));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut frames = 0u64;
    let mut connection_lost = false;
    loop {
        tokio::select! {
            _ = interval.tick() => {},
            () = &mut shutdown => {
                tracing::info!(frames, "Shutdown requested");
                break;
            },
        }

        if options.autopilot {
            autopilot(m, tuning);
        }
        let events = m.frame(scene)?;
        frames += 1;
        for event in events {
            connection_lost |= event == MatchEvent::ConnectionLost;
            log_event(event, m.scores());
        }

        if m.is_over() {
            break;
        }
        if options.max_frames.is_some_and(|max| frames >= max) {
            tracing::info!(frames, "Frame limit reached");
            break;
        }
    }

    let summary = MatchSummary {
        winner: m.winner(),
        scores: m.scores().as_map().clone(),
        frames,
        connection_lost,
    };
    m.destroy();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use netpong_core::config::{MapStyle, MatchConfig};
    use netpong_core::presentation::SceneRegistry;
    use netpong_core::test_helpers::loopback_pair;

    use super::*;

    #[test]
    fn steer_follows_sign() {
        assert_eq!(steer_for(0.8), Steer::Positive);
        assert_eq!(steer_for(-0.3), Steer::Negative);
        assert_eq!(steer_for(0.0), Steer::Hold);
    }

    #[tokio::test]
    async fn local_match_stops_at_frame_limit() {
        let config = MatchConfig::local(2, MapStyle::Classic);
        let tuning = PongTuning::default();
        let mut scene = SceneRegistry::with_standard_assets(config.active_sides().iter().copied());
        let mut m = Match::local(config, tuning.clone()).unwrap();

        let options = RunOptions {
            fps: 1000,
            autopilot: false,
            max_frames: Some(5),
        };
        let summary = run_match(&mut m, &mut scene, &tuning, options, std::future::pending())
            .await
            .unwrap();
        assert_eq!(summary.frames, 5);
        assert_eq!(summary.winner, None);
        assert!(!summary.connection_lost);
        assert!(m.is_over(), "run_match destroys the match");
    }

    #[tokio::test]
    async fn ready_shutdown_stops_the_loop() {
        let config = MatchConfig::local(2, MapStyle::Classic);
        let tuning = PongTuning::default();
        let mut scene = SceneRegistry::with_standard_assets(config.active_sides().iter().copied());
        let mut m = Match::local(config, tuning.clone()).unwrap();

        let summary = run_match(&mut m, &mut scene, &tuning, RunOptions::default(), async {})
            .await
            .unwrap();
        assert!(summary.frames <= 1);
    }

    #[tokio::test]
    async fn dropped_peer_reports_connection_lost() {
        let config = MatchConfig::networked(2, MapStyle::Classic);
        let tuning = PongTuning::default();
        let (mut host, mut follower) = loopback_pair(&config);
        follower.destroy();

        let mut scene = SceneRegistry::with_standard_assets(config.active_sides().iter().copied());
        let options = RunOptions {
            fps: 1000,
            autopilot: true,
            max_frames: Some(100),
        };
        let summary = run_match(&mut host, &mut scene, &tuning, options, std::future::pending())
            .await
            .unwrap();
        assert!(summary.connection_lost);
        assert_eq!(summary.winner, None);
        assert_eq!(summary.frames, 1);
    }
}
