use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{MatchConfig, PaddleSize, Side};
use crate::controls::PaddleIntent;
use crate::geometry::Vec2;
use crate::net::channel::SyncInbox;
use crate::net::messages::SyncSnapshot;
use crate::powerup::PowerUpView;
use crate::presentation::Presentation;

use super::{
    BallState, EngineError, EngineState, PongEngine, RoundOutcome, publish, publish_power_ups,
};

/// Read-only mirror of the host's simulation. Every tick it takes the newest
/// cached snapshot, replaces its state wholesale and republishes. It never
/// moves the ball itself.
pub struct FollowerEngine {
    inbox: Arc<SyncInbox>,
    config: Option<MatchConfig>,
    state: EngineState,
    ball: BallState,
    paddles: BTreeMap<Side, f32>,
    paddle_sizes: BTreeMap<Side, PaddleSize>,
    scores: BTreeMap<Side, u32>,
    power_ups: Vec<PowerUpView>,
    applied_seq: Option<u64>,
}

impl FollowerEngine {
    pub fn new(inbox: Arc<SyncInbox>) -> Self {
        Self {
            inbox,
            config: None,
            state: EngineState::Uninitialized,
            ball: BallState {
                position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                size: Vec2::new(1.0, 1.0),
            },
            paddles: BTreeMap::new(),
            paddle_sizes: BTreeMap::new(),
            scores: BTreeMap::new(),
            power_ups: Vec::new(),
            applied_seq: None,
        }
    }

    /// Scores as of the last applied snapshot.
    pub fn mirrored_scores(&self) -> &BTreeMap<Side, u32> {
        &self.scores
    }

    pub fn power_ups(&self) -> &[PowerUpView] {
        &self.power_ups
    }

    /// Sequence number of the snapshot currently mirrored.
    pub fn applied_seq(&self) -> Option<u64> {
        self.applied_seq
    }

    fn apply(&mut self, snapshot: SyncSnapshot) {
        self.ball = snapshot.ball;
        self.paddles = snapshot.paddles;
        self.paddle_sizes = snapshot.paddle_sizes;
        self.scores = snapshot.scores;
        self.power_ups = snapshot.power_ups;
        self.applied_seq = Some(snapshot.seq);
    }
}

impl PongEngine for FollowerEngine {
    fn initialize(&mut self, config: &MatchConfig) -> Result<(), EngineError> {
        if self.state != EngineState::Uninitialized {
            return Err(EngineError::AlreadyInitialized);
        }
        self.paddles = config
            .active_sides()
            .iter()
            .map(|&s| (s, config.paddle_location(s)))
            .collect();
        self.paddle_sizes = config
            .active_sides()
            .iter()
            .map(|&s| (s, config.paddle_size(s)))
            .collect();
        self.scores = config.active_sides().iter().map(|&s| (s, 0)).collect();
        self.config = Some(config.clone());
        self.state = EngineState::Ready;
        tracing::debug!(players = config.player_count(), "Follower engine ready");
        Ok(())
    }

    fn tick(
        &mut self,
        _intent: &PaddleIntent,
        scene: &mut dyn Presentation,
    ) -> Result<RoundOutcome, EngineError> {
        match self.state {
            EngineState::Uninitialized => return Err(EngineError::NotInitialized),
            EngineState::Finished => return Ok(RoundOutcome::default()),
            EngineState::Ready | EngineState::RoundReset => self.state = EngineState::Running,
            EngineState::Running => {},
        }

        // No fresh snapshot means the last mirror is reused.
        if let Some(snapshot) = self.inbox.take_snapshot() {
            self.apply(snapshot);
        }
        if let Some(velocity) = self.inbox.take_velocity() {
            self.ball.velocity = velocity;
        }

        if let Some(config) = self.config.as_ref() {
            publish(
                scene,
                config,
                &self.ball,
                self.paddles.iter().map(|(&s, &o)| (s, o)),
            );
        }
        publish_power_ups(scene, &self.power_ups);
        Ok(RoundOutcome::default())
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn begin_round(&mut self) {
        if self.state == EngineState::RoundReset {
            self.state = EngineState::Running;
        }
    }

    fn finish(&mut self) {
        self.state = EngineState::Finished;
    }

    fn ball(&self) -> BallState {
        self.ball
    }

    fn paddle_offset(&self, side: Side) -> Option<f32> {
        self.paddles.get(&side).copied()
    }

    fn paddle_size(&self, side: Side) -> Option<PaddleSize> {
        self.paddle_sizes.get(&side).copied()
    }

    fn physics_steps(&self) -> u64 {
        0
    }

    fn as_follower(&self) -> Option<&FollowerEngine> {
        Some(self)
    }
}
