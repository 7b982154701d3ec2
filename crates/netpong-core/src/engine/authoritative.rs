use std::collections::BTreeMap;

use crate::config::{MatchConfig, PaddleSize, PlayArea, Side};
use crate::controls::PaddleIntent;
use crate::geometry::{BoundingBox, Vec2, bounding_box, intersects};
use crate::net::messages::SyncSnapshot;
use crate::powerup::PowerUpView;
use crate::presentation::Presentation;
use crate::tuning::PongTuning;

use super::{BallState, EngineError, EngineState, PongEngine, RoundOutcome, publish};

/// Smallest paddle length a shrink can produce.
const MIN_PADDLE_LENGTH: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Paddle {
    offset: f32,
    size: PaddleSize,
}

/// Runs the physics. Used for local play and by the networked host.
pub struct AuthoritativeEngine {
    tuning: PongTuning,
    config: Option<MatchConfig>,
    state: EngineState,
    ball: BallState,
    paddles: BTreeMap<Side, Paddle>,
    last_contact: Option<Side>,
    /// Winner and loser of the last point, until a paddle touches the ball again.
    pending: Option<(Side, Side)>,
    physics_steps: u64,
}

impl AuthoritativeEngine {
    pub fn new(tuning: PongTuning) -> Self {
        let ball = BallState {
            position: Vec2::ZERO,
            velocity: tuning.initial_ball_velocity,
            size: tuning.ball_size,
        };
        Self {
            tuning,
            config: None,
            state: EngineState::Uninitialized,
            ball,
            paddles: BTreeMap::new(),
            last_contact: None,
            pending: None,
            physics_steps: 0,
        }
    }

    pub fn last_contact(&self) -> Option<Side> {
        self.last_contact
    }

    /// Winner and loser of the most recent point, cleared by the next paddle hit.
    pub fn pending_round(&self) -> Option<(Side, Side)> {
        self.pending
    }

    pub fn ball_box(&self) -> BoundingBox {
        bounding_box(self.ball.position, self.ball.size)
    }

    /// Bounding boxes of every active paddle.
    pub fn paddle_boxes(&self) -> Vec<(Side, BoundingBox)> {
        let Some(config) = self.config.as_ref() else {
            return Vec::new();
        };
        self.paddles
            .iter()
            .map(|(&side, p)| {
                (
                    side,
                    bounding_box(config.paddle_center(side, p.offset), p.size.as_vec()),
                )
            })
            .collect()
    }

    /// Place the ball directly. Used by tests and tooling.
    pub fn set_ball(&mut self, position: Vec2, velocity: Vec2) {
        self.ball.position = position;
        self.ball.velocity = velocity;
    }

    /// Move a paddle directly, ignoring bounds. Used by tests and tooling.
    pub fn set_paddle_offset(&mut self, side: Side, offset: f32) {
        if let Some(p) = self.paddles.get_mut(&side) {
            p.offset = offset;
        }
    }

    /// Apply one remote paddle move on its own, before the next tick. A move
    /// that would leave the play area is rejected; earlier moves stand.
    pub fn apply_paddle_move(&mut self, side: Side, delta: f32) -> bool {
        if self.state == EngineState::Finished {
            return false;
        }
        let Some(area) = self.config.as_ref().map(MatchConfig::play_area) else {
            return false;
        };
        step_paddle(&mut self.paddles, &area, side, delta)
    }

    pub fn set_last_contact(&mut self, side: Option<Side>) {
        self.last_contact = side;
    }

    /// Multiply the ball's velocity. The y cap still applies on the next tick.
    pub fn scale_ball_speed(&mut self, factor: f32) {
        self.ball.velocity = self.ball.velocity.scale(factor);
    }

    /// Scale a paddle along its axis of travel, then pull it back inside the play area.
    pub fn resize_paddle(&mut self, side: Side, factor: f32) {
        let Some(config) = self.config.as_ref() else {
            return;
        };
        let Some(paddle) = self.paddles.get_mut(&side) else {
            return;
        };
        let axis = side.axis();
        let half_extent = config.play_area().half_extent(axis);
        let length = (paddle.size.length_along(axis) * factor)
            .clamp(MIN_PADDLE_LENGTH, half_extent * 2.0);
        paddle.size = paddle.size.with_length(axis, length);
        let limit = half_extent - length / 2.0;
        paddle.offset = paddle.offset.clamp(-limit, limit);
    }

    /// Book a point without the ball leaving play, e.g. an instant-point pickup.
    /// Returns the winner and loser as if `winner`'s opponent had missed.
    pub fn award_round(&mut self, winner: Side) -> (Side, Side) {
        let loser = winner.opposite();
        self.end_rally(winner, loser);
        (winner, loser)
    }

    /// Host snapshot for followers.
    pub fn snapshot(
        &self,
        seq: u64,
        scores: &BTreeMap<Side, u32>,
        power_ups: Vec<PowerUpView>,
    ) -> SyncSnapshot {
        SyncSnapshot {
            seq,
            ball: self.ball,
            paddles: self.paddles.iter().map(|(&s, p)| (s, p.offset)).collect(),
            paddle_sizes: self.paddles.iter().map(|(&s, p)| (s, p.size)).collect(),
            scores: scores.clone(),
            last_winner: self.pending.map(|(w, _)| w),
            last_loser: self.pending.map(|(_, l)| l),
            power_ups,
        }
    }

    fn end_rally(&mut self, winner: Side, loser: Side) {
        self.pending = Some((winner, loser));
        self.last_contact = None;
        self.ball.position = Vec2::ZERO;
        self.ball.velocity = self.tuning.initial_ball_velocity;
        self.state = EngineState::RoundReset;
    }

    fn move_paddles(&mut self, config: &MatchConfig, intent: &PaddleIntent) {
        let area = config.play_area();
        for (side, speed) in intent.iter() {
            step_paddle(&mut self.paddles, &area, side, speed);
        }
    }

    /// First paddle the ball overlaps, with that paddle's center.
    fn colliding_paddle(&self, config: &MatchConfig) -> Option<(Side, Vec2)> {
        let ball_box = self.ball_box();
        self.paddles.iter().find_map(|(&side, p)| {
            let center = config.paddle_center(side, p.offset);
            intersects(&ball_box, &bounding_box(center, p.size.as_vec())).then_some((side, center))
        })
    }

    fn deflect(&mut self, side: Side, paddle_center: Vec2) {
        let push = self.tuning.multi_side_push;
        let v = &mut self.ball.velocity;
        let p = self.ball.position;
        match side {
            Side::Left => v.x = v.x.abs(),
            Side::Right => v.x = -v.x.abs(),
            Side::Bottom => v.y = v.y.abs(),
            Side::Top => v.y = -v.y.abs(),
        }
        match side {
            Side::Left | Side::Right => v.y += (p.y - paddle_center.y) * push,
            Side::Top | Side::Bottom => v.x += (p.x - paddle_center.x) * push,
        }
        self.last_contact = Some(side);
        self.pending = None;
    }

    /// Edge the ball center crossed, if any. X edges take precedence.
    fn crossed_edge(&self, config: &MatchConfig) -> Option<Side> {
        let area = config.play_area();
        let p = self.ball.position;
        if p.x < -area.half_width() {
            Some(Side::Left)
        } else if p.x > area.half_width() {
            Some(Side::Right)
        } else if p.y > area.half_depth() {
            Some(Side::Top)
        } else if p.y < -area.half_depth() {
            Some(Side::Bottom)
        } else {
            None
        }
    }

    /// Two-player maps have walls on top and bottom.
    fn bounce_off_walls(&mut self, config: &MatchConfig) {
        let half_depth = config.play_area().half_depth();
        let half_ball = self.ball.size.y / 2.0;
        if self.ball.position.y + half_ball > half_depth {
            self.ball.velocity.y = -self.ball.velocity.y.abs();
        } else if self.ball.position.y - half_ball < -half_depth {
            self.ball.velocity.y = self.ball.velocity.y.abs();
        }
    }

    /// Decide the point for a ball that left play, if it did.
    fn score_exit(&mut self, config: &MatchConfig) -> Option<(Side, Side)> {
        if config.player_count() == 2 {
            match self.crossed_edge(config) {
                Some(edge @ (Side::Left | Side::Right)) => Some((edge.opposite(), edge)),
                _ => {
                    self.bounce_off_walls(config);
                    None
                },
            }
        } else {
            let loser = self.crossed_edge(config)?;
            let winner = self
                .last_contact
                .filter(|&s| s != loser)
                .unwrap_or_else(|| loser.opposite());
            Some((winner, loser))
        }
    }
}

/// Move one paddle unless that would push it past the play-area boundary.
fn step_paddle(
    paddles: &mut BTreeMap<Side, Paddle>,
    area: &PlayArea,
    side: Side,
    delta: f32,
) -> bool {
    let Some(paddle) = paddles.get_mut(&side) else {
        return false;
    };
    let axis = side.axis();
    let candidate = paddle.offset + delta;
    let half_length = paddle.size.length_along(axis) / 2.0;
    if candidate.abs() + half_length > area.half_extent(axis) {
        return false;
    }
    paddle.offset = candidate;
    true
}

impl PongEngine for AuthoritativeEngine {
    fn initialize(&mut self, config: &MatchConfig) -> Result<(), EngineError> {
        if self.state != EngineState::Uninitialized {
            return Err(EngineError::AlreadyInitialized);
        }
        self.paddles = config
            .active_sides()
            .iter()
            .map(|&side| {
                (
                    side,
                    Paddle {
                        offset: config.paddle_location(side),
                        size: config.paddle_size(side),
                    },
                )
            })
            .collect();
        self.ball = BallState {
            position: Vec2::ZERO,
            velocity: self.tuning.initial_ball_velocity,
            size: self.tuning.ball_size,
        };
        self.config = Some(config.clone());
        self.state = EngineState::Ready;
        tracing::debug!(
            players = config.player_count(),
            map = config.map_style().as_str(),
            "Authoritative engine ready"
        );
        Ok(())
    }

    fn tick(
        &mut self,
        intent: &PaddleIntent,
        scene: &mut dyn Presentation,
    ) -> Result<RoundOutcome, EngineError> {
        let config = match self.state {
            EngineState::Uninitialized => return Err(EngineError::NotInitialized),
            EngineState::Finished => return Ok(RoundOutcome::default()),
            _ => self.config.take().ok_or(EngineError::NotInitialized)?,
        };
        if self.state != EngineState::Running {
            self.state = EngineState::Running;
        }
        self.physics_steps += 1;

        self.move_paddles(&config, intent);

        self.ball.position = self.ball.position + self.ball.velocity;

        let mut outcome = RoundOutcome::default();
        if let Some((side, center)) = self.colliding_paddle(&config) {
            self.deflect(side, center);
            outcome.paddle_collided = true;
        } else if let Some((winner, loser)) = self.score_exit(&config) {
            tracing::debug!(%winner, %loser, "Point scored");
            outcome.ball_out_of_bounds = true;
            outcome.winning_side = Some(winner);
            outcome.losing_side = Some(loser);
            self.end_rally(winner, loser);
        }

        let cap = self.tuning.y_speed_cap;
        self.ball.velocity.y = self.ball.velocity.y.clamp(-cap, cap);

        publish(
            scene,
            &config,
            &self.ball,
            self.paddles.iter().map(|(&s, p)| (s, p.offset)),
        );
        self.config = Some(config);
        Ok(outcome)
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
        self.paddles.get(&side).map(|p| p.offset)
    }

    fn paddle_size(&self, side: Side) -> Option<PaddleSize> {
        self.paddles.get(&side).map(|p| p.size)
    }

    fn physics_steps(&self) -> u64 {
        self.physics_steps
    }

    fn as_authoritative_mut(&mut self) -> Option<&mut AuthoritativeEngine> {
        Some(self)
    }
}
