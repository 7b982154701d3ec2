//! Pong simulation. Two strategies behind one trait, picked once per match:
//! [`AuthoritativeEngine`] runs physics (local play and the networked host),
//! [`FollowerEngine`] mirrors the host's snapshots and never simulates.

pub mod authoritative;
pub mod follower;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use authoritative::AuthoritativeEngine;
pub use follower::FollowerEngine;

use crate::config::{MatchConfig, Mode, PaddleSize, Side};
use crate::controls::PaddleIntent;
use crate::geometry::Vec2;
use crate::net::channel::SyncInbox;
use crate::powerup::PowerUpView;
use crate::presentation::{AssetId, Presentation, Vec3};
use crate::tuning::PongTuning;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: Vec2,
}

/// What happened during one tick. Recomputed every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    pub paddle_collided: bool,
    pub ball_out_of_bounds: bool,
    pub winning_side: Option<Side>,
    pub losing_side: Option<Side>,
}

impl RoundOutcome {
    /// Winner and loser if a point was scored this tick.
    pub fn point(&self) -> Option<(Side, Side)> {
        self.winning_side.zip(self.losing_side)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Running,
    RoundReset,
    Finished,
}

/// Caller bugs. Physics never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    NotInitialized,
    AlreadyInitialized,
    /// A local role with a networked config, or a networked role with a local one.
    ModeMismatch { mode: Mode, role: Role },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "engine ticked before initialize"),
            Self::AlreadyInitialized => write!(f, "engine already initialized"),
            Self::ModeMismatch { mode, role } => {
                write!(f, "{role:?} role cannot run a {mode:?} match")
            },
        }
    }
}

impl std::error::Error for EngineError {}

/// Who owns the simulation in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Same-screen play. Authoritative, no channel.
    Local,
    /// Networked host. Authoritative, broadcasts snapshots.
    Host,
    /// Networked non-host. Mirrors the host.
    Follower,
}

impl Role {
    pub fn is_authoritative(self) -> bool {
        matches!(self, Role::Local | Role::Host)
    }

    /// The match mode this role plays in.
    pub fn mode(self) -> Mode {
        match self {
            Role::Local => Mode::Local,
            Role::Host | Role::Follower => Mode::Networked,
        }
    }
}

pub trait PongEngine: Send {
    /// Bind the match configuration. `Uninitialized -> Ready`.
    fn initialize(&mut self, config: &MatchConfig) -> Result<(), EngineError>;

    /// Advance one frame and publish positions to `scene`.
    fn tick(
        &mut self,
        intent: &PaddleIntent,
        scene: &mut dyn Presentation,
    ) -> Result<RoundOutcome, EngineError>;

    fn state(&self) -> EngineState;

    /// `RoundReset -> Running`, once the caller has booked the point.
    fn begin_round(&mut self);

    /// Terminal. Later ticks do nothing.
    fn finish(&mut self);

    fn ball(&self) -> BallState;

    fn paddle_offset(&self, side: Side) -> Option<f32>;

    fn paddle_size(&self, side: Side) -> Option<PaddleSize>;

    /// Physics passes executed so far. Always zero for a follower.
    fn physics_steps(&self) -> u64;

    fn as_authoritative_mut(&mut self) -> Option<&mut AuthoritativeEngine> {
        None
    }

    fn as_follower(&self) -> Option<&FollowerEngine> {
        None
    }
}

/// Pick the engine strategy for a role. Followers read snapshots from `inbox`.
pub fn for_role(role: Role, tuning: &PongTuning, inbox: Arc<SyncInbox>) -> Box<dyn PongEngine> {
    if role.is_authoritative() {
        Box::new(AuthoritativeEngine::new(tuning.clone()))
    } else {
        Box::new(FollowerEngine::new(inbox))
    }
}

/// Push ball and paddle positions into the scene.
pub(crate) fn publish(
    scene: &mut dyn Presentation,
    config: &MatchConfig,
    ball: &BallState,
    paddles: impl Iterator<Item = (Side, f32)>,
) {
    scene.move_position(AssetId::Ball, Vec3::from_plane(ball.position));
    for (side, offset) in paddles {
        scene.move_position(
            AssetId::Paddle(side),
            Vec3::from_plane(config.paddle_center(side, offset)),
        );
    }
}

/// Push power-up positions and visibility into the scene.
pub fn publish_power_ups(scene: &mut dyn Presentation, views: &[PowerUpView]) {
    for view in views {
        let id = AssetId::PowerUp(view.kind);
        scene.move_position(id, Vec3::from_plane(view.position));
        scene.set_visible(id, view.active);
    }
}
