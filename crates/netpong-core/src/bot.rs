use std::collections::BTreeSet;

use crate::config::{Axis, Side};
use crate::controls::PaddleIntent;
use crate::engine::{BallState, PongEngine};
use crate::tuning::PongTuning;

fn along(axis: Axis, v: crate::geometry::Vec2) -> f32 {
    match axis {
        Axis::X => v.x,
        Axis::Y => v.y,
    }
}

/// Whether the ball is travelling toward `side`'s edge.
fn approaching(side: Side, ball: &BallState) -> bool {
    match side {
        Side::Left => ball.velocity.x < 0.0,
        Side::Right => ball.velocity.x > 0.0,
        Side::Bottom => ball.velocity.y < 0.0,
        Side::Top => ball.velocity.y > 0.0,
    }
}

/// Speed for one bot paddle: chase the ball while it approaches, otherwise
/// drift back to center. Holds still inside the dead zone.
pub fn track(side: Side, ball: &BallState, offset: f32, speed: f32, dead_zone: f32) -> f32 {
    let target = if approaching(side, ball) {
        along(side.axis(), ball.position)
    } else {
        0.0
    };
    let diff = target - offset;
    if diff.abs() <= dead_zone {
        0.0
    } else {
        diff.signum() * speed.min(diff.abs())
    }
}

/// Intent for every bot-driven side.
pub fn bot_intent(
    engine: &dyn PongEngine,
    bots: &BTreeSet<Side>,
    tuning: &PongTuning,
) -> PaddleIntent {
    let ball = engine.ball();
    let mut intent = PaddleIntent::new();
    for &side in bots {
        if let Some(offset) = engine.paddle_offset(side) {
            intent.set(
                side,
                track(side, &ball, offset, tuning.paddle_speed, tuning.bot_dead_zone),
            );
        }
    }
    intent
}
