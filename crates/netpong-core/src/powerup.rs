use std::f32::consts::{FRAC_PI_2, TAU};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, PlayArea, Side};
use crate::geometry::{BoundingBox, Vec2, bounding_box, intersects};
use crate::tuning::PongTuning;

/// Ball speed multiplier for [`PowerUpKind::SpeedUp`].
pub const SPEED_UP_FACTOR: f32 = 1.5;
/// Ball speed multiplier for [`PowerUpKind::SlowDown`].
pub const SLOW_DOWN_FACTOR: f32 = 0.6;
/// Paddle length multiplier for [`PowerUpKind::GrowPaddle`].
pub const GROW_FACTOR: f32 = 1.5;
/// Paddle length multiplier applied to every opponent for [`PowerUpKind::ShrinkPaddle`].
pub const SHRINK_FACTOR: f32 = 0.7;

/// Pong power-up types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    SpeedUp,
    SlowDown,
    GrowPaddle,
    ShrinkPaddle,
    InstantPoint,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 5] = [
        PowerUpKind::SpeedUp,
        PowerUpKind::SlowDown,
        PowerUpKind::GrowPaddle,
        PowerUpKind::ShrinkPaddle,
        PowerUpKind::InstantPoint,
    ];

    pub fn pattern(self) -> MovementPattern {
        match self {
            PowerUpKind::SpeedUp => MovementPattern::BouncingSlide,
            PowerUpKind::SlowDown => MovementPattern::Orbit,
            PowerUpKind::GrowPaddle => MovementPattern::Star,
            PowerUpKind::ShrinkPaddle => MovementPattern::Jitter,
            PowerUpKind::InstantPoint => MovementPattern::Orbit,
        }
    }

    pub fn effect(self) -> PowerUpEffect {
        match self {
            PowerUpKind::SpeedUp => PowerUpEffect::ScaleBallSpeed(SPEED_UP_FACTOR),
            PowerUpKind::SlowDown => PowerUpEffect::ScaleBallSpeed(SLOW_DOWN_FACTOR),
            PowerUpKind::GrowPaddle => PowerUpEffect::ScaleOwnPaddle(GROW_FACTOR),
            PowerUpKind::ShrinkPaddle => PowerUpEffect::ScaleOpponentPaddles(SHRINK_FACTOR),
            PowerUpKind::InstantPoint => PowerUpEffect::InstantPoint,
        }
    }
}

impl std::str::FromStr for PowerUpKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "speed_up" | "speedup" => Ok(PowerUpKind::SpeedUp),
            "slow_down" | "slowdown" => Ok(PowerUpKind::SlowDown),
            "grow_paddle" | "grow" => Ok(PowerUpKind::GrowPaddle),
            "shrink_paddle" | "shrink" => Ok(PowerUpKind::ShrinkPaddle),
            "instant_point" | "point" => Ok(PowerUpKind::InstantPoint),
            _ => Err(ConfigError::InvalidPowerUp(s.to_string())),
        }
    }
}

/// What collecting a power-up does to the match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerUpEffect {
    ScaleBallSpeed(f32),
    ScaleOwnPaddle(f32),
    ScaleOpponentPaddles(f32),
    /// Scores as a round win for the collector.
    InstantPoint,
}

/// How an active power-up travels across the play area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPattern {
    /// Straight line, reflecting off the play-area walls.
    BouncingSlide,
    /// Circle around the origin.
    Orbit,
    /// Traces a five-pointed star around the origin.
    Star,
    /// Bouncing slide with a sideways wobble.
    Jitter,
}

/// Kinematic state advanced by a [`MovementPattern`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub position: Vec2,
    pub velocity: Vec2,
    pub phase: f32,
}

fn orbit_radius(area: &PlayArea) -> f32 {
    area.half_width().min(area.half_depth()) * 0.5
}

fn star_vertex(area: &PlayArea, index: usize) -> Vec2 {
    let r = area.half_width().min(area.half_depth()) * 0.6;
    // Skip two vertices each step to draw a pentagram.
    let angle = FRAC_PI_2 + (index % 5) as f32 * 2.0 * TAU / 5.0;
    Vec2::new(r * angle.cos(), r * angle.sin())
}

fn bounce_inside(mut m: Motion, area: &PlayArea) -> Motion {
    let hw = area.half_width();
    let hd = area.half_depth();
    if m.position.x > hw || m.position.x < -hw {
        m.velocity.x = -m.velocity.x;
        m.position.x = m.position.x.clamp(-hw, hw);
    }
    if m.position.y > hd || m.position.y < -hd {
        m.velocity.y = -m.velocity.y;
        m.position.y = m.position.y.clamp(-hd, hd);
    }
    m
}

impl MovementPattern {
    /// Advance one frame. Pure in its inputs.
    pub fn advance(self, m: Motion, area: &PlayArea, speed: f32) -> Motion {
        match self {
            MovementPattern::BouncingSlide => bounce_inside(
                Motion {
                    position: m.position + m.velocity,
                    ..m
                },
                area,
            ),
            MovementPattern::Orbit => {
                let r = orbit_radius(area);
                let phase = (m.phase + speed / r) % TAU;
                let position = Vec2::new(r * phase.cos(), r * phase.sin());
                Motion {
                    position,
                    velocity: position - m.position,
                    phase,
                }
            },
            MovementPattern::Star => {
                let seg = m.phase.floor() as usize;
                let from = star_vertex(area, seg);
                let to = star_vertex(area, seg + 1);
                let len = (to - from).length().max(f32::EPSILON);
                let phase = (m.phase + speed / len) % 5.0;
                let seg = phase.floor() as usize;
                let t = phase.fract();
                let a = star_vertex(area, seg);
                let b = star_vertex(area, seg + 1);
                let position = a + (b - a).scale(t);
                Motion {
                    position,
                    velocity: position - m.position,
                    phase,
                }
            },
            MovementPattern::Jitter => {
                let phase = m.phase + 0.35;
                let wobble = Vec2::new(-m.velocity.y, m.velocity.x).scale(phase.sin());
                bounce_inside(
                    Motion {
                        position: m.position + m.velocity + wobble,
                        velocity: m.velocity,
                        phase,
                    },
                    area,
                )
            },
        }
    }
}

/// One collectible on the field.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerUp {
    pub kind: PowerUpKind,
    pub pattern: MovementPattern,
    pub motion: Motion,
    pub active: bool,
}

/// Render view of a power-up, carried in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerUpView {
    pub kind: PowerUpKind,
    pub position: Vec2,
    pub active: bool,
}

/// A power-up picked up this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collection {
    pub kind: PowerUpKind,
    pub side: Side,
}

/// Spawns, moves and collects power-ups for one match.
pub struct PowerUpField {
    power_ups: Vec<PowerUp>,
    timer: u32,
    spawn_min: u32,
    spawn_max: u32,
    speed: f32,
    size: f32,
    offscreen: Vec2,
    rng: StdRng,
}

impl PowerUpField {
    pub fn new(kinds: impl IntoIterator<Item = PowerUpKind>, tuning: &PongTuning) -> Self {
        Self::with_rng(kinds, tuning, StdRng::from_os_rng())
    }

    /// Deterministic field for replays and tests.
    pub fn with_seed(
        kinds: impl IntoIterator<Item = PowerUpKind>,
        tuning: &PongTuning,
        seed: u64,
    ) -> Self {
        Self::with_rng(kinds, tuning, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        kinds: impl IntoIterator<Item = PowerUpKind>,
        tuning: &PongTuning,
        rng: StdRng,
    ) -> Self {
        let offscreen = Vec2::new(tuning.offscreen_distance, tuning.offscreen_distance);
        let power_ups = kinds
            .into_iter()
            .map(|kind| PowerUp {
                kind,
                pattern: kind.pattern(),
                motion: Motion {
                    position: offscreen,
                    velocity: Vec2::ZERO,
                    phase: 0.0,
                },
                active: false,
            })
            .collect();
        let mut field = Self {
            power_ups,
            timer: 0,
            spawn_min: tuning.powerup_spawn_min,
            spawn_max: tuning.powerup_spawn_max.max(tuning.powerup_spawn_min),
            speed: tuning.powerup_speed,
            size: tuning.powerup_size,
            offscreen,
            rng,
        };
        field.rearm();
        field
    }

    fn rearm(&mut self) {
        self.timer = self.rng.random_range(self.spawn_min..=self.spawn_max);
    }

    /// Frames until the next spawn attempt.
    pub fn timer(&self) -> u32 {
        self.timer
    }

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.power_ups
    }

    pub fn views(&self) -> Vec<PowerUpView> {
        self.power_ups
            .iter()
            .map(|p| PowerUpView {
                kind: p.kind,
                position: p.motion.position,
                active: p.active,
            })
            .collect()
    }

    fn spawn(&mut self, area: &PlayArea) {
        let inactive: Vec<usize> = self
            .power_ups
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.active)
            .map(|(i, _)| i)
            .collect();
        if inactive.is_empty() {
            return;
        }
        let idx = inactive[self.rng.random_range(0..inactive.len())];
        let x = self
            .rng
            .random_range(-area.half_width() * 0.5..=area.half_width() * 0.5);
        let y = self
            .rng
            .random_range(-area.half_depth() * 0.5..=area.half_depth() * 0.5);
        let angle = self.rng.random_range(0.0..TAU);
        let phase = match self.power_ups[idx].pattern {
            MovementPattern::Orbit => angle,
            MovementPattern::Star => self.rng.random_range(0.0..5.0),
            _ => 0.0,
        };
        let speed = self.speed;
        let p = &mut self.power_ups[idx];
        p.motion = Motion {
            position: Vec2::new(x, y),
            velocity: Vec2::new(angle.cos() * speed, angle.sin() * speed),
            phase,
        };
        p.active = true;
        tracing::debug!(kind = ?p.kind, x, y, "Power-up spawned");
    }

    fn deactivate(&mut self, idx: usize) {
        let p = &mut self.power_ups[idx];
        p.active = false;
        p.motion = Motion {
            position: self.offscreen,
            velocity: Vec2::ZERO,
            phase: 0.0,
        };
    }

    /// Advance one frame: count down, spawn, move, then test the ball before any paddle.
    /// A ball pickup is credited to `last_contact` and skipped when nobody has touched the ball.
    pub fn step(
        &mut self,
        area: &PlayArea,
        ball: &BoundingBox,
        last_contact: Option<Side>,
        paddles: &[(Side, BoundingBox)],
    ) -> Vec<Collection> {
        self.timer = self.timer.saturating_sub(1);
        if self.timer == 0 {
            self.spawn(area);
            self.rearm();
        }

        let size = Vec2::new(self.size, self.size);
        let mut collected = Vec::new();
        for idx in 0..self.power_ups.len() {
            if !self.power_ups[idx].active {
                continue;
            }
            let p = &mut self.power_ups[idx];
            p.motion = p.pattern.advance(p.motion, area, self.speed);
            let bbox = bounding_box(p.motion.position, size);

            let collector = if intersects(&bbox, ball) {
                last_contact
            } else {
                paddles
                    .iter()
                    .find(|(_, pb)| intersects(&bbox, pb))
                    .map(|(side, _)| *side)
            };

            if let Some(side) = collector {
                let kind = self.power_ups[idx].kind;
                self.deactivate(idx);
                collected.push(Collection { kind, side });
            }
        }
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> PlayArea {
        PlayArea::new(100.0, 60.0)
    }

    fn far_box() -> BoundingBox {
        bounding_box(Vec2::new(500.0, 500.0), Vec2::new(1.0, 1.0))
    }

    fn field(kinds: &[PowerUpKind]) -> PowerUpField {
        PowerUpField::with_seed(kinds.iter().copied(), &PongTuning::default(), 7)
    }

    /// Step until something spawns, keeping the ball and paddles out of the way.
    fn spawn_one(f: &mut PowerUpField) -> usize {
        for _ in 0..200 {
            f.step(&area(), &far_box(), None, &[]);
            if let Some(i) = f.power_ups().iter().position(|p| p.active) {
                return i;
            }
        }
        panic!("nothing spawned within 200 frames");
    }

    #[test]
    fn timer_is_armed_within_range() {
        for seed in 0..50 {
            let f = PowerUpField::with_seed(PowerUpKind::ALL, &PongTuning::default(), seed);
            assert!((50..=150).contains(&f.timer()), "timer {}", f.timer());
        }
    }

    #[test]
    fn inactive_power_ups_are_offscreen() {
        let f = field(&PowerUpKind::ALL);
        for p in f.power_ups() {
            assert!(!p.active);
            assert_eq!(p.motion.position, Vec2::new(1000.0, 1000.0));
        }
    }

    #[test]
    fn spawns_after_countdown() {
        let mut f = field(&[PowerUpKind::SpeedUp]);
        let frames = f.timer();
        for _ in 0..frames - 1 {
            f.step(&area(), &far_box(), None, &[]);
            assert!(!f.power_ups()[0].active);
        }
        f.step(&area(), &far_box(), None, &[]);
        assert!(f.power_ups()[0].active);
        assert!((50..=150).contains(&f.timer()));
    }

    #[test]
    fn ball_pickup_credits_last_contact() {
        let mut f = field(&[PowerUpKind::SpeedUp]);
        let i = spawn_one(&mut f);
        let pos = f.power_ups()[i].motion.position;
        // Ball large enough to cover the next position.
        let ball = bounding_box(pos, Vec2::new(20.0, 20.0));
        let got = f.step(&area(), &ball, Some(Side::Right), &[]);
        assert_eq!(
            got,
            vec![Collection {
                kind: PowerUpKind::SpeedUp,
                side: Side::Right
            }]
        );
        assert!(!f.power_ups()[i].active);
        assert_eq!(f.power_ups()[i].motion.position, Vec2::new(1000.0, 1000.0));
    }

    #[test]
    fn ball_pickup_without_contact_is_skipped() {
        let mut f = field(&[PowerUpKind::SlowDown]);
        let i = spawn_one(&mut f);
        let pos = f.power_ups()[i].motion.position;
        let ball = bounding_box(pos, Vec2::new(40.0, 40.0));
        let got = f.step(&area(), &ball, None, &[]);
        assert!(got.is_empty());
        assert!(f.power_ups()[i].active);
    }

    #[test]
    fn ball_is_checked_before_paddles() {
        let mut f = field(&[PowerUpKind::GrowPaddle]);
        let i = spawn_one(&mut f);
        let pos = f.power_ups()[i].motion.position;
        let big = bounding_box(pos, Vec2::new(40.0, 40.0));
        let paddles = [(Side::Left, big)];
        let got = f.step(&area(), &big, Some(Side::Right), &paddles);
        assert_eq!(got[0].side, Side::Right);
    }

    #[test]
    fn paddle_pickup_credits_paddle_side() {
        let mut f = field(&[PowerUpKind::ShrinkPaddle]);
        let i = spawn_one(&mut f);
        let pos = f.power_ups()[i].motion.position;
        let paddles = [
            (Side::Top, far_box()),
            (Side::Bottom, bounding_box(pos, Vec2::new(40.0, 40.0))),
        ];
        let got = f.step(&area(), &far_box(), Some(Side::Left), &paddles);
        assert_eq!(got[0].side, Side::Bottom);
    }

    #[test]
    fn bouncing_slide_stays_inside() {
        let a = area();
        let mut m = Motion {
            position: Vec2::new(49.0, 29.0),
            velocity: Vec2::new(2.0, 2.0),
            phase: 0.0,
        };
        for _ in 0..500 {
            m = MovementPattern::BouncingSlide.advance(m, &a, 0.3);
            assert!(m.position.x.abs() <= 50.0 && m.position.y.abs() <= 30.0);
        }
    }

    #[test]
    fn orbit_keeps_constant_radius() {
        let a = area();
        let mut m = Motion {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            phase: 1.0,
        };
        for _ in 0..100 {
            m = MovementPattern::Orbit.advance(m, &a, 0.3);
            assert!((m.position.length() - 15.0).abs() < 1e-3);
        }
    }

    #[test]
    fn star_visits_every_vertex_region() {
        let a = area();
        let mut m = Motion {
            position: star_vertex(&a, 0),
            velocity: Vec2::ZERO,
            phase: 0.0,
        };
        for _ in 0..2000 {
            m = MovementPattern::Star.advance(m, &a, 0.3);
            assert!(m.position.length() <= 18.0 + 1e-3);
            assert!((0.0..5.0).contains(&m.phase));
        }
    }

    #[test]
    fn kinds_parse_from_names() {
        assert_eq!("speed_up".parse::<PowerUpKind>().unwrap(), PowerUpKind::SpeedUp);
        assert_eq!("Shrink-Paddle".parse::<PowerUpKind>().unwrap(), PowerUpKind::ShrinkPaddle);
        assert!("laser".parse::<PowerUpKind>().is_err());
    }

    #[test]
    fn effects_match_kinds() {
        assert_eq!(PowerUpKind::SpeedUp.effect(), PowerUpEffect::ScaleBallSpeed(1.5));
        assert_eq!(PowerUpKind::SlowDown.effect(), PowerUpEffect::ScaleBallSpeed(0.6));
        assert_eq!(PowerUpKind::GrowPaddle.effect(), PowerUpEffect::ScaleOwnPaddle(1.5));
        assert_eq!(
            PowerUpKind::ShrinkPaddle.effect(),
            PowerUpEffect::ScaleOpponentPaddles(0.7)
        );
    }
}
