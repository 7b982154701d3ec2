use serde::{Deserialize, Serialize};

use crate::geometry::Vec2;

/// Tuning file read when `NETPONG_TUNING_CONFIG` is unset or unusable.
pub const DEFAULT_TUNING_PATH: &str = "config/pong.toml";

/// Data-driven physics and pacing constants for a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PongTuning {
    /// Velocity the ball is served with at match start and after every point.
    pub initial_ball_velocity: Vec2,
    /// Ball width/height.
    pub ball_size: Vec2,
    /// Upper bound on |vy|, enforced after every tick.
    pub y_speed_cap: f32,
    /// Deflection factor applied to the parallel velocity component on a paddle hit.
    pub multi_side_push: f32,
    /// Paddle travel per tick while a key is held.
    pub paddle_speed: f32,
    /// Score that ends the match.
    pub win_score: u32,
    /// Power-up spawn timer range, in frames.
    pub powerup_spawn_min: u32,
    pub powerup_spawn_max: u32,
    /// Power-up travel per frame.
    pub powerup_speed: f32,
    /// Power-up width/height.
    pub powerup_size: f32,
    /// Distance from the origin where inactive power-ups are parked.
    pub offscreen_distance: f32,
    /// Bot reaction dead zone (units). Bots hold still when this close to the ball.
    pub bot_dead_zone: f32,
}

impl Default for PongTuning {
    fn default() -> Self {
        Self {
            initial_ball_velocity: Vec2::new(0.5, 0.0),
            ball_size: Vec2::new(1.0, 1.0),
            y_speed_cap: 0.75,
            multi_side_push: 0.15,
            paddle_speed: 0.8,
            win_score: 11,
            powerup_spawn_min: 50,
            powerup_spawn_max: 150,
            powerup_speed: 0.3,
            powerup_size: 2.0,
            offscreen_distance: 1000.0,
            bot_dead_zone: 1.0,
        }
    }
}

impl PongTuning {
    /// Load tuning from `NETPONG_TUNING_CONFIG`, then [`DEFAULT_TUNING_PATH`],
    /// falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("NETPONG_TUNING_CONFIG")
            && let Some(config) = Self::from_file(&path)
        {
            return config;
        }
        Self::from_file(DEFAULT_TUNING_PATH).unwrap_or_default()
    }

    /// Read and sanitize one tuning file. A missing file is `None`; a file that
    /// fails to parse is logged and also `None`.
    pub fn from_file(path: &str) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<Self>(&contents) {
            Ok(config) => Some(config.sanitized()),
            Err(e) => {
                tracing::warn!(path, error = %e, "Invalid tuning file, ignoring");
                None
            },
        }
    }

    /// Replace values that would break the simulation with their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.ball_size.x <= 0.0 || self.ball_size.y <= 0.0 {
            tracing::warn!("ball_size must be positive, using default");
            self.ball_size = defaults.ball_size;
        }
        if self.y_speed_cap <= 0.0 {
            tracing::warn!("y_speed_cap must be > 0, using default");
            self.y_speed_cap = defaults.y_speed_cap;
        }
        if self.win_score == 0 {
            tracing::warn!("win_score must be > 0, using default");
            self.win_score = defaults.win_score;
        }
        if self.powerup_spawn_min == 0 || self.powerup_spawn_min > self.powerup_spawn_max {
            tracing::warn!(
                min = self.powerup_spawn_min,
                max = self.powerup_spawn_max,
                "Invalid power-up spawn range, using default"
            );
            self.powerup_spawn_min = defaults.powerup_spawn_min;
            self.powerup_spawn_max = defaults.powerup_spawn_max;
        }
        if self.powerup_size <= 0.0 {
            self.powerup_size = defaults.powerup_size;
        }
        self
    }
}
