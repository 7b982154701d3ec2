use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::Side;
use crate::geometry::Vec2;
use crate::powerup::PowerUpKind;

/// Scene-space position. The play area lies on the ground plane: play `x` maps
/// to scene `x` and play `y` to scene `z`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn from_plane(v: Vec2) -> Self {
        Self::new(v.x, 0.0, v.y)
    }
}

/// Scene objects the simulation positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetId {
    Ball,
    Paddle(Side),
    PowerUp(PowerUpKind),
}

/// Contract between the simulation and whatever renders it.
///
/// The engine owns every position and pushes them here after each tick; the
/// renderer never writes back. Unknown ids are a warning, never an error.
pub trait Presentation {
    fn get_position(&self, id: AssetId) -> Option<Vec3>;
    fn move_position(&mut self, id: AssetId, position: Vec3);
    fn move_by(&mut self, id: AssetId, delta: Vec3);
    fn set_visible(&mut self, id: AssetId, visible: bool);
}

/// In-memory scene used by headless clients and tests. Nothing is drawn, so
/// visibility changes are only checked against the registry.
#[derive(Debug, Default)]
pub struct SceneRegistry {
    positions: HashMap<AssetId, Vec3>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: AssetId) {
        self.positions.entry(id).or_default();
    }

    /// Register the ball, one paddle per side and every power-up kind.
    pub fn with_standard_assets(sides: impl IntoIterator<Item = Side>) -> Self {
        let mut scene = Self::new();
        scene.register(AssetId::Ball);
        for side in sides {
            scene.register(AssetId::Paddle(side));
        }
        for kind in PowerUpKind::ALL {
            scene.register(AssetId::PowerUp(kind));
        }
        scene
    }
}

impl Presentation for SceneRegistry {
    fn get_position(&self, id: AssetId) -> Option<Vec3> {
        self.positions.get(&id).copied()
    }

    fn move_position(&mut self, id: AssetId, position: Vec3) {
        match self.positions.get_mut(&id) {
            Some(current) => *current = position,
            None => tracing::warn!(?id, "move_position on unregistered asset"),
        }
    }

    fn move_by(&mut self, id: AssetId, delta: Vec3) {
        match self.positions.get_mut(&id) {
            Some(current) => {
                current.x += delta.x;
                current.y += delta.y;
                current.z += delta.z;
            },
            None => tracing::warn!(?id, "move_by on unregistered asset"),
        }
    }

    fn set_visible(&mut self, id: AssetId, visible: bool) {
        if self.positions.contains_key(&id) {
            tracing::trace!(?id, visible, "Visibility changed");
        } else {
            tracing::warn!(?id, "set_visible on unregistered asset");
        }
    }
}
