use serde::{Deserialize, Serialize};

/// 2D vector in play-area units. The play area is centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec2,
    pub max: Vec2,
}

/// Build a box of `size` centered on `position`. Sizes must be positive.
pub fn bounding_box(position: Vec2, size: Vec2) -> BoundingBox {
    debug_assert!(size.x > 0.0 && size.y > 0.0, "box sizes must be positive");
    let half = size.scale(0.5);
    BoundingBox {
        min: position - half,
        max: position + half,
    }
}

/// Strict overlap test. Boxes that only share an edge do not intersect.
pub fn intersects(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.min.x < b.max.x && a.max.x > b.min.x && a.min.y < b.max.y && a.max.y > b.min.y
}
