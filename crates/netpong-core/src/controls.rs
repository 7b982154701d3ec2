use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::Side;

/// Per-side paddle speed requested for one tick. Missing sides are zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaddleIntent {
    speeds: BTreeMap<Side, f32>,
}

impl PaddleIntent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, side: Side, speed: f32) {
        if speed == 0.0 {
            self.speeds.remove(&side);
        } else {
            self.speeds.insert(side, speed);
        }
    }

    pub fn get(&self, side: Side) -> f32 {
        self.speeds.get(&side).copied().unwrap_or(0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.speeds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Side, f32)> + '_ {
        self.speeds.iter().map(|(&s, &v)| (s, v))
    }

    /// Combine two intents, letting `other` override sides it sets.
    pub fn merged(mut self, other: &PaddleIntent) -> Self {
        for (side, speed) in other.iter() {
            self.set(side, speed);
        }
        self
    }
}

/// Key pair driving one paddle. `positive` moves toward +x / +y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub positive: &'static str,
    pub negative: &'static str,
}

/// The one canonical binding table.
pub fn binding_for(side: Side) -> KeyBinding {
    match side {
        Side::Left => KeyBinding {
            positive: "w",
            negative: "s",
        },
        Side::Right => KeyBinding {
            positive: "i",
            negative: "k",
        },
        Side::Top => KeyBinding {
            positive: "m",
            negative: "n",
        },
        Side::Bottom => KeyBinding {
            positive: "ArrowRight",
            negative: "ArrowLeft",
        },
    }
}

/// Which sides a keyboard may drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlScope {
    /// Same-screen play: every active side's keys are live.
    AllSides,
    /// Networked play: only the locally assigned side responds.
    Only(Side),
}

fn normalize_key(key: &str) -> String {
    if key.chars().count() == 1 {
        key.to_lowercase()
    } else {
        key.to_string()
    }
}

/// Tracks held keys and turns them into a [`PaddleIntent`].
#[derive(Debug, Clone)]
pub struct ControlMapper {
    held: HashSet<String>,
    scope: ControlScope,
    active: BTreeSet<Side>,
    speed: f32,
}

impl ControlMapper {
    pub fn new(scope: ControlScope, active: &BTreeSet<Side>, speed: f32) -> Self {
        Self {
            held: HashSet::new(),
            scope,
            active: active.clone(),
            speed,
        }
    }

    pub fn key_down(&mut self, key: &str) {
        self.held.insert(normalize_key(key));
    }

    pub fn key_up(&mut self, key: &str) {
        self.held.remove(&normalize_key(key));
    }

    pub fn release_all(&mut self) {
        self.held.clear();
    }

    fn controls(&self, side: Side) -> bool {
        self.active.contains(&side)
            && match self.scope {
                ControlScope::AllSides => true,
                ControlScope::Only(own) => own == side,
            }
    }

    /// Intent for this tick. Sides outside the scope are always zero.
    pub fn intent(&self) -> PaddleIntent {
        let mut intent = PaddleIntent::new();
        for &side in &self.active {
            if !self.controls(side) {
                continue;
            }
            let keys = binding_for(side);
            let mut dir = 0.0;
            if self.held.contains(keys.positive) {
                dir += 1.0;
            }
            if self.held.contains(keys.negative) {
                dir -= 1.0;
            }
            intent.set(side, dir * self.speed);
        }
        intent
    }
}
