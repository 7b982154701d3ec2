use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Side;

/// Per-side points for one match. Scores only ever go up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBoard {
    scores: BTreeMap<Side, u32>,
}

impl ScoreBoard {
    pub fn new(sides: impl IntoIterator<Item = Side>) -> Self {
        Self {
            scores: sides.into_iter().map(|s| (s, 0)).collect(),
        }
    }

    /// Add one point. Returns the new score.
    pub fn increment(&mut self, side: Side) -> u32 {
        let entry = self.scores.entry(side).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn get(&self, side: Side) -> u32 {
        self.scores.get(&side).copied().unwrap_or(0)
    }

    /// Highest-scoring side. Ties go to the earlier side in canonical order.
    pub fn leader(&self) -> Option<Side> {
        self.scores
            .iter()
            .fold(None, |best: Option<(Side, u32)>, (&side, &pts)| match best {
                Some((_, b)) if b >= pts => best,
                _ => Some((side, pts)),
            })
            .map(|(side, _)| side)
    }

    /// The side that reached `win_score`, if any.
    ///
    /// Reaching the target ends the match: with the default of 11, the first
    /// side to score its eleventh point wins. Do not tighten this to "more
    /// than 11"; the game-over rule in DESIGN.md settles it.
    pub fn has_winner(&self, win_score: u32) -> Option<Side> {
        self.scores
            .iter()
            .find(|&(_, &pts)| pts >= win_score)
            .map(|(&side, _)| side)
    }

    /// Replace with the host's numbers, keeping monotonicity per side.
    pub fn merge_from(&mut self, other: &BTreeMap<Side, u32>) {
        for (&side, &pts) in other {
            let entry = self.scores.entry(side).or_insert(0);
            *entry = (*entry).max(pts);
        }
    }

    pub fn as_map(&self) -> &BTreeMap<Side, u32> {
        &self.scores
    }
}
