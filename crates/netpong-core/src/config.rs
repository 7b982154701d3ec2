use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::geometry::Vec2;
use crate::powerup::PowerUpKind;

/// One of the four paddle positions around the play area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

/// Axis a paddle travels along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Bottom, Side::Top];

    /// Canonical integer encoding used by `reset_round` and score mapping.
    pub fn wire_code(self) -> u8 {
        match self {
            Side::Left => 1,
            Side::Right => 2,
            Side::Bottom => 3,
            Side::Top => 4,
        }
    }

    pub fn from_wire_code(code: u8) -> Option<Side> {
        match code {
            1 => Some(Side::Left),
            2 => Some(Side::Right),
            3 => Some(Side::Bottom),
            4 => Some(Side::Top),
            _ => None,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
        }
    }

    /// Axis of paddle travel. LEFT/RIGHT paddles slide along y, TOP/BOTTOM along x.
    pub fn axis(self) -> Axis {
        match self {
            Side::Left | Side::Right => Axis::Y,
            Side::Top | Side::Bottom => Axis::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Top => "top",
            Side::Bottom => "bottom",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            "top" => Ok(Side::Top),
            "bottom" => Ok(Side::Bottom),
            _ => Err(ConfigError::InvalidSide(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Local,
    Networked,
}

impl std::str::FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "local_solo" | "solo" => Ok(Mode::Local),
            "networked" | "online" | "remote" => Ok(Mode::Networked),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

/// Map style. Only affects play-area geometry and paddle spawn inset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapStyle {
    #[default]
    Classic,
    Wide,
    Square,
}

impl MapStyle {
    pub fn play_area(self) -> PlayArea {
        match self {
            MapStyle::Classic => PlayArea::new(100.0, 60.0),
            MapStyle::Wide => PlayArea::new(140.0, 70.0),
            MapStyle::Square => PlayArea::new(80.0, 80.0),
        }
    }

    /// Distance from the play-area edge to each paddle's center line.
    pub fn paddle_inset(self) -> f32 {
        match self {
            MapStyle::Classic | MapStyle::Square => 2.0,
            MapStyle::Wide => 3.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MapStyle::Classic => "classic",
            MapStyle::Wide => "wide",
            MapStyle::Square => "square",
        }
    }
}

impl std::str::FromStr for MapStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(MapStyle::Classic),
            "wide" => Ok(MapStyle::Wide),
            "square" => Ok(MapStyle::Square),
            _ => Err(ConfigError::InvalidMapStyle(s.to_string())),
        }
    }
}

/// Play-area dimensions, centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayArea {
    pub width: f32,
    pub depth: f32,
}

impl PlayArea {
    pub const fn new(width: f32, depth: f32) -> Self {
        Self { width, depth }
    }

    pub fn half_width(&self) -> f32 {
        self.width / 2.0
    }

    pub fn half_depth(&self) -> f32 {
        self.depth / 2.0
    }

    /// Half extent along a paddle's axis of travel.
    pub fn half_extent(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.half_width(),
            Axis::Y => self.half_depth(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleSize {
    pub width: f32,
    pub height: f32,
}

impl PaddleSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Default size for a side: tall-thin on LEFT/RIGHT, wide-short on TOP/BOTTOM.
    pub fn default_for(side: Side) -> Self {
        match side.axis() {
            Axis::Y => Self::new(1.0, 10.0),
            Axis::X => Self::new(10.0, 1.0),
        }
    }

    pub fn as_vec(self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Extent along the paddle's axis of travel.
    pub fn length_along(self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
        }
    }

    /// Same thickness, new extent along the axis of travel.
    pub fn with_length(self, axis: Axis, length: f32) -> Self {
        match axis {
            Axis::X => Self::new(length, self.height),
            Axis::Y => Self::new(self.width, length),
        }
    }
}

/// Configuration problems found while building a [`MatchConfig`].
/// None of these are fatal: each one is replaced by a safe default.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidMode(String),
    InvalidMapStyle(String),
    InvalidPlayerCount(u8),
    InvalidSide(String),
    SideListMismatch { player_count: u8, sides: Vec<String> },
    InvalidPowerUp(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMode(m) => write!(f, "invalid mode: {m}"),
            Self::InvalidMapStyle(m) => write!(f, "invalid map style: {m}"),
            Self::InvalidPlayerCount(n) => write!(f, "invalid player count: {n} (expected 2 or 4)"),
            Self::InvalidSide(s) => write!(f, "invalid side: {s}"),
            Self::SideListMismatch {
                player_count,
                sides,
            } => write!(
                f,
                "side list {sides:?} does not match a {player_count}-player match"
            ),
            Self::InvalidPowerUp(p) => write!(f, "invalid power-up type: {p}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Loosely-typed match settings as they arrive from a lobby or a settings form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    pub mode: Option<String>,
    pub player_count: Option<u8>,
    pub map_style: Option<String>,
    /// Optional explicit side list. Must match the player count.
    pub sides: Option<Vec<String>>,
    pub power_ups: bool,
    /// Power-up kinds to enable. `None` enables every kind.
    pub power_up_types: Option<Vec<String>>,
    /// Sides driven by the bot policy (solo play).
    pub bot_sides: Vec<String>,
}

/// Validated, immutable description of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    mode: Mode,
    player_count: u8,
    active_sides: BTreeSet<Side>,
    map_style: MapStyle,
    play_area: PlayArea,
    paddle_size: BTreeMap<Side, PaddleSize>,
    paddle_location: BTreeMap<Side, f32>,
    power_ups_enabled: bool,
    active_power_ups: BTreeSet<PowerUpKind>,
    bot_sides: BTreeSet<Side>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::local(2, MapStyle::Classic)
    }
}

impl MatchConfig {
    fn build(mode: Mode, player_count: u8, map_style: MapStyle) -> Self {
        let player_count = if player_count == 4 { 4 } else { 2 };
        let active_sides = sides_for(player_count);
        Self {
            mode,
            player_count,
            paddle_size: active_sides
                .iter()
                .map(|&s| (s, PaddleSize::default_for(s)))
                .collect(),
            paddle_location: active_sides.iter().map(|&s| (s, 0.0)).collect(),
            active_sides,
            map_style,
            play_area: map_style.play_area(),
            power_ups_enabled: false,
            active_power_ups: BTreeSet::new(),
            bot_sides: BTreeSet::new(),
        }
    }

    /// Local (same-screen) match. Player counts other than 2 or 4 fall back to 2.
    pub fn local(player_count: u8, map_style: MapStyle) -> Self {
        Self::build(Mode::Local, player_count, map_style)
    }

    /// Networked match. Player counts other than 2 or 4 fall back to 2.
    pub fn networked(player_count: u8, map_style: MapStyle) -> Self {
        Self::build(Mode::Networked, player_count, map_style)
    }

    /// Enable the given power-up kinds.
    pub fn with_power_ups(mut self, kinds: impl IntoIterator<Item = PowerUpKind>) -> Self {
        self.active_power_ups = kinds.into_iter().collect();
        self.power_ups_enabled = !self.active_power_ups.is_empty();
        self
    }

    /// Hand the given sides to the bot policy. Inactive sides are ignored.
    pub fn with_bots(mut self, sides: impl IntoIterator<Item = Side>) -> Self {
        self.bot_sides = sides
            .into_iter()
            .filter(|s| self.active_sides.contains(s))
            .collect();
        self
    }

    /// Validate loose settings, collecting every problem found.
    /// Each invalid value is replaced by its default.
    pub fn resolve(settings: &MatchSettings) -> (Self, Vec<ConfigError>) {
        let mut errors = Vec::new();

        let mode = match settings.mode.as_deref() {
            None => Mode::Local,
            Some(m) => m.parse().unwrap_or_else(|e| {
                errors.push(e);
                Mode::Local
            }),
        };

        let map_style = match settings.map_style.as_deref() {
            None => MapStyle::Classic,
            Some(m) => m.parse().unwrap_or_else(|e| {
                errors.push(e);
                MapStyle::Classic
            }),
        };

        let player_count = match settings.player_count {
            None => 2,
            Some(n @ (2 | 4)) => n,
            Some(n) => {
                errors.push(ConfigError::InvalidPlayerCount(n));
                2
            },
        };

        if let Some(ref sides) = settings.sides {
            let parsed: Result<BTreeSet<Side>, ConfigError> =
                sides.iter().map(|s| s.parse::<Side>()).collect();
            match parsed {
                Ok(set) if set == sides_for(player_count) => {},
                Ok(_) => errors.push(ConfigError::SideListMismatch {
                    player_count,
                    sides: sides.clone(),
                }),
                Err(e) => errors.push(e),
            }
        }

        let mut config = Self::build(mode, player_count, map_style);

        if settings.power_ups {
            let kinds: Vec<PowerUpKind> = match settings.power_up_types {
                None => PowerUpKind::ALL.to_vec(),
                Some(ref names) => names
                    .iter()
                    .filter_map(|n| match n.parse::<PowerUpKind>() {
                        Ok(k) => Some(k),
                        Err(e) => {
                            errors.push(e);
                            None
                        },
                    })
                    .collect(),
            };
            config = config.with_power_ups(kinds);
        }

        let bots: Vec<Side> = settings
            .bot_sides
            .iter()
            .filter_map(|s| match s.parse::<Side>() {
                Ok(side) => Some(side),
                Err(e) => {
                    errors.push(e);
                    None
                },
            })
            .collect();
        config = config.with_bots(bots);

        (config, errors)
    }

    /// Single validating factory. Problems are logged and defaulted; the match always starts.
    pub fn from_settings(settings: &MatchSettings) -> Self {
        let (config, errors) = Self::resolve(settings);
        for e in &errors {
            tracing::warn!(error = %e, "Match configuration problem, using default");
        }
        config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn player_count(&self) -> u8 {
        self.player_count
    }

    pub fn active_sides(&self) -> &BTreeSet<Side> {
        &self.active_sides
    }

    pub fn is_active(&self, side: Side) -> bool {
        self.active_sides.contains(&side)
    }

    pub fn map_style(&self) -> MapStyle {
        self.map_style
    }

    pub fn play_area(&self) -> PlayArea {
        self.play_area
    }

    pub fn paddle_size(&self, side: Side) -> PaddleSize {
        self.paddle_size
            .get(&side)
            .copied()
            .unwrap_or_else(|| PaddleSize::default_for(side))
    }

    pub fn paddle_location(&self, side: Side) -> f32 {
        self.paddle_location.get(&side).copied().unwrap_or(0.0)
    }

    pub fn power_ups_enabled(&self) -> bool {
        self.power_ups_enabled
    }

    pub fn active_power_ups(&self) -> &BTreeSet<PowerUpKind> {
        &self.active_power_ups
    }

    pub fn bot_sides(&self) -> &BTreeSet<Side> {
        &self.bot_sides
    }

    /// Center of a paddle given its offset along the axis of travel.
    pub fn paddle_center(&self, side: Side, offset: f32) -> Vec2 {
        let inset = self.map_style.paddle_inset();
        let hw = self.play_area.half_width();
        let hd = self.play_area.half_depth();
        match side {
            Side::Left => Vec2::new(-(hw - inset), offset),
            Side::Right => Vec2::new(hw - inset, offset),
            Side::Bottom => Vec2::new(offset, -(hd - inset)),
            Side::Top => Vec2::new(offset, hd - inset),
        }
    }
}

fn sides_for(player_count: u8) -> BTreeSet<Side> {
    if player_count == 4 {
        Side::ALL.into_iter().collect()
    } else {
        [Side::Left, Side::Right].into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_player_uses_left_and_right() {
        let cfg = MatchConfig::local(2, MapStyle::Classic);
        let sides: Vec<Side> = cfg.active_sides().iter().copied().collect();
        assert_eq!(sides, vec![Side::Left, Side::Right]);
        assert_eq!(cfg.play_area(), PlayArea::new(100.0, 60.0));
    }

    #[test]
    fn four_player_uses_every_side() {
        let cfg = MatchConfig::networked(4, MapStyle::Square);
        assert_eq!(cfg.active_sides().len(), 4);
        assert_eq!(cfg.mode(), Mode::Networked);
        assert_eq!(cfg.paddle_size(Side::Top), PaddleSize::new(10.0, 1.0));
        assert_eq!(cfg.paddle_size(Side::Left), PaddleSize::new(1.0, 10.0));
    }

    #[test]
    fn wire_codes_are_canonical() {
        assert_eq!(Side::Left.wire_code(), 1);
        assert_eq!(Side::Right.wire_code(), 2);
        assert_eq!(Side::Bottom.wire_code(), 3);
        assert_eq!(Side::Top.wire_code(), 4);
        for side in Side::ALL {
            assert_eq!(Side::from_wire_code(side.wire_code()), Some(side));
        }
        assert_eq!(Side::from_wire_code(0), None);
        assert_eq!(Side::from_wire_code(5), None);
    }

    #[test]
    fn side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Side::Bottom).unwrap(), "\"bottom\"");
        let s: Side = serde_json::from_str("\"top\"").unwrap();
        assert_eq!(s, Side::Top);
    }

    #[test]
    fn invalid_settings_fall_back_to_defaults() {
        let settings = MatchSettings {
            mode: Some("hyperspace".to_string()),
            map_style: Some("moon".to_string()),
            player_count: Some(3),
            ..MatchSettings::default()
        };
        let (cfg, errors) = MatchConfig::resolve(&settings);
        assert_eq!(cfg.mode(), Mode::Local);
        assert_eq!(cfg.map_style(), MapStyle::Classic);
        assert_eq!(cfg.player_count(), 2);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn from_settings_never_fails() {
        let settings = MatchSettings {
            sides: Some(vec!["left".to_string(), "sideways".to_string()]),
            ..MatchSettings::default()
        };
        let cfg = MatchConfig::from_settings(&settings);
        assert_eq!(cfg.player_count(), 2);
    }

    #[test]
    fn mismatched_side_list_is_reported() {
        let settings = MatchSettings {
            player_count: Some(4),
            sides: Some(vec!["left".to_string(), "right".to_string()]),
            ..MatchSettings::default()
        };
        let (cfg, errors) = MatchConfig::resolve(&settings);
        assert_eq!(cfg.active_sides().len(), 4);
        assert!(matches!(
            errors[0],
            ConfigError::SideListMismatch {
                player_count: 4,
                ..
            }
        ));
    }

    #[test]
    fn settings_parse_from_json() {
        let json = r#"{"mode":"networked","player_count":4,"map_style":"wide","power_ups":true,"power_up_types":["speed_up","bogus"]}"#;
        let settings: MatchSettings = serde_json::from_str(json).unwrap();
        let (cfg, errors) = MatchConfig::resolve(&settings);
        assert_eq!(cfg.mode(), Mode::Networked);
        assert_eq!(cfg.map_style(), MapStyle::Wide);
        assert!(cfg.power_ups_enabled());
        assert_eq!(cfg.active_power_ups().len(), 1);
        assert_eq!(errors, vec![ConfigError::InvalidPowerUp("bogus".to_string())]);
    }

    #[test]
    fn bots_only_on_active_sides() {
        let cfg = MatchConfig::local(2, MapStyle::Classic).with_bots([Side::Right, Side::Top]);
        assert_eq!(cfg.bot_sides().len(), 1);
        assert!(cfg.bot_sides().contains(&Side::Right));
    }

    #[test]
    fn paddle_centers_sit_inside_the_play_area() {
        let cfg = MatchConfig::local(4, MapStyle::Classic);
        assert_eq!(cfg.paddle_center(Side::Left, 3.0), Vec2::new(-48.0, 3.0));
        assert_eq!(cfg.paddle_center(Side::Right, 0.0), Vec2::new(48.0, 0.0));
        assert_eq!(cfg.paddle_center(Side::Top, -1.0), Vec2::new(-1.0, 28.0));
        assert_eq!(cfg.paddle_center(Side::Bottom, 0.0), Vec2::new(0.0, -28.0));
    }
}
