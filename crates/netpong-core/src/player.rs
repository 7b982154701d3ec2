use serde::{Deserialize, Serialize};

use crate::config::Side;

/// Unique identifier for a connected player.
pub type PlayerId = u64;

/// A player connected to a netpong room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    /// The room leader starts the match and hosts the authoritative simulation.
    pub is_leader: bool,
    /// Seated players get a side when the match starts; everyone else watches.
    pub is_spectator: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
}

/// Maximum display-name length kept by the lobby.
pub const MAX_NAME_LEN: usize = 24;

/// Trim a requested name to something displayable. Empty names get a numbered placeholder.
pub fn sanitize_name(raw: &str, id: PlayerId) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        format!("Player{id}")
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_capped() {
        assert_eq!(sanitize_name("  Alice  ", 1), "Alice");
        assert_eq!(sanitize_name("", 7), "Player7");
        assert_eq!(sanitize_name("\u{7}\n", 3), "Player3");
        assert_eq!(sanitize_name(&"x".repeat(100), 1).len(), MAX_NAME_LEN);
    }

    #[test]
    fn side_is_omitted_until_assigned() {
        let p = Player {
            id: 1,
            display_name: "Alice".into(),
            is_leader: true,
            is_spectator: false,
            side: None,
        };
        let json = serde_json::to_string(&p).unwrap();
        assert!(!json.contains("side"));
        let back: Player = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
