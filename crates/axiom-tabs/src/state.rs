//! Tab lifecycle state machine
//!
//! ```text
//!            focus
//! Background ─────▶ Active
//!     ▲   ◀───────── │
//!     │      blur    │
//!     │ thaw         │ freeze (memory pressure)
//!     └──── Frozen ◀─┘
//!
//! any state ──close──▶ Destroyed
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabState {
    /// Tab is in the foreground of the window
    Active,
    /// Tab has a live view but is not visible
    Background,
    /// Live view released, only the saved snapshot remains
    Frozen,
    /// Terminal state
    Destroyed,
}

impl TabState {
    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, target: TabState) -> bool {
        match (self, target) {
            (TabState::Active, TabState::Background) => true,
            (TabState::Background, TabState::Active) => true,
            // Memory pressure can evict the foreground tab too
            (TabState::Active, TabState::Frozen) => true,
            (TabState::Background, TabState::Frozen) => true,
            (TabState::Frozen, TabState::Active) => true,
            (TabState::Frozen, TabState::Background) => true,
            (TabState::Destroyed, _) => false,
            (_, TabState::Destroyed) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }

    /// Returns true while the tab owns a live content view
    pub fn has_live_view(&self) -> bool {
        matches!(self, TabState::Active | TabState::Background)
    }

    pub fn is_foreground(&self) -> bool {
        matches!(self, TabState::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TabState::Active => "active",
            TabState::Background => "background",
            TabState::Frozen => "frozen",
            TabState::Destroyed => "destroyed",
        }
    }
}

impl std::fmt::Display for TabState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TabState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TabState::Active),
            "background" => Ok(TabState::Background),
            "frozen" => Ok(TabState::Frozen),
            "destroyed" => Ok(TabState::Destroyed),
            _ => Err(format!("Unknown tab state: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(TabState::Active.can_transition_to(TabState::Background));
        assert!(TabState::Background.can_transition_to(TabState::Active));
        assert!(TabState::Background.can_transition_to(TabState::Frozen));
        assert!(TabState::Active.can_transition_to(TabState::Frozen));
        assert!(TabState::Frozen.can_transition_to(TabState::Background));
        assert!(TabState::Frozen.can_transition_to(TabState::Active));
        assert!(TabState::Frozen.can_transition_to(TabState::Destroyed));
        // Freezing a frozen tab is a no-op
        assert!(TabState::Frozen.can_transition_to(TabState::Frozen));
    }

    #[test]
    fn test_destroyed_is_terminal() {
        assert!(!TabState::Destroyed.can_transition_to(TabState::Active));
        assert!(!TabState::Destroyed.can_transition_to(TabState::Background));
        assert!(!TabState::Destroyed.can_transition_to(TabState::Frozen));
        assert!(!TabState::Destroyed.can_transition_to(TabState::Destroyed));
    }

    #[test]
    fn test_parse_round_trip() {
        for state in [
            TabState::Active,
            TabState::Background,
            TabState::Frozen,
            TabState::Destroyed,
        ] {
            assert_eq!(state.as_str().parse::<TabState>().unwrap(), state);
        }
        assert!("discarded".parse::<TabState>().is_err());
    }
}
