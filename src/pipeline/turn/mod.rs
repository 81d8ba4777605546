pub mod controller;
pub mod prompt;
pub mod retry;

pub use controller::*;
pub use prompt::*;
pub use retry::*;

use serde::{Deserialize, Serialize};

/// Position of a turn within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// First layer: no patient answers yet, a result is never accepted.
    First,
    /// Any later layer below the cap.
    FollowUp,
    /// Cap reached: only a result is accepted.
    Final,
}

impl TurnKind {
    pub fn is_first_layer(&self) -> bool {
        matches!(self, Self::First)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::FollowUp => "follow_up",
            Self::Final => "final",
        }
    }
}
