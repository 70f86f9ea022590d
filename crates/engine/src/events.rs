use crate::types::{Coord, PlayerId};
use serde::{Deserialize, Serialize};

/// How a match ended. Only `Normal` endings count for stats and rewards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverReason {
    /// Decided on the board: one participant left standing (or none, a draw).
    Normal,
    /// Forced from outside: room closed, too many departures, or a rematch
    /// cutting a running match short.
    Abnormal,
}

/// Emitted by [`crate::Match::advance`] for the orchestration layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchEvent {
    MoveExecuted {
        player: PlayerId,
        from: Coord,
        to: Coord,
    },
    PlayerEliminated {
        player: PlayerId,
        by: PlayerId,
    },
    MatchOver {
        winner: Option<PlayerId>,
        reason: OverReason,
    },
}
