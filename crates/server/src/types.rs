use garrison_engine::{MatchConfig, PlayerId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifies a room. Allocated from `first_room_id` upward; freed ids are
/// reissued lowest-first.
pub type RoomId = u32;

/// Stable account identity supplied by the transport layer. Guests have
/// none and never touch persistence.
pub type AccountId = i64;

/// Lifecycle of a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    Waiting,
    CountingDown,
    Active,
    Over,
    Closed,
}

/// One line of the public room listing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub phase: RoomPhase,
    pub players: usize,
    pub capacity: usize,
}

/// What a successful join hands back to the transport layer.
#[derive(Clone, Debug)]
pub struct JoinedRoom {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub color: String,
}

/// Configuration for the room host.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Simulation step cadence while a room is active.
    pub tick_interval: Duration,
    /// Cadence of pushed snapshots, across all phases.
    pub broadcast_interval: Duration,
    /// Lobby countdown length, in whole steps.
    pub countdown_seconds: u8,
    /// Wall-clock gap between countdown steps.
    pub countdown_interval: Duration,
    /// How long a finished room lingers before closing itself.
    pub close_grace: Duration,
    /// Seats per room, spectators included.
    pub max_players_per_room: usize,
    /// Concurrent room cap.
    pub max_rooms: usize,
    /// First id handed out by the allocator.
    pub first_room_id: RoomId,
    /// Board settings applied to every new match.
    pub game: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(600),
            broadcast_interval: Duration::from_secs(1),
            countdown_seconds: 3,
            countdown_interval: Duration::from_secs(1),
            close_grace: Duration::from_secs(30),
            max_players_per_room: 8,
            max_rooms: 64,
            first_room_id: 1000,
            game: MatchConfig::default(),
        }
    }
}
