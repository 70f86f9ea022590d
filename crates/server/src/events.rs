use crate::types::{RoomId, RoomPhase, RoomSummary};
use garrison_engine::{Coord, MatchView, OverReason, PlayerId};
use serde::{Deserialize, Serialize};

/// Everything the server pushes to clients, tagged for transport as
/// `{"type": "..."}`. Snapshots are personalized per recipient; the rest is
/// identical for everyone in the room.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomCreated {
        room_id: RoomId,
    },
    RoomJoined {
        room_id: RoomId,
        player_id: PlayerId,
        color: String,
    },
    RoomList {
        rooms: Vec<RoomSummary>,
    },
    PlayerJoined {
        player_id: PlayerId,
        name: String,
        color: String,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    CountdownTick {
        seconds_left: u8,
    },
    CountdownCancelled,
    MatchStarted,
    Snapshot {
        room_id: RoomId,
        phase: RoomPhase,
        view: MatchView,
    },
    MatchOver {
        winner: Option<PlayerId>,
        reason: OverReason,
    },
    MatchReset,
    MoveResult {
        accepted: bool,
        from: Coord,
        to: Coord,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_their_type_tag() {
        let json = serde_json::to_string(&ServerMessage::CountdownTick { seconds_left: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"countdown_tick","seconds_left":2}"#);

        let json = serde_json::to_string(&ServerMessage::MatchStarted).unwrap();
        assert_eq!(json, r#"{"type":"match_started"}"#);

        let back: ServerMessage =
            serde_json::from_str(r#"{"type":"player_left","player_id":3}"#).unwrap();
        assert!(matches!(back, ServerMessage::PlayerLeft { player_id: 3 }));
    }
}
