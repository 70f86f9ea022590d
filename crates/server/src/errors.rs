use std::fmt;

/// Error when creating a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateRoomError {
    /// Maximum number of concurrent rooms reached.
    ServerFull,
}

impl fmt::Display for CreateRoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateRoomError::ServerFull => write!(f, "maximum number of rooms reached"),
        }
    }
}

impl std::error::Error for CreateRoomError {}

/// Error when joining a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// Room not found.
    RoomNotFound,
    /// Room has no free seat.
    RoomFull,
    /// Match is already running or finished.
    AlreadyStarted,
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::RoomNotFound => write!(f, "room not found"),
            JoinError::RoomFull => write!(f, "room is full"),
            JoinError::AlreadyStarted => write!(f, "match has already started"),
        }
    }
}

impl std::error::Error for JoinError {}

/// Error for commands addressed to a room the caller is (supposedly) in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Room not found.
    RoomNotFound,
    /// Player is not a member of the room.
    UnknownPlayer,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::RoomNotFound => write!(f, "room not found"),
            CommandError::UnknownPlayer => write!(f, "player is not in this room"),
        }
    }
}

impl std::error::Error for CommandError {}
