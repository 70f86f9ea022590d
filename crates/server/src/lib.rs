pub mod colors;
pub mod errors;
pub mod events;
pub mod orchestrator;
pub mod recorder;
pub mod room;
pub mod tick_loop;
pub mod types;

pub use errors::{CommandError, CreateRoomError, JoinError};
pub use events::ServerMessage;
pub use orchestrator::Orchestrator;
pub use recorder::{
    AccountStats, MatchRecordId, MatchRecorder, MemoryRecorder, NoopRecorder, RecordedMatch,
    RecordedParticipant,
};
pub use room::{ConnectionTx, RoomHandle};
pub use types::{AccountId, JoinedRoom, RoomId, RoomPhase, RoomSummary, ServerConfig};
