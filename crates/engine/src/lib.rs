pub mod board;
pub mod bot;
mod combat;
pub mod config;
pub mod events;
pub mod game;
pub mod observe;
pub mod player;
mod systems;
pub mod terrain;
pub mod types;

pub use board::{default_spawn_distance, place_spawn_points, Board, Tile};
pub use bot::{Commander, SimpleBot};
pub use config::MatchConfig;
pub use events::{MatchEvent, OverReason};
pub use game::{Match, MoveOrder, QueuedMove};
pub use observe::{render_view, LeaderboardRow, MatchView, PlayerView, TileView};
pub use player::Player;
pub use terrain::TerrainKind;
pub use types::{Coord, PlayerId, Tick};
