use crate::events::OverReason;
use crate::game::{Match, QueuedMove};
use crate::terrain::TerrainKind;
use crate::types::{Coord, PlayerId, Tick};
use serde::{Deserialize, Serialize};

/// One cell as a particular viewer sees it. Fogged cells keep their true
/// terrain but report no owner and no soldiers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileView {
    pub terrain: TerrainKind,
    pub owner: Option<PlayerId>,
    pub soldiers: u32,
    pub fog: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub base: Option<Coord>,
    pub alive: bool,
    pub spectator: bool,
    pub voluntary_spectator: bool,
    pub ready: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub player: PlayerId,
    pub soldiers: u32,
    pub tiles: u32,
}

/// Everything a client needs to draw one frame, already personalized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchView {
    pub width: u16,
    pub height: u16,
    pub tick: Tick,
    pub started: bool,
    pub over: bool,
    pub winner: Option<PlayerId>,
    pub over_reason: Option<OverReason>,
    /// Seconds left while the room counts down; absent otherwise.
    pub countdown: Option<u8>,
    /// Row-major, `width * height` entries.
    pub tiles: Vec<TileView>,
    pub players: Vec<PlayerView>,
    pub leaderboard: Vec<LeaderboardRow>,
    /// The requesting player's own queued arrows; empty for spectators and
    /// anonymous viewers.
    pub arrows: Vec<QueuedMove>,
}

/// Build the personalized view for `viewer`. `None` means an omniscient
/// observer (room listings, logs, spectator streams without a member id).
/// Fog only applies to active participants of a started match.
pub fn render_view(state: &Match, viewer: Option<PlayerId>, countdown: Option<u8>) -> MatchView {
    let fogged = viewer
        .and_then(|id| state.player(id))
        .filter(|p| state.started() && !p.spectator)
        .map(|p| p.id);
    let mask = fogged.and_then(|id| state.visibility.get(&id));

    let tiles = state
        .board
        .tiles()
        .iter()
        .enumerate()
        .map(|(idx, tile)| {
            let visible = mask.map(|m| m[idx]).unwrap_or(true);
            if visible {
                TileView {
                    terrain: tile.terrain,
                    owner: tile.owner,
                    soldiers: tile.soldiers,
                    fog: false,
                }
            } else {
                TileView {
                    terrain: tile.terrain,
                    owner: None,
                    soldiers: 0,
                    fog: true,
                }
            }
        })
        .collect();

    let players = state
        .players()
        .map(|p| PlayerView {
            id: p.id,
            name: p.name.clone(),
            color: p.color.clone(),
            base: p.base,
            alive: p.alive,
            spectator: p.spectator,
            voluntary_spectator: p.voluntary_spectator,
            ready: p.ready,
        })
        .collect();

    let leaderboard = state
        .leaderboard()
        .into_iter()
        .map(|(player, soldiers, tiles)| LeaderboardRow {
            player,
            soldiers,
            tiles,
        })
        .collect();

    let arrows = viewer
        .map(|id| state.arrows_for(id).to_vec())
        .unwrap_or_default();

    MatchView {
        width: state.board.width(),
        height: state.board.height(),
        tick: state.tick(),
        started: state.started(),
        over: state.over(),
        winner: state.winner(),
        over_reason: state.over_reason(),
        countdown,
        tiles,
        players,
        leaderboard,
        arrows,
    }
}
