use crate::board::{self, Board};
use crate::config::MatchConfig;
use crate::events::{MatchEvent, OverReason};
use crate::player::Player;
use crate::systems;
use crate::terrain::TerrainKind;
use crate::types::{Coord, PlayerId, Tick};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// A movement intent: one tile's stack onto an orthogonal neighbor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOrder {
    pub from: Coord,
    pub to: Coord,
}

/// A queued move. Within one player, `(from, to, queued_tick)` is the move's
/// identity; the same endpoints queued on different ticks stay distinct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMove {
    pub from: Coord,
    pub to: Coord,
    pub queued_tick: Tick,
}

/// One running (or waiting) game: board, members, queued intents and
/// lifecycle flags. All mutation goes through the methods here and the tick
/// pipeline; the room layer owns scheduling and everything social.
pub struct Match {
    pub(crate) config: MatchConfig,
    pub(crate) rng: StdRng,
    pub(crate) board: Board,
    pub(crate) players: BTreeMap<PlayerId, Player>,
    pub(crate) spawn_points: Vec<Coord>,
    /// FIFO intent queue per player; exactly one entry pops per tick.
    pub(crate) pending: BTreeMap<PlayerId, VecDeque<QueuedMove>>,
    /// Movement arrows mirrored to the owning player's view, cleared when
    /// the matching move executes.
    pub(crate) arrows: HashMap<PlayerId, Vec<QueuedMove>>,
    /// Flat row-major visibility mask per player, rebuilt every tick.
    pub(crate) visibility: HashMap<PlayerId, Vec<bool>>,
    pub(crate) tick: Tick,
    pub(crate) started: bool,
    pub(crate) over: bool,
    pub(crate) winner: Option<PlayerId>,
    pub(crate) over_reason: Option<OverReason>,
}

impl Match {
    pub fn new(config: MatchConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let board = Board::generate(&config, &mut rng);
        Self {
            config,
            rng,
            board,
            players: BTreeMap::new(),
            spawn_points: Vec::new(),
            pending: BTreeMap::new(),
            arrows: HashMap::new(),
            visibility: HashMap::new(),
            tick: 0,
            started: false,
            over: false,
            winner: None,
            over_reason: None,
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn over(&self) -> bool {
        self.over
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn over_reason(&self) -> Option<OverReason> {
        self.over_reason
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Players still contending: alive and not spectating.
    pub fn participant_count(&self) -> usize {
        self.players.values().filter(|p| p.is_participant()).count()
    }

    pub fn arrows_for(&self, id: PlayerId) -> &[QueuedMove] {
        self.arrows.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pre-generate the spawn list, used when re-seeding a room whose
    /// membership is already known.
    pub fn reserve_spawn_points(&mut self, players: usize, min_distance: Option<u32>) {
        self.spawn_points =
            board::place_spawn_points(&self.board, players, min_distance, &mut self.rng);
    }

    /// Add a player and claim their base. The join index is the current
    /// member count; when it runs past the reserved spawn list, the list is
    /// regenerated one larger at the lobby spacing.
    pub fn join(&mut self, id: PlayerId, name: impl Into<String>, color: impl Into<String>) -> Coord {
        let index = self.players.len();
        if index >= self.spawn_points.len() {
            self.spawn_points = board::place_spawn_points(
                &self.board,
                index + 1,
                Some(self.config.join_spawn_distance),
                &mut self.rng,
            );
        }
        let base = self.spawn_points[index];
        self.claim_base(id, base);

        let mut player = Player::new(id, name.into(), color.into());
        player.base = Some(base);
        self.players.insert(id, player);
        self.pending.insert(id, VecDeque::new());
        self.arrows.insert(id, Vec::new());
        base
    }

    /// Add a member who only watches: no base, auto-ready.
    pub fn join_as_spectator(
        &mut self,
        id: PlayerId,
        name: impl Into<String>,
        color: impl Into<String>,
    ) {
        let mut player = Player::new(id, name.into(), color.into());
        player.spectator = true;
        player.voluntary_spectator = true;
        player.ready = true;
        self.players.insert(id, player);
        self.pending.insert(id, VecDeque::new());
        self.arrows.insert(id, Vec::new());
    }

    fn claim_base(&mut self, id: PlayerId, at: Coord) {
        let garrison = TerrainKind::Base.roll_garrison(&mut self.rng);
        if let Some(tile) = self.board.tile_mut(at) {
            tile.terrain = TerrainKind::Base;
            tile.owner = Some(id);
            tile.soldiers = garrison;
        }
    }

    /// Step aside before the match starts: the base tile reverts to neutral
    /// plain and the player stops blocking readiness.
    pub fn set_voluntary_spectator(&mut self, id: PlayerId) -> bool {
        if self.started || !self.players.contains_key(&id) {
            return false;
        }
        let base = self.players.get(&id).and_then(|p| p.base);
        if let Some(at) = base {
            if let Some(tile) = self.board.tile_mut(at) {
                tile.terrain = TerrainKind::Plain;
                tile.owner = None;
                tile.soldiers = 0;
            }
        }
        if let Some(player) = self.players.get_mut(&id) {
            player.base = None;
            player.spectator = true;
            player.voluntary_spectator = true;
            player.ready = true;
        }
        true
    }

    /// Rejoin the contenders before the match starts. Re-claims a spawn
    /// point nobody holds, regenerating the list when all are taken.
    pub fn cancel_voluntary_spectator(&mut self, id: PlayerId) -> bool {
        if self.started {
            return false;
        }
        match self.players.get(&id) {
            Some(p) if p.voluntary_spectator => {}
            _ => return false,
        }

        let claimed: Vec<Coord> = self.players.values().filter_map(|p| p.base).collect();
        let mut spot = self
            .spawn_points
            .iter()
            .copied()
            .find(|sp| !claimed.contains(sp));
        if spot.is_none() {
            self.spawn_points = board::place_spawn_points(
                &self.board,
                self.players.len() + 1,
                Some(self.config.join_spawn_distance),
                &mut self.rng,
            );
            spot = self.spawn_points.last().copied();
        }
        let Some(at) = spot else { return false };

        self.claim_base(id, at);
        if let Some(player) = self.players.get_mut(&id) {
            player.base = Some(at);
            player.spectator = false;
            player.voluntary_spectator = false;
            player.ready = false;
        }
        true
    }

    /// Flip a player's ready vote. Returns the new state.
    pub fn toggle_ready(&mut self, id: PlayerId) -> Option<bool> {
        let player = self.players.get_mut(&id)?;
        player.ready = !player.ready;
        Some(player.ready)
    }

    /// Queue a move intent. Validated here and again at execution, since the
    /// board changes in between; spectators are always refused. Queued
    /// intents are never applied immediately.
    pub fn enqueue_move(&mut self, id: PlayerId, order: MoveOrder) -> bool {
        match self.players.get(&id) {
            Some(p) if !p.spectator => {}
            _ => return false,
        }
        if !self.is_legal_move(id, order.from, order.to) {
            return false;
        }
        let queued = QueuedMove {
            from: order.from,
            to: order.to,
            queued_tick: self.tick,
        };
        self.pending.entry(id).or_default().push_back(queued);
        self.arrows.entry(id).or_default().push(queued);
        true
    }

    pub(crate) fn is_legal_move(&self, id: PlayerId, from: Coord, to: Coord) -> bool {
        if !self.board.in_bounds(from) || !self.board.in_bounds(to) {
            return false;
        }
        if from.manhattan(to) != 1 {
            return false;
        }
        let Some(src) = self.board.tile(from) else {
            return false;
        };
        if src.owner != Some(id) || src.soldiers < 2 {
            return false;
        }
        self.board.tile(to).is_some_and(|t| t.terrain.passable())
    }

    /// Begin the match. Fog is computed once here so the very first views
    /// are already filtered.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        systems::refresh_fog(self);
    }

    /// Advance one tick: moves, then production, then fog, then the win
    /// check. No-op unless the match is running.
    pub fn advance(&mut self, events: &mut Vec<MatchEvent>) {
        if !self.started || self.over {
            return;
        }
        self.tick += 1;
        systems::execute_pending_moves(self, events);
        systems::produce_soldiers(self);
        systems::refresh_fog(self);
        systems::check_winner(self, events);
    }

    /// Drop a member entirely: their tiles go neutral keeping garrisons,
    /// their base tile flattens to plain, their queues and masks vanish.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let Some(player) = self.players.remove(&id) else {
            return false;
        };
        for tile in self.board.tiles_mut() {
            if tile.owner == Some(id) {
                tile.owner = None;
            }
        }
        if let Some(at) = player.base {
            if let Some(tile) = self.board.tile_mut(at) {
                tile.terrain = TerrainKind::Plain;
            }
        }
        self.pending.remove(&id);
        self.arrows.remove(&id);
        self.visibility.remove(&id);
        true
    }

    /// Cut the match short from outside the board. Winner stays empty and
    /// the ending is marked so stats stay untouched.
    pub fn force_abnormal_end(&mut self) -> bool {
        if self.over {
            return false;
        }
        self.over = true;
        self.winner = None;
        self.over_reason = Some(OverReason::Abnormal);
        true
    }

    /// All players ranked by soldiers, then tiles, descending.
    pub fn leaderboard(&self) -> Vec<(PlayerId, u32, u32)> {
        let mut rows: Vec<(PlayerId, u32, u32)> = self
            .players
            .keys()
            .map(|&id| {
                let (soldiers, tiles) = self.board.tally(id);
                (id, soldiers, tiles)
            })
            .collect();
        rows.sort_by(|a, b| (b.1, b.2).cmp(&(a.1, a.2)));
        rows
    }

    /// Whether `player` currently sees `at`. Everything is visible until the
    /// match starts; afterwards the per-tick masks decide.
    pub fn is_visible(&self, player: PlayerId, at: Coord) -> bool {
        if !self.started {
            return true;
        }
        if !self.board.in_bounds(at) {
            return false;
        }
        self.visibility
            .get(&player)
            .map(|mask| mask[self.board.idx(at)])
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_player_match(seed: u64) -> Match {
        let mut m = Match::new(MatchConfig::default(), seed);
        m.join(1, "ada", "#FF0000");
        m.join(2, "bob", "#0000FF");
        m
    }

    #[test]
    fn join_claims_distinct_bases() {
        let m = two_player_match(42);
        let a = m.player(1).and_then(|p| p.base).unwrap();
        let b = m.player(2).and_then(|p| p.base).unwrap();
        assert_ne!(a, b);
        for (id, at) in [(1, a), (2, b)] {
            let tile = m.board().tile(at).unwrap();
            assert_eq!(tile.terrain, TerrainKind::Base);
            assert_eq!(tile.owner, Some(id));
            assert_eq!(tile.soldiers, 10);
        }
    }

    #[test]
    fn enqueue_validates_ownership_adjacency_and_strength() {
        let mut m = two_player_match(7);
        let base = m.player(1).and_then(|p| p.base).unwrap();
        let target = Coord::new(base.x + 1, base.y);

        // Not my tile.
        assert!(!m.enqueue_move(2, MoveOrder { from: base, to: target }));
        // Not adjacent.
        assert!(!m.enqueue_move(
            1,
            MoveOrder { from: base, to: Coord::new(base.x + 2, base.y) }
        ));
        // Out of bounds.
        assert!(!m.enqueue_move(
            1,
            MoveOrder { from: base, to: Coord::new(base.x, 9999) }
        ));
        // Too weak.
        m.board.tile_mut(base).unwrap().soldiers = 1;
        assert!(!m.enqueue_move(1, MoveOrder { from: base, to: target }));

        m.board.tile_mut(base).unwrap().soldiers = 10;
        m.board.tile_mut(target).unwrap().terrain = TerrainKind::Plain;
        assert!(m.enqueue_move(1, MoveOrder { from: base, to: target }));
        assert_eq!(m.pending[&1].len(), 1);
        assert_eq!(m.arrows_for(1).len(), 1);
    }

    #[test]
    fn spectators_cannot_enqueue() {
        let mut m = two_player_match(7);
        let base = m.player(1).and_then(|p| p.base).unwrap();
        assert!(m.set_voluntary_spectator(1));
        assert!(!m.enqueue_move(
            1,
            MoveOrder { from: base, to: Coord::new(base.x + 1, base.y) }
        ));
    }

    #[test]
    fn spectator_toggle_releases_and_reclaims_base() {
        let mut m = two_player_match(21);
        let base = m.player(1).and_then(|p| p.base).unwrap();

        assert!(m.set_voluntary_spectator(1));
        let tile = m.board().tile(base).unwrap();
        assert_eq!(tile.terrain, TerrainKind::Plain);
        assert_eq!(tile.owner, None);
        assert_eq!(tile.soldiers, 0);
        let p = m.player(1).unwrap();
        assert!(p.spectator && p.voluntary_spectator && p.ready);
        assert_eq!(p.base, None);

        assert!(m.cancel_voluntary_spectator(1));
        let p = m.player(1).unwrap();
        assert!(!p.spectator && !p.voluntary_spectator && !p.ready);
        let reclaimed = p.base.unwrap();
        let tile = m.board().tile(reclaimed).unwrap();
        assert_eq!(tile.terrain, TerrainKind::Base);
        assert_eq!(tile.owner, Some(1));
        assert_eq!(tile.soldiers, 10);
    }

    #[test]
    fn spectator_toggles_reject_after_start() {
        let mut m = two_player_match(3);
        m.start();
        assert!(!m.set_voluntary_spectator(1));
        assert!(!m.cancel_voluntary_spectator(1));
    }

    #[test]
    fn prestart_enqueue_executes_on_first_tick() {
        let mut m = two_player_match(13);
        let base = m.player(1).and_then(|p| p.base).unwrap();
        let target = Coord::new(base.x + 1, base.y);
        // Clear whatever the generator put next door so the capture is sure.
        let tile = m.board.tile_mut(target).unwrap();
        tile.terrain = TerrainKind::Plain;
        tile.owner = None;
        tile.soldiers = 0;
        assert!(m.enqueue_move(1, MoveOrder { from: base, to: target }));

        m.start();
        let mut events = Vec::new();
        m.advance(&mut events);
        assert_eq!(m.board.tile(base).unwrap().soldiers, 1 + 1); // 1 left + base production
        assert_eq!(m.board.tile(target).unwrap().owner, Some(1));
    }

    #[test]
    fn remove_player_neutralizes_but_keeps_garrisons() {
        let mut m = two_player_match(5);
        let base = m.player(2).and_then(|p| p.base).unwrap();
        assert!(m.remove_player(2));
        let tile = m.board().tile(base).unwrap();
        assert_eq!(tile.owner, None);
        assert_eq!(tile.terrain, TerrainKind::Plain);
        assert_eq!(tile.soldiers, 10);
        assert!(m.player(2).is_none());
        assert!(m.arrows_for(2).is_empty());
    }

    #[test]
    fn advance_is_a_noop_until_started() {
        let mut m = two_player_match(1);
        let mut events = Vec::new();
        m.advance(&mut events);
        assert_eq!(m.tick(), 0);
        m.start();
        m.advance(&mut events);
        assert_eq!(m.tick(), 1);
    }
}
