use crate::config::MatchConfig;
use crate::terrain::TerrainKind;
use crate::types::{Coord, PlayerId};
use rand::seq::SliceRandom;
use rand::Rng;

/// Spawn candidates must sit at least this far from every board edge.
const SPAWN_EDGE_MARGIN: u16 = 2;
/// Hard floor the spawn spacing threshold relaxes down to.
const MIN_SPAWN_DISTANCE: u32 = 2;

/// One cell of the board. `soldiers` on an unowned tile is the remaining
/// defensive garrison, not the original requirement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    pub terrain: TerrainKind,
    pub owner: Option<PlayerId>,
    pub soldiers: u32,
}

impl Tile {
    fn plain() -> Self {
        Self {
            terrain: TerrainKind::Plain,
            owner: None,
            soldiers: 0,
        }
    }
}

/// Row-major tile grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    width: u16,
    height: u16,
    tiles: Vec<Tile>,
}

impl Board {
    /// Generate a fresh board: all plain, then towers, walls, mountains and
    /// swamps scattered by rejection sampling. Deterministic for a given
    /// config and RNG state.
    pub fn generate<R: Rng>(config: &MatchConfig, rng: &mut R) -> Self {
        let mut board = Self {
            width: config.width,
            height: config.height,
            tiles: vec![Tile::plain(); config.width as usize * config.height as usize],
        };

        board.scatter(TerrainKind::Tower, config.tower_count, 2, config.placement_attempts, rng);
        board.scatter(TerrainKind::Wall, config.wall_count, 1, config.placement_attempts, rng);
        board.scatter(
            TerrainKind::Mountain,
            config.mountain_count,
            1,
            config.placement_attempts,
            rng,
        );
        board.scatter(TerrainKind::Swamp, config.swamp_count, 1, config.placement_attempts, rng);

        board
    }

    /// Drop `count` tiles of `kind` onto random plain tiles at least `margin`
    /// from the edges. Gives up after `attempts` rolls, so dense configs may
    /// end up with fewer features than asked for.
    fn scatter<R: Rng>(
        &mut self,
        kind: TerrainKind,
        count: usize,
        margin: u16,
        attempts: u32,
        rng: &mut R,
    ) {
        if count == 0 || self.width <= margin * 2 || self.height <= margin * 2 {
            return;
        }
        let mut placed = 0;
        let mut tries = 0;
        while placed < count && tries < attempts {
            tries += 1;
            let x = rng.gen_range(margin..self.width - margin);
            let y = rng.gen_range(margin..self.height - margin);
            let idx = self.idx(Coord::new(x, y));
            if self.tiles[idx].terrain != TerrainKind::Plain {
                continue;
            }
            self.tiles[idx].terrain = kind;
            self.tiles[idx].soldiers = match kind {
                TerrainKind::Tower | TerrainKind::Wall => kind.roll_garrison(rng),
                _ => 0,
            };
            placed += 1;
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, c: Coord) -> bool {
        c.x < self.width && c.y < self.height
    }

    #[inline]
    pub(crate) fn idx(&self, c: Coord) -> usize {
        (c.y as usize) * (self.width as usize) + (c.x as usize)
    }

    #[inline]
    pub(crate) fn coord_of(&self, idx: usize) -> Coord {
        Coord::new((idx % self.width as usize) as u16, (idx / self.width as usize) as u16)
    }

    pub fn tile(&self, c: Coord) -> Option<&Tile> {
        if self.in_bounds(c) {
            Some(&self.tiles[self.idx(c)])
        } else {
            None
        }
    }

    pub(crate) fn tile_mut(&mut self, c: Coord) -> Option<&mut Tile> {
        if self.in_bounds(c) {
            let idx = self.idx(c);
            Some(&mut self.tiles[idx])
        } else {
            None
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub(crate) fn tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }

    /// Total soldiers and tile count owned by each player in one scan.
    pub fn tally(&self, player: PlayerId) -> (u32, u32) {
        let mut soldiers = 0;
        let mut tiles = 0;
        for tile in &self.tiles {
            if tile.owner == Some(player) {
                soldiers += tile.soldiers;
                tiles += 1;
            }
        }
        (soldiers, tiles)
    }
}

/// Default spacing threshold between spawn points: the board diagonal spread
/// over the player count, never below 3.
pub fn default_spawn_distance(board: &Board, players: usize) -> u32 {
    let w = board.width() as f64;
    let h = board.height() as f64;
    let diagonal = (w * w + h * h).sqrt();
    let spread = diagonal / (2.0 * (players.max(1) as f64).sqrt());
    (spread as u32).max(3)
}

/// Pick `players` spawn points on `board`, maximally spread out.
///
/// Candidates are plain tiles at least two from every edge that pass a
/// safety check; points are then chosen greedily farthest-first, accepting a
/// candidate only when its distance to the chosen set meets the threshold
/// and relaxing the threshold by one (floor 2) when nothing qualifies.
/// Always returns exactly `players` coordinates; the returned order is
/// shuffled so join order carries no positional bias.
pub fn place_spawn_points<R: Rng>(
    board: &Board,
    players: usize,
    min_distance: Option<u32>,
    rng: &mut R,
) -> Vec<Coord> {
    if players == 0 {
        return Vec::new();
    }

    let mut threshold = min_distance.unwrap_or_else(|| default_spawn_distance(board, players));
    let mut candidates = spawn_candidates(board);

    if candidates.is_empty() {
        tracing::warn!(players, "no safe spawn candidates, falling back to random tiles");
        return (0..players)
            .map(|_| {
                Coord::new(
                    rng.gen_range(0..board.width()),
                    rng.gen_range(0..board.height()),
                )
            })
            .collect();
    }

    let mut chosen: Vec<Coord> = Vec::with_capacity(players);
    let first = candidates.swap_remove(rng.gen_range(0..candidates.len()));
    chosen.push(first);

    while chosen.len() < players && !candidates.is_empty() {
        let mut best_idx = 0;
        let mut best_gap = 0u32;
        for (i, &c) in candidates.iter().enumerate() {
            let gap = chosen
                .iter()
                .map(|&p| c.manhattan(p))
                .min()
                .unwrap_or(u32::MAX);
            if gap > best_gap {
                best_gap = gap;
                best_idx = i;
            }
        }

        if best_gap >= threshold {
            chosen.push(candidates.swap_remove(best_idx));
        } else if threshold > MIN_SPAWN_DISTANCE {
            threshold -= 1;
        } else {
            // Floor reached: take the least cramped candidate anyway.
            chosen.push(candidates.swap_remove(best_idx));
        }
    }

    // Candidates ran dry on a degenerate board; pad with random tiles so
    // callers can rely on getting one point per player.
    while chosen.len() < players {
        chosen.push(Coord::new(
            rng.gen_range(0..board.width()),
            rng.gen_range(0..board.height()),
        ));
    }

    chosen.shuffle(rng);
    chosen
}

fn spawn_candidates(board: &Board) -> Vec<Coord> {
    let mut out = Vec::new();
    if board.width() <= SPAWN_EDGE_MARGIN * 2 || board.height() <= SPAWN_EDGE_MARGIN * 2 {
        return out;
    }
    for y in SPAWN_EDGE_MARGIN..board.height() - SPAWN_EDGE_MARGIN {
        for x in SPAWN_EDGE_MARGIN..board.width() - SPAWN_EDGE_MARGIN {
            let c = Coord::new(x, y);
            if is_safe_spawn(board, c) {
                out.push(c);
            }
        }
    }
    out
}

/// A candidate is safe when it is plain, mountains make up at most half of
/// its in-bounds radius-2 neighborhood, and at least two of its orthogonal
/// neighbors are passable.
fn is_safe_spawn(board: &Board, c: Coord) -> bool {
    match board.tile(c) {
        Some(tile) if tile.terrain == TerrainKind::Plain => {}
        _ => return false,
    }

    let mut neighbors = 0u32;
    let mut mountains = 0u32;
    for dy in -2i32..=2 {
        for dx in -2i32..=2 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = c.x as i32 + dx;
            let ny = c.y as i32 + dy;
            if nx < 0 || ny < 0 {
                continue;
            }
            let n = Coord::new(nx as u16, ny as u16);
            if let Some(tile) = board.tile(n) {
                neighbors += 1;
                if tile.terrain == TerrainKind::Mountain {
                    mountains += 1;
                }
            }
        }
    }
    if mountains * 2 > neighbors {
        return false;
    }

    let mut passable = 0;
    for (nx, ny) in c.orthogonal() {
        if nx < 0 || ny < 0 {
            continue;
        }
        let n = Coord::new(nx as u16, ny as u16);
        if board.tile(n).is_some_and(|t| t.terrain.passable()) {
            passable += 1;
        }
    }
    passable >= 2
}
