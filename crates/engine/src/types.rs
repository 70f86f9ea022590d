use serde::{Deserialize, Serialize};

/// Identifies a player across the whole server.
pub type PlayerId = u32;

/// Simulation tick counter, starts at 0 and advances once per update.
pub type Tick = u64;

/// A board coordinate, row-major with (0, 0) in the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: u16,
    pub y: u16,
}

impl Coord {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two coordinates.
    pub fn manhattan(self, other: Coord) -> u32 {
        let dx = (self.x as i32 - other.x as i32).unsigned_abs();
        let dy = (self.y as i32 - other.y as i32).unsigned_abs();
        dx + dy
    }

    /// The four orthogonal neighbors, unchecked against any bounds.
    pub fn orthogonal(self) -> impl Iterator<Item = (i32, i32)> {
        let (x, y) = (self.x as i32, self.y as i32);
        [(x, y - 1), (x, y + 1), (x - 1, y), (x + 1, y)].into_iter()
    }
}
