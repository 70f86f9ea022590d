use crate::types::Tick;

/// Simulation parameters for one match. Everything randomized downstream is
/// driven by the seed handed to [`crate::Match::new`], so a config plus a
/// seed fully determines the generated board.
#[derive(Clone, Debug)]
pub struct MatchConfig {
    pub width: u16,
    pub height: u16,

    // Terrain feature counts, placed by rejection sampling.
    pub tower_count: usize,
    pub wall_count: usize,
    pub mountain_count: usize,
    pub swamp_count: usize,
    /// Placement attempts per terrain kind before giving up on the
    /// remaining features.
    pub placement_attempts: u32,

    /// Manhattan radius of each player's vision around owned tiles.
    pub vision_range: u32,
    /// Owned plains grow one soldier whenever `tick % interval == 0`.
    pub plain_growth_interval: Tick,

    /// Spawn spacing when a join regenerates the spawn list mid-lobby.
    pub join_spawn_distance: u32,
    /// Spawn spacing when a rematch re-seeds the room in place.
    pub rematch_spawn_distance: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,

            tower_count: 8,
            wall_count: 10,
            mountain_count: 12,
            swamp_count: 6,
            placement_attempts: 100,

            vision_range: 2,
            plain_growth_interval: 15,

            join_spawn_distance: 10,
            rematch_spawn_distance: 6,
        }
    }
}

impl MatchConfig {
    /// A small all-plain board, handy for scripted tests and demos.
    pub fn open_field(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            tower_count: 0,
            wall_count: 0,
            mountain_count: 0,
            swamp_count: 0,
            ..Self::default()
        }
    }
}
