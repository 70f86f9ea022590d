use rand::Rng;
use serde::{Deserialize, Serialize};

/// Garrison assigned to a mountain tile. Mountains are impassable, so the
/// value is never reachable in combat arithmetic.
const MOUNTAIN_GARRISON: u32 = u32::MAX;

/// The closed set of terrain kinds a tile can have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainKind {
    Plain,
    Base,
    Tower,
    Wall,
    Mountain,
    Swamp,
}

impl TerrainKind {
    /// Whether soldiers may move onto a tile of this kind.
    pub fn passable(self) -> bool {
        !matches!(self, TerrainKind::Mountain)
    }

    /// Whether a player can take ownership of a tile of this kind.
    pub fn capturable(self) -> bool {
        !matches!(self, TerrainKind::Mountain)
    }

    /// Garrison a freshly generated neutral tile of this kind defends with.
    /// Towers roll a fresh value per tile; everything else is fixed.
    pub fn roll_garrison<R: Rng>(self, rng: &mut R) -> u32 {
        match self {
            TerrainKind::Plain | TerrainKind::Swamp => 0,
            TerrainKind::Wall => 3,
            TerrainKind::Base => 10,
            TerrainKind::Tower => rng.gen_range(5..=20),
            TerrainKind::Mountain => MOUNTAIN_GARRISON,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn only_mountains_block() {
        for kind in [
            TerrainKind::Plain,
            TerrainKind::Base,
            TerrainKind::Tower,
            TerrainKind::Wall,
            TerrainKind::Swamp,
        ] {
            assert!(kind.passable());
            assert!(kind.capturable());
        }
        assert!(!TerrainKind::Mountain.passable());
        assert!(!TerrainKind::Mountain.capturable());
    }

    #[test]
    fn tower_garrison_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let g = TerrainKind::Tower.roll_garrison(&mut rng);
            assert!((5..=20).contains(&g), "tower garrison {g} out of range");
        }
    }

    #[test]
    fn fixed_garrisons() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(TerrainKind::Plain.roll_garrison(&mut rng), 0);
        assert_eq!(TerrainKind::Swamp.roll_garrison(&mut rng), 0);
        assert_eq!(TerrainKind::Wall.roll_garrison(&mut rng), 3);
        assert_eq!(TerrainKind::Base.roll_garrison(&mut rng), 10);
    }
}
