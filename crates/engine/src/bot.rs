use crate::game::MoveOrder;
use crate::observe::MatchView;
use crate::types::{Coord, PlayerId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Decision source for a machine-driven seat. `observe` gets the same
/// fog-filtered view a remote client would; `decide` may answer with one
/// intent, which the room routes through the ordinary move queue.
pub trait Commander: Send {
    fn observe(&mut self, view: &MatchView);
    fn decide(&mut self) -> Option<MoveOrder>;
}

/// Baseline opponent. Each tick it either lunges at a nearby enemy tile or
/// expands onto neutral ground, weighted by `aggression`.
pub struct SimpleBot {
    id: PlayerId,
    rng: StdRng,
    aggression: f64,
    view: Option<MatchView>,
}

impl SimpleBot {
    pub fn new(id: PlayerId, seed: u64) -> Self {
        Self::with_aggression(id, seed, 0.7)
    }

    pub fn with_aggression(id: PlayerId, seed: u64, aggression: f64) -> Self {
        Self {
            id,
            rng: StdRng::seed_from_u64(seed),
            aggression,
            view: None,
        }
    }
}

impl Commander for SimpleBot {
    fn observe(&mut self, view: &MatchView) {
        self.view = Some(view.clone());
    }

    fn decide(&mut self) -> Option<MoveOrder> {
        let view = self.view.as_ref()?;
        if !view.started || view.over {
            return None;
        }
        if self.rng.gen_bool(self.aggression.clamp(0.0, 1.0)) {
            attack_order(view, self.id, &mut self.rng)
        } else {
            expand_order(view, self.id, &mut self.rng)
        }
    }
}

fn tile_coord(view: &MatchView, idx: usize) -> Coord {
    Coord::new((idx % view.width as usize) as u16, (idx / view.width as usize) as u16)
}

fn owned_tiles(view: &MatchView, id: PlayerId) -> Vec<(Coord, u32)> {
    view.tiles
        .iter()
        .enumerate()
        .filter(|(_, t)| t.owner == Some(id) && t.soldiers >= 2)
        .map(|(idx, t)| (tile_coord(view, idx), t.soldiers))
        .collect()
}

/// March the strongest stack onto one of the few closest visible enemy
/// tiles, if any of them is orthogonally adjacent.
fn attack_order(view: &MatchView, id: PlayerId, rng: &mut StdRng) -> Option<MoveOrder> {
    let from = owned_tiles(view, id)
        .into_iter()
        .max_by_key(|&(_, soldiers)| soldiers)
        .map(|(c, _)| c)?;

    let mut enemies: Vec<Coord> = view
        .tiles
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.fog && t.owner.is_some_and(|o| o != id))
        .map(|(idx, _)| tile_coord(view, idx))
        .collect();
    enemies.sort_by_key(|c| from.manhattan(*c));
    enemies.truncate(3);
    enemies.shuffle(rng);

    enemies
        .into_iter()
        .find(|c| from.manhattan(*c) == 1)
        .map(|to| MoveOrder { from, to })
}

/// Spill a random stack onto its first neutral passable neighbor.
fn expand_order(view: &MatchView, id: PlayerId, rng: &mut StdRng) -> Option<MoveOrder> {
    let owned = owned_tiles(view, id);
    let (from, _) = *owned.choose(rng)?;
    from.orthogonal()
        .filter_map(|(x, y)| {
            if x < 0 || y < 0 || x >= view.width as i32 || y >= view.height as i32 {
                return None;
            }
            let to = Coord::new(x as u16, y as u16);
            let tile = &view.tiles[(y as usize) * view.width as usize + x as usize];
            (tile.owner.is_none() && tile.terrain.passable()).then_some(to)
        })
        .next()
        .map(|to| MoveOrder { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::game::Match;
    use crate::observe::render_view;
    use crate::terrain::TerrainKind;

    fn bot_match() -> Match {
        let mut m = Match::new(MatchConfig::open_field(8, 8), 31);
        m.join(1, "bot-a", "#FF0000");
        m.join(2, "bot-b", "#0000FF");
        m.start();
        m
    }

    #[test]
    fn bot_stays_quiet_before_start() {
        let mut m = Match::new(MatchConfig::open_field(8, 8), 31);
        m.join(1, "bot-a", "#FF0000");
        let mut bot = SimpleBot::new(1, 7);
        bot.observe(&render_view(&m, Some(1), None));
        assert_eq!(bot.decide(), None);
    }

    #[test]
    fn expansion_targets_neutral_passable_ground() {
        let mut m = bot_match();
        let mut bot = SimpleBot::with_aggression(1, 7, 0.0);
        bot.observe(&render_view(&m, Some(1), None));
        let order = bot.decide().unwrap();
        assert!(m.enqueue_move(1, order));
        let tile = m.board().tile(order.to).unwrap();
        assert_eq!(tile.owner, None);
        assert!(tile.terrain.passable());
    }

    #[test]
    fn full_aggression_strikes_adjacent_enemies() {
        let mut m = bot_match();
        let base = m.player(1).and_then(|p| p.base).unwrap();
        // Plant an enemy right next to the bot's only stack.
        let foe = Coord::new(base.x + 1, base.y);
        let tile = m.board.tile_mut(foe).unwrap();
        tile.terrain = TerrainKind::Plain;
        tile.owner = Some(2);
        tile.soldiers = 3;
        crate::systems::refresh_fog(&mut m);

        let mut bot = SimpleBot::with_aggression(1, 7, 1.0);
        bot.observe(&render_view(&m, Some(1), None));
        let order = bot.decide().unwrap();
        assert_eq!(order.from, base);
        assert_eq!(order.to, foe);
    }

    #[test]
    fn decisions_replay_identically_for_one_seed() {
        let m = bot_match();
        let view = render_view(&m, Some(1), None);
        let mut first = SimpleBot::new(1, 99);
        let mut second = SimpleBot::new(1, 99);
        for _ in 0..20 {
            first.observe(&view);
            second.observe(&view);
            assert_eq!(first.decide(), second.decide());
        }
    }
}
