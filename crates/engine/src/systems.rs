use crate::combat;
use crate::events::{MatchEvent, OverReason};
use crate::game::Match;
use crate::terrain::TerrainKind;
use crate::types::PlayerId;
use std::collections::HashMap;

/// Pop and execute at most one queued move per player, walking players in
/// ascending id order so every tick resolves the same way everywhere.
pub(crate) fn execute_pending_moves(state: &mut Match, events: &mut Vec<MatchEvent>) {
    let ids: Vec<PlayerId> = state.pending.keys().copied().collect();
    for id in ids {
        let queued = state.pending.get_mut(&id).and_then(|q| q.pop_front());
        if let Some(mv) = queued {
            combat::apply_move(state, id, mv, events);
        }
    }
}

/// Per-tick production on owned tiles. Neutral garrisons never grow.
pub(crate) fn produce_soldiers(state: &mut Match) {
    let interval = state.config.plain_growth_interval;
    let tick = state.tick;
    for tile in state.board.tiles_mut() {
        if tile.owner.is_none() {
            continue;
        }
        match tile.terrain {
            TerrainKind::Base | TerrainKind::Tower => tile.soldiers += 1,
            TerrainKind::Plain => {
                if interval > 0 && tick % interval == 0 {
                    tile.soldiers += 1;
                }
            }
            TerrainKind::Swamp => tile.soldiers = tile.soldiers.saturating_sub(1),
            TerrainKind::Wall | TerrainKind::Mountain => {}
        }
    }
}

/// Rebuild every player's visibility mask from scratch: the union of
/// diamonds around their owned tiles. Recomputing whole masks means lost
/// territory goes dark again without any bookkeeping.
pub(crate) fn refresh_fog(state: &mut Match) {
    let w = state.board.width() as i32;
    let h = state.board.height() as i32;
    let range = state.config.vision_range as i32;
    let mut masks: HashMap<PlayerId, Vec<bool>> = state
        .players
        .keys()
        .map(|&id| (id, vec![false; (w * h) as usize]))
        .collect();

    for (idx, tile) in state.board.tiles().iter().enumerate() {
        let Some(owner) = tile.owner else { continue };
        let Some(mask) = masks.get_mut(&owner) else { continue };
        let center = state.board.coord_of(idx);
        for dy in -range..=range {
            let rest = range - dy.abs();
            for dx in -rest..=rest {
                let nx = center.x as i32 + dx;
                let ny = center.y as i32 + dy;
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                mask[(ny * w + nx) as usize] = true;
            }
        }
    }
    state.visibility = masks;
}

/// The match ends normally once at most one participant is left standing.
/// Zero participants is a draw with no winner.
pub(crate) fn check_winner(state: &mut Match, events: &mut Vec<MatchEvent>) {
    if state.over {
        return;
    }
    let mut standing = state.players.values().filter(|p| p.is_participant());
    let winner = standing.next().map(|p| p.id);
    if standing.next().is_some() {
        return;
    }
    state.over = true;
    state.winner = winner;
    state.over_reason = Some(OverReason::Normal);
    events.push(MatchEvent::MatchOver {
        winner,
        reason: OverReason::Normal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::game::MoveOrder;
    use crate::types::Coord;

    fn at(x: u16, y: u16) -> Coord {
        Coord::new(x, y)
    }

    fn open_match() -> Match {
        let mut m = Match::new(MatchConfig::open_field(10, 10), 4);
        m.join(1, "ada", "#FF0000");
        m.join(2, "bob", "#0000FF");
        m
    }

    fn set_tile(
        m: &mut Match,
        c: Coord,
        terrain: TerrainKind,
        owner: Option<PlayerId>,
        soldiers: u32,
    ) {
        let tile = m.board.tile_mut(c).unwrap();
        tile.terrain = terrain;
        tile.owner = owner;
        tile.soldiers = soldiers;
    }

    #[test]
    fn production_follows_the_terrain_table() {
        let mut m = open_match();
        set_tile(&mut m, at(0, 0), TerrainKind::Tower, Some(1), 5);
        set_tile(&mut m, at(0, 1), TerrainKind::Plain, Some(1), 2);
        set_tile(&mut m, at(0, 2), TerrainKind::Swamp, Some(1), 1);
        set_tile(&mut m, at(0, 3), TerrainKind::Plain, None, 4);
        set_tile(&mut m, at(0, 4), TerrainKind::Tower, None, 9);

        m.tick = 1;
        produce_soldiers(&mut m);
        assert_eq!(m.board.tile(at(0, 0)).unwrap().soldiers, 6);
        assert_eq!(m.board.tile(at(0, 1)).unwrap().soldiers, 2); // off-interval
        assert_eq!(m.board.tile(at(0, 2)).unwrap().soldiers, 0);
        assert_eq!(m.board.tile(at(0, 3)).unwrap().soldiers, 4); // neutral
        assert_eq!(m.board.tile(at(0, 4)).unwrap().soldiers, 9); // neutral

        // Swamps bottom out at zero.
        produce_soldiers(&mut m);
        assert_eq!(m.board.tile(at(0, 2)).unwrap().soldiers, 0);

        m.tick = 15;
        produce_soldiers(&mut m);
        assert_eq!(m.board.tile(at(0, 1)).unwrap().soldiers, 3); // growth tick
        assert_eq!(m.board.tile(at(0, 3)).unwrap().soldiers, 4);
    }

    #[test]
    fn one_move_per_player_per_tick_in_queue_order() {
        let mut m = open_match();
        let bases: Vec<Coord> = m.players().filter_map(|p| p.base).collect();
        for b in bases {
            set_tile(&mut m, b, TerrainKind::Plain, None, 0);
        }
        set_tile(&mut m, at(5, 5), TerrainKind::Plain, Some(1), 10);
        set_tile(&mut m, at(6, 5), TerrainKind::Plain, None, 0);
        set_tile(&mut m, at(7, 5), TerrainKind::Plain, None, 0);
        assert!(m.enqueue_move(1, MoveOrder { from: at(5, 5), to: at(6, 5) }));
        assert!(m.enqueue_move(1, MoveOrder { from: at(5, 5), to: at(4, 5) }));

        m.start();
        let mut events = Vec::new();
        m.advance(&mut events);
        // Only the first intent ran this tick.
        assert_eq!(m.board.tile(at(6, 5)).unwrap().owner, Some(1));
        assert_eq!(m.board.tile(at(4, 5)).unwrap().owner, None);
        assert_eq!(m.pending[&1].len(), 1);

        // The second intent is stale now (source down to one soldier) and
        // drops without effect.
        m.advance(&mut events);
        assert_eq!(m.board.tile(at(4, 5)).unwrap().owner, None);
        assert!(m.pending[&1].is_empty());
    }

    #[test]
    fn fog_is_a_manhattan_diamond_and_forgets_lost_ground() {
        let mut m = open_match();
        // Strip the joined bases so ownership is exactly one tile.
        let bases: Vec<Coord> = m.players().filter_map(|p| p.base).collect();
        for b in bases {
            set_tile(&mut m, b, TerrainKind::Plain, None, 0);
        }
        set_tile(&mut m, at(5, 5), TerrainKind::Plain, Some(1), 3);
        m.start();

        assert!(m.is_visible(1, at(5, 5)));
        assert!(m.is_visible(1, at(7, 5)));
        assert!(m.is_visible(1, at(6, 6)));
        assert!(!m.is_visible(1, at(8, 5)));
        assert!(!m.is_visible(1, at(7, 7)));
        assert!(!m.is_visible(2, at(5, 5)));

        // Ownership moves; the old diamond goes dark.
        set_tile(&mut m, at(5, 5), TerrainKind::Plain, None, 0);
        set_tile(&mut m, at(0, 0), TerrainKind::Plain, Some(1), 3);
        refresh_fog(&mut m);
        assert!(!m.is_visible(1, at(5, 5)));
        assert!(m.is_visible(1, at(1, 1)));
    }

    #[test]
    fn everything_is_visible_before_start() {
        let m = open_match();
        assert!(m.is_visible(1, at(9, 9)));
        assert!(m.is_visible(2, at(0, 0)));
    }

    #[test]
    fn zero_participants_ends_in_a_draw() {
        let mut m = open_match();
        m.start();
        for id in [1, 2] {
            if let Some(p) = m.players.get_mut(&id) {
                p.eliminate();
            }
        }
        let mut events = Vec::new();
        check_winner(&mut m, &mut events);
        assert!(m.over());
        assert_eq!(m.winner(), None);
        assert_eq!(m.over_reason(), Some(OverReason::Normal));
    }

    #[test]
    fn spectators_do_not_keep_a_match_alive() {
        let mut m = open_match();
        m.join_as_spectator(3, "eve", "#00FF00");
        assert!(m.set_voluntary_spectator(2));
        m.start();
        let mut events = Vec::new();
        check_winner(&mut m, &mut events);
        assert!(m.over());
        assert_eq!(m.winner(), Some(1));
    }
}
