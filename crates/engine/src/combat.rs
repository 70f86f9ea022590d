use crate::events::MatchEvent;
use crate::game::{Match, QueuedMove};
use crate::systems;
use crate::terrain::TerrainKind;
use crate::types::{Coord, PlayerId};

/// Execute one queued move. Everything the enqueue check looked at is
/// re-validated here, because ticks may have passed since; a move that no
/// longer holds is dropped silently. Returns whether it executed.
pub(crate) fn apply_move(
    state: &mut Match,
    player: PlayerId,
    mv: QueuedMove,
    events: &mut Vec<MatchEvent>,
) -> bool {
    if !state.is_legal_move(player, mv.from, mv.to) {
        clear_arrow(state, player, mv);
        return false;
    }

    let from_soldiers = state.board.tile(mv.from).map(|t| t.soldiers).unwrap_or(0);
    let movable = from_soldiers.saturating_sub(1);
    let Some((to_terrain, to_owner, to_soldiers)) = state
        .board
        .tile(mv.to)
        .map(|t| (t.terrain, t.owner, t.soldiers))
    else {
        clear_arrow(state, player, mv);
        return false;
    };

    // The stack commits: one soldier always stays behind.
    if let Some(tile) = state.board.tile_mut(mv.from) {
        tile.soldiers = 1;
    }

    if to_owner == Some(player) {
        if let Some(tile) = state.board.tile_mut(mv.to) {
            tile.soldiers += movable;
        }
    } else if movable > to_soldiers {
        if let Some(tile) = state.board.tile_mut(mv.to) {
            tile.owner = Some(player);
            tile.soldiers = movable - to_soldiers;
            if tile.terrain == TerrainKind::Wall {
                // A breached wall flattens for the rest of the match.
                tile.terrain = TerrainKind::Plain;
            }
        }
        if to_terrain == TerrainKind::Base && to_owner.is_some_and(|o| o != player) {
            if let Some(victim) = base_holder(state, mv.to, player) {
                transfer_assets(state, victim, player, events);
            }
        }
    } else if movable == to_soldiers {
        // Mutual annihilation leaves the tile neutral and empty.
        if let Some(tile) = state.board.tile_mut(mv.to) {
            tile.owner = None;
            tile.soldiers = 0;
        }
    } else {
        // Repelled; the defender's losses persist for the next wave.
        if let Some(tile) = state.board.tile_mut(mv.to) {
            tile.soldiers = to_soldiers - movable;
        }
    }

    clear_arrow(state, player, mv);
    events.push(MatchEvent::MoveExecuted {
        player,
        from: mv.from,
        to: mv.to,
    });
    true
}

fn clear_arrow(state: &mut Match, player: PlayerId, mv: QueuedMove) {
    if let Some(arrows) = state.arrows.get_mut(&player) {
        arrows.retain(|a| *a != mv);
    }
}

fn base_holder(state: &Match, at: Coord, attacker: PlayerId) -> Option<PlayerId> {
    state
        .players
        .values()
        .find(|p| p.base == Some(at) && p.id != attacker)
        .map(|p| p.id)
}

/// A base fell: everything the victim held flips to the conqueror, whose
/// seat of power relocates onto the captured base. The old base tile stays
/// owned but demotes to plain so only one base per player ever exists.
pub(crate) fn transfer_assets(
    state: &mut Match,
    eliminated: PlayerId,
    conqueror: PlayerId,
    events: &mut Vec<MatchEvent>,
) {
    for tile in state.board.tiles_mut() {
        if tile.owner == Some(eliminated) {
            tile.owner = Some(conqueror);
        }
    }

    let captured_base = state.players.get(&eliminated).and_then(|p| p.base);
    let old_base = state.players.get(&conqueror).and_then(|p| p.base);
    if let Some(at) = old_base {
        if let Some(tile) = state.board.tile_mut(at) {
            tile.terrain = TerrainKind::Plain;
        }
    }
    if let Some(p) = state.players.get_mut(&conqueror) {
        p.base = captured_base;
    }
    if let Some(p) = state.players.get_mut(&eliminated) {
        p.eliminate();
        p.base = None;
    }
    if let Some(q) = state.pending.get_mut(&eliminated) {
        q.clear();
    }
    if let Some(a) = state.arrows.get_mut(&eliminated) {
        a.clear();
    }

    events.push(MatchEvent::PlayerEliminated {
        player: eliminated,
        by: conqueror,
    });
    // A conquest can settle the match mid-tick.
    systems::check_winner(state, events);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::events::OverReason;
    use crate::game::MoveOrder;

    fn at(x: u16, y: u16) -> Coord {
        Coord::new(x, y)
    }

    fn scripted_match() -> Match {
        let mut m = Match::new(MatchConfig::open_field(8, 8), 99);
        m.join(1, "ada", "#FF0000");
        m.join(2, "bob", "#0000FF");
        m
    }

    fn set_tile(m: &mut Match, c: Coord, terrain: TerrainKind, owner: Option<PlayerId>, soldiers: u32) {
        let tile = m.board.tile_mut(c).unwrap();
        tile.terrain = terrain;
        tile.owner = owner;
        tile.soldiers = soldiers;
    }

    fn mv(from: Coord, to: Coord) -> QueuedMove {
        QueuedMove { from, to, queued_tick: 0 }
    }

    #[test]
    fn friendly_move_merges_stacks() {
        let mut m = scripted_match();
        set_tile(&mut m, at(2, 2), TerrainKind::Plain, Some(1), 7);
        set_tile(&mut m, at(3, 2), TerrainKind::Plain, Some(1), 4);
        let mut events = Vec::new();
        assert!(apply_move(&mut m, 1, mv(at(2, 2), at(3, 2)), &mut events));
        assert_eq!(m.board.tile(at(2, 2)).unwrap().soldiers, 1);
        assert_eq!(m.board.tile(at(3, 2)).unwrap().soldiers, 10);
    }

    #[test]
    fn surplus_attack_captures() {
        let mut m = scripted_match();
        set_tile(&mut m, at(2, 2), TerrainKind::Plain, Some(1), 8);
        set_tile(&mut m, at(2, 3), TerrainKind::Plain, Some(2), 3);
        let mut events = Vec::new();
        assert!(apply_move(&mut m, 1, mv(at(2, 2), at(2, 3)), &mut events));
        let target = m.board.tile(at(2, 3)).unwrap();
        assert_eq!(target.owner, Some(1));
        assert_eq!(target.soldiers, 4); // 7 attackers less 3 defenders
    }

    #[test]
    fn equal_forces_annihilate() {
        let mut m = scripted_match();
        set_tile(&mut m, at(4, 4), TerrainKind::Plain, Some(1), 6);
        set_tile(&mut m, at(4, 5), TerrainKind::Plain, Some(2), 5);
        let mut events = Vec::new();
        assert!(apply_move(&mut m, 1, mv(at(4, 4), at(4, 5)), &mut events));
        let target = m.board.tile(at(4, 5)).unwrap();
        assert_eq!(target.owner, None);
        assert_eq!(target.soldiers, 0);
        assert_eq!(target.terrain, TerrainKind::Plain);
    }

    #[test]
    fn repelled_attack_whittles_the_garrison() {
        let mut m = scripted_match();
        set_tile(&mut m, at(1, 1), TerrainKind::Plain, Some(1), 4);
        set_tile(&mut m, at(1, 2), TerrainKind::Tower, None, 12);
        let mut events = Vec::new();
        assert!(apply_move(&mut m, 1, mv(at(1, 1), at(1, 2)), &mut events));
        let tower = m.board.tile(at(1, 2)).unwrap();
        assert_eq!(tower.owner, None);
        assert_eq!(tower.soldiers, 9); // siege damage sticks
        assert_eq!(m.board.tile(at(1, 1)).unwrap().soldiers, 1);

        // Second wave finishes against the weakened garrison.
        set_tile(&mut m, at(1, 1), TerrainKind::Plain, Some(1), 11);
        assert!(apply_move(&mut m, 1, mv(at(1, 1), at(1, 2)), &mut events));
        let tower = m.board.tile(at(1, 2)).unwrap();
        assert_eq!(tower.owner, Some(1));
        assert_eq!(tower.soldiers, 1);
        assert_eq!(tower.terrain, TerrainKind::Tower);
    }

    #[test]
    fn wall_flattens_only_on_capture() {
        let mut m = scripted_match();
        set_tile(&mut m, at(5, 5), TerrainKind::Plain, Some(1), 4);
        set_tile(&mut m, at(5, 6), TerrainKind::Wall, None, 3);
        let mut events = Vec::new();

        // Annihilation: wall stands.
        assert!(apply_move(&mut m, 1, mv(at(5, 5), at(5, 6)), &mut events));
        assert_eq!(m.board.tile(at(5, 6)).unwrap().terrain, TerrainKind::Wall);
        assert_eq!(m.board.tile(at(5, 6)).unwrap().soldiers, 0);

        // Capture: wall becomes plain.
        set_tile(&mut m, at(5, 5), TerrainKind::Plain, Some(1), 5);
        assert!(apply_move(&mut m, 1, mv(at(5, 5), at(5, 6)), &mut events));
        let tile = m.board.tile(at(5, 6)).unwrap();
        assert_eq!(tile.terrain, TerrainKind::Plain);
        assert_eq!(tile.owner, Some(1));
        assert_eq!(tile.soldiers, 4);
    }

    #[test]
    fn stale_moves_drop_without_touching_the_board() {
        let mut m = scripted_match();
        set_tile(&mut m, at(3, 3), TerrainKind::Plain, Some(2), 9);
        set_tile(&mut m, at(3, 4), TerrainKind::Plain, None, 0);
        let mut events = Vec::new();
        // Tile no longer belongs to player 1.
        assert!(!apply_move(&mut m, 1, mv(at(3, 3), at(3, 4)), &mut events));
        assert_eq!(m.board.tile(at(3, 3)).unwrap().soldiers, 9);
        assert!(events.is_empty());
    }

    #[test]
    fn moves_into_mountains_never_execute() {
        let mut m = scripted_match();
        set_tile(&mut m, at(6, 6), TerrainKind::Plain, Some(1), 10);
        set_tile(&mut m, at(6, 7), TerrainKind::Mountain, None, u32::MAX);
        assert!(!m.enqueue_move(1, MoveOrder { from: at(6, 6), to: at(6, 7) }));
        let mut events = Vec::new();
        assert!(!apply_move(&mut m, 1, mv(at(6, 6), at(6, 7)), &mut events));
        assert_eq!(m.board.tile(at(6, 6)).unwrap().soldiers, 10);
    }

    #[test]
    fn base_conquest_transfers_everything() {
        let mut m = scripted_match();
        let attacker_base = m.player(1).and_then(|p| p.base).unwrap();
        let victim_base = m.player(2).and_then(|p| p.base).unwrap();

        // Give the victim some territory and park a large stack next to
        // their base.
        set_tile(&mut m, at(0, 0), TerrainKind::Plain, Some(2), 5);
        let staging = at(victim_base.x, victim_base.y.wrapping_sub(1));
        let staging = if m.board.in_bounds(staging) && staging != attacker_base {
            staging
        } else {
            at(victim_base.x + 1, victim_base.y)
        };
        set_tile(&mut m, staging, TerrainKind::Plain, Some(1), 40);
        m.start();

        let mut events = Vec::new();
        assert!(apply_move(&mut m, 1, mv(staging, victim_base), &mut events));

        // All of the victim's tiles flipped, including the outpost.
        assert_eq!(m.board.tile(at(0, 0)).unwrap().owner, Some(1));
        for tile in m.board.tiles() {
            assert_ne!(tile.owner, Some(2));
        }
        // The conqueror's seat moved; the old base flattened.
        assert_eq!(m.player(1).and_then(|p| p.base), Some(victim_base));
        assert_eq!(
            m.board.tile(attacker_base).unwrap().terrain,
            TerrainKind::Plain
        );
        assert_eq!(m.board.tile(attacker_base).unwrap().owner, Some(1));
        // The victim is out for good.
        let victim = m.player(2).unwrap();
        assert!(!victim.alive && victim.spectator);
        assert_eq!(victim.base, None);
        // And with one participant left, the match is over.
        assert!(m.over());
        assert_eq!(m.winner(), Some(1));
        assert_eq!(m.over_reason(), Some(OverReason::Normal));
        assert!(events
            .iter()
            .any(|e| matches!(e, MatchEvent::PlayerEliminated { player: 2, by: 1 })));
        assert!(events
            .iter()
            .any(|e| matches!(e, MatchEvent::MatchOver { winner: Some(1), .. })));
    }
}
