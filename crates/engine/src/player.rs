use crate::types::{Coord, PlayerId};

/// A room member inside the simulation. Spectators stay in the player map so
/// views, leaderboards and rematches keep seeing them.
#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    /// The tile this player's elimination hinges on. `None` for spectators.
    pub base: Option<Coord>,
    pub alive: bool,
    pub spectator: bool,
    /// Set when spectating was the player's own choice rather than an
    /// elimination; survives a rematch.
    pub voluntary_spectator: bool,
    pub ready: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String, color: String) -> Self {
        Self {
            id,
            name,
            color,
            base: None,
            alive: true,
            spectator: false,
            voluntary_spectator: false,
            ready: false,
        }
    }

    /// Knocked out of the running: stays in the room as an observer.
    pub fn eliminate(&mut self) {
        self.alive = false;
        self.spectator = true;
    }

    /// Still contending for the win.
    pub fn is_participant(&self) -> bool {
        self.alive && !self.spectator
    }
}
