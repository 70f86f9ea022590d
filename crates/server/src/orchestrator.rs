use crate::errors::{CommandError, CreateRoomError, JoinError};
use crate::recorder::{MatchRecorder, NoopRecorder};
use crate::room::{ConnectionTx, RoomHandle};
use crate::tick_loop::run_room_loop;
use crate::types::{AccountId, JoinedRoom, RoomId, RoomPhase, RoomSummary, ServerConfig};
use garrison_engine::{MatchView, MoveOrder, PlayerId};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

struct RoomEntry {
    handle: RoomHandle,
    task: JoinHandle<()>,
}

/// Hands out room ids from a floor upward, reissuing freed ids lowest-first.
struct IdAllocator {
    next: RoomId,
    released: BTreeSet<RoomId>,
}

impl IdAllocator {
    fn new(first: RoomId) -> Self {
        Self {
            next: first,
            released: BTreeSet::new(),
        }
    }

    fn allocate(&mut self) -> RoomId {
        if let Some(&id) = self.released.iter().next() {
            self.released.remove(&id);
            return id;
        }
        let id = self.next;
        self.next += 1;
        id
    }

    fn release(&mut self, id: RoomId) {
        if id < self.next {
            self.released.insert(id);
        }
    }
}

struct Shared {
    config: Arc<ServerConfig>,
    rooms: RwLock<HashMap<RoomId, RoomEntry>>,
    ids: Mutex<IdAllocator>,
    recorder: Arc<dyn MatchRecorder>,
    next_player_id: AtomicU32,
}

/// Multi-room host: owns the registry, allocates ids, spawns one task per
/// room and routes commands to the right one. Rooms never see each other.
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_recorder(config, Arc::new(NoopRecorder))
    }

    pub fn with_recorder(config: ServerConfig, recorder: Arc<dyn MatchRecorder>) -> Self {
        let first_room_id = config.first_room_id;
        Self {
            shared: Arc::new(Shared {
                config: Arc::new(config),
                rooms: RwLock::new(HashMap::new()),
                ids: Mutex::new(IdAllocator::new(first_room_id)),
                recorder,
                next_player_id: AtomicU32::new(1),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.shared.config
    }

    /// Open a room with a random seed.
    pub async fn create_room(&self) -> Result<RoomId, CreateRoomError> {
        self.create_room_seeded(rand::random()).await
    }

    /// Open a room whose whole match history derives from `seed`.
    pub async fn create_room_seeded(&self, seed: u64) -> Result<RoomId, CreateRoomError> {
        // Capacity check and insert stay under one write guard so
        // concurrent creates cannot overshoot the limit.
        let mut rooms = self.shared.rooms.write().await;
        if rooms.len() >= self.shared.config.max_rooms {
            return Err(CreateRoomError::ServerFull);
        }

        let id = self.shared.ids.lock().await.allocate();
        let handle = RoomHandle::new(
            id,
            Arc::clone(&self.shared.config),
            Arc::clone(&self.shared.recorder),
            seed,
        );

        let task = {
            let shared = Arc::clone(&self.shared);
            let handle = handle.clone();
            tokio::spawn(async move {
                run_room_loop(handle.clone()).await;
                handle.finalize().await;
                retire(&shared, id, &handle).await;
            })
        };

        rooms.insert(id, RoomEntry { handle, task });
        tracing::info!(room = id, "room created");
        Ok(id)
    }

    /// Stop a room's match, record it if it started, and drop the room.
    pub async fn close_room(&self, room: RoomId) -> Result<(), CommandError> {
        let entry = {
            let mut rooms = self.shared.rooms.write().await;
            rooms.remove(&room).ok_or(CommandError::RoomNotFound)?
        };
        entry.handle.finalize().await;
        self.shared.ids.lock().await.release(room);
        tracing::info!(room, "room closed");
        let _ = entry.task.await;
        Ok(())
    }

    /// Seat a player in a room, allocating their server-wide id.
    pub async fn join_room(
        &self,
        room: RoomId,
        name: &str,
        account: Option<AccountId>,
    ) -> Result<JoinedRoom, JoinError> {
        let handle = self.room(room).await.ok_or(JoinError::RoomNotFound)?;
        let player_id = self.shared.next_player_id.fetch_add(1, Ordering::Relaxed);
        let color = handle.join(player_id, name, account).await?;
        Ok(JoinedRoom {
            room_id: room,
            player_id,
            color,
        })
    }

    /// Seat a machine player in a room.
    pub async fn add_bot(&self, room: RoomId, name: &str) -> Result<PlayerId, JoinError> {
        let handle = self.room(room).await.ok_or(JoinError::RoomNotFound)?;
        let player_id = self.shared.next_player_id.fetch_add(1, Ordering::Relaxed);
        handle.add_bot(player_id, name).await?;
        Ok(player_id)
    }

    /// Register the outbound channel for a member's connection.
    pub async fn attach_connection(
        &self,
        room: RoomId,
        player: PlayerId,
        tx: ConnectionTx,
    ) -> Result<(), CommandError> {
        let handle = self.room(room).await.ok_or(CommandError::RoomNotFound)?;
        handle.attach(player, tx).await;
        Ok(())
    }

    /// Remove a member. Idempotent: leaving twice is not an error. An
    /// emptied room closes immediately.
    pub async fn leave_room(&self, room: RoomId, player: PlayerId) -> Result<(), CommandError> {
        let handle = self.room(room).await.ok_or(CommandError::RoomNotFound)?;
        let outcome = handle.leave(player).await;
        if outcome.room_empty {
            let _ = self.close_room(room).await;
        }
        Ok(())
    }

    pub async fn set_ready(&self, room: RoomId, player: PlayerId) -> Result<bool, CommandError> {
        let handle = self.room(room).await.ok_or(CommandError::RoomNotFound)?;
        handle.set_ready(player).await
    }

    pub async fn set_spectator(
        &self,
        room: RoomId,
        player: PlayerId,
        enabled: bool,
    ) -> Result<bool, CommandError> {
        let handle = self.room(room).await.ok_or(CommandError::RoomNotFound)?;
        handle.set_spectator(player, enabled).await
    }

    pub async fn enqueue_move(
        &self,
        room: RoomId,
        player: PlayerId,
        order: MoveOrder,
    ) -> Result<bool, CommandError> {
        let handle = self.room(room).await.ok_or(CommandError::RoomNotFound)?;
        handle.enqueue_move(player, order).await
    }

    /// Personalized view of one room. `None` gives the unfiltered state.
    pub async fn view(
        &self,
        room: RoomId,
        viewer: Option<PlayerId>,
    ) -> Result<MatchView, CommandError> {
        let handle = self.room(room).await.ok_or(CommandError::RoomNotFound)?;
        Ok(handle.view(viewer).await)
    }

    /// Reset a room for a rematch.
    pub async fn play_again(&self, room: RoomId) -> Result<(), CommandError> {
        let handle = self.room(room).await.ok_or(CommandError::RoomNotFound)?;
        handle.play_again().await
    }

    /// Current lifecycle phase of a room.
    pub async fn room_phase(&self, room: RoomId) -> Result<RoomPhase, CommandError> {
        let handle = self.room(room).await.ok_or(CommandError::RoomNotFound)?;
        Ok(handle.phase().await)
    }

    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let handles: Vec<(RoomId, RoomHandle)> = {
            let rooms = self.shared.rooms.read().await;
            rooms
                .iter()
                .map(|(&id, entry)| (id, entry.handle.clone()))
                .collect()
        };

        let mut out = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            out.push(RoomSummary {
                room_id: id,
                phase: handle.phase().await,
                players: handle.player_count().await,
                capacity: self.shared.config.max_players_per_room,
            });
        }
        out.sort_by_key(|r| r.room_id);
        out
    }

    /// Close every room and wait for their tasks.
    pub async fn shutdown(&self) {
        let entries: Vec<(RoomId, RoomEntry)> = {
            let mut rooms = self.shared.rooms.write().await;
            rooms.drain().collect()
        };
        for (id, entry) in entries {
            entry.handle.finalize().await;
            self.shared.ids.lock().await.release(id);
            let _ = entry.task.await;
        }
    }

    async fn room(&self, room: RoomId) -> Option<RoomHandle> {
        let rooms = self.shared.rooms.read().await;
        rooms.get(&room).map(|entry| entry.handle.clone())
    }
}

/// A room task retires itself after its loop ends, unless the registry
/// entry was already replaced or removed by an explicit close.
async fn retire(shared: &Shared, id: RoomId, handle: &RoomHandle) {
    let mut rooms = shared.rooms.write().await;
    let same = rooms
        .get(&id)
        .map(|entry| Arc::ptr_eq(&entry.handle.inner, &handle.inner))
        .unwrap_or(false);
    if same {
        rooms.remove(&id);
        drop(rooms);
        shared.ids.lock().await.release(id);
        tracing::info!(room = id, "room closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_the_floor_and_reuse_lowest_first() {
        let mut ids = IdAllocator::new(1000);
        assert_eq!(ids.allocate(), 1000);
        assert_eq!(ids.allocate(), 1001);
        assert_eq!(ids.allocate(), 1002);

        ids.release(1000);
        ids.release(1002);
        assert_eq!(ids.allocate(), 1000);
        assert_eq!(ids.allocate(), 1002);
        assert_eq!(ids.allocate(), 1003);
    }

    #[test]
    fn releasing_an_unissued_id_is_ignored() {
        let mut ids = IdAllocator::new(1000);
        ids.release(5000);
        assert_eq!(ids.allocate(), 1000);
    }
}
