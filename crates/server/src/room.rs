use crate::colors;
use crate::errors::{CommandError, JoinError};
use crate::events::ServerMessage;
use crate::recorder::MatchRecorder;
use crate::types::{AccountId, RoomId, RoomPhase, ServerConfig};
use garrison_engine::{
    render_view, Commander, Match, MatchEvent, MatchView, MoveOrder, OverReason, PlayerId,
    SimpleBot,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Outbound channel for one connected member. The gateway owns the reader
/// half and forwards everything onto the socket.
pub type ConnectionTx = UnboundedSender<ServerMessage>;

/// A running lobby countdown.
pub struct Countdown {
    pub remaining: u8,
    pub task: JoinHandle<()>,
}

/// Internal state of a room.
pub struct RoomInner {
    pub id: RoomId,
    pub config: Arc<ServerConfig>,
    pub recorder: Arc<dyn MatchRecorder>,
    pub game: Match,
    pub phase: RoomPhase,
    pub connections: HashMap<PlayerId, ConnectionTx>,
    pub accounts: HashMap<PlayerId, AccountId>,
    pub bots: HashMap<PlayerId, Box<dyn Commander>>,
    pub countdown: Option<Countdown>,
    pub started_at: Option<Instant>,
    pub over_at: Option<Instant>,
    pub over_recorded: bool,
    /// Seeds for this room's matches; rematches draw the next seed from
    /// here so a room's whole history replays from its creation seed.
    pub seed_rng: StdRng,
}

/// What the tick loop learns from one drive pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct DriveOutcome {
    pub close: bool,
}

/// Outcome of removing a member.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeaveOutcome {
    pub removed: bool,
    pub room_empty: bool,
}

/// Thread-safe handle to a room.
pub struct RoomHandle {
    pub inner: Arc<Mutex<RoomInner>>,
    shutdown: Arc<AtomicBool>,
}

impl Clone for RoomHandle {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl RoomHandle {
    pub fn new(
        id: RoomId,
        config: Arc<ServerConfig>,
        recorder: Arc<dyn MatchRecorder>,
        seed: u64,
    ) -> Self {
        let mut seed_rng = StdRng::seed_from_u64(seed);
        let match_seed = seed_rng.gen::<u64>();
        let game = Match::new(config.game.clone(), match_seed);
        Self {
            inner: Arc::new(Mutex::new(RoomInner {
                id,
                config,
                recorder,
                game,
                phase: RoomPhase::Waiting,
                connections: HashMap::new(),
                accounts: HashMap::new(),
                bots: HashMap::new(),
                countdown: None,
                started_at: None,
                over_at: None,
                over_recorded: false,
                seed_rng,
            })),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Seat a new member. Allowed while the room is waiting or counting
    /// down; a join during the countdown does not interrupt it.
    pub async fn join(
        &self,
        player: PlayerId,
        name: &str,
        account: Option<AccountId>,
    ) -> Result<String, JoinError> {
        let mut inner = self.inner.lock().await;
        match inner.phase {
            RoomPhase::Waiting | RoomPhase::CountingDown => {}
            _ => return Err(JoinError::AlreadyStarted),
        }
        if inner.game.player_count() >= inner.config.max_players_per_room {
            return Err(JoinError::RoomFull);
        }

        let color = pick_color(&inner.game);
        inner.game.join(player, name, color.clone());
        if let Some(acct) = account {
            inner.accounts.insert(player, acct);
        }
        broadcast(&inner, |_| ServerMessage::PlayerJoined {
            player_id: player,
            name: name.to_string(),
            color: color.clone(),
        });
        tracing::info!(room = inner.id, player, name, "player joined");
        Ok(color)
    }

    /// Seat a machine player. Bots are always ready, so this can complete a
    /// lobby and kick off the countdown.
    pub async fn add_bot(&self, player: PlayerId, name: &str) -> Result<(), JoinError> {
        let mut inner = self.inner.lock().await;
        match inner.phase {
            RoomPhase::Waiting | RoomPhase::CountingDown => {}
            _ => return Err(JoinError::AlreadyStarted),
        }
        if inner.game.player_count() >= inner.config.max_players_per_room {
            return Err(JoinError::RoomFull);
        }

        let color = pick_color(&inner.game);
        inner.game.join(player, name, color.clone());
        let _ = inner.game.toggle_ready(player);
        let seed = inner.seed_rng.gen::<u64>();
        inner.bots.insert(player, Box::new(SimpleBot::new(player, seed)));
        broadcast(&inner, |_| ServerMessage::PlayerJoined {
            player_id: player,
            name: name.to_string(),
            color: color.clone(),
        });
        tracing::info!(room = inner.id, player, name, "bot added");
        reevaluate_countdown(&mut inner, self);
        Ok(())
    }

    /// Register the outbound channel for a member's connection.
    pub async fn attach(&self, player: PlayerId, tx: ConnectionTx) {
        let mut inner = self.inner.lock().await;
        inner.connections.insert(player, tx);
    }

    /// Remove a member entirely. A departure mid-match that leaves fewer
    /// than two contenders aborts the match; the caller closes the room
    /// when it reports empty.
    pub async fn leave(&self, player: PlayerId) -> LeaveOutcome {
        let mut inner = self.inner.lock().await;
        inner.connections.remove(&player);
        inner.accounts.remove(&player);
        inner.bots.remove(&player);
        let removed = inner.game.remove_player(player);
        if removed {
            broadcast(&inner, |_| ServerMessage::PlayerLeft { player_id: player });
            tracing::info!(room = inner.id, player, "player left");
        }

        if inner.phase == RoomPhase::Active
            && !inner.game.over()
            && inner.game.participant_count() < 2
        {
            inner.game.force_abnormal_end();
            settle_over(&mut inner);
        }
        if matches!(inner.phase, RoomPhase::Waiting | RoomPhase::CountingDown) {
            reevaluate_countdown(&mut inner, self);
        }

        LeaveOutcome {
            removed,
            room_empty: inner.game.player_count() == 0,
        }
    }

    /// Flip a member's ready vote and re-judge the countdown.
    pub async fn set_ready(&self, player: PlayerId) -> Result<bool, CommandError> {
        let mut inner = self.inner.lock().await;
        let ready = inner
            .game
            .toggle_ready(player)
            .ok_or(CommandError::UnknownPlayer)?;
        if matches!(inner.phase, RoomPhase::Waiting | RoomPhase::CountingDown) {
            reevaluate_countdown(&mut inner, self);
        }
        Ok(ready)
    }

    /// Step aside or rejoin before the match starts. Returns whether the
    /// toggle took effect; it never does once the match is running.
    pub async fn set_spectator(&self, player: PlayerId, enabled: bool) -> Result<bool, CommandError> {
        let mut inner = self.inner.lock().await;
        if inner.game.player(player).is_none() {
            return Err(CommandError::UnknownPlayer);
        }
        let changed = if enabled {
            inner.game.set_voluntary_spectator(player)
        } else {
            inner.game.cancel_voluntary_spectator(player)
        };
        if changed && matches!(inner.phase, RoomPhase::Waiting | RoomPhase::CountingDown) {
            reevaluate_countdown(&mut inner, self);
        }
        Ok(changed)
    }

    /// Queue a move intent. A refusal is expected gameplay, not an error.
    pub async fn enqueue_move(
        &self,
        player: PlayerId,
        order: MoveOrder,
    ) -> Result<bool, CommandError> {
        let mut inner = self.inner.lock().await;
        if inner.game.player(player).is_none() {
            return Err(CommandError::UnknownPlayer);
        }
        let accepted = inner.game.enqueue_move(player, order);
        tracing::debug!(
            room = inner.id,
            player,
            accepted,
            from = ?order.from,
            to = ?order.to,
            "move order"
        );
        Ok(accepted)
    }

    /// Personalized view of the room's match, countdown included.
    pub async fn view(&self, viewer: Option<PlayerId>) -> MatchView {
        let inner = self.inner.lock().await;
        current_view(&inner, viewer)
    }

    pub async fn phase(&self) -> RoomPhase {
        let inner = self.inner.lock().await;
        inner.phase
    }

    pub async fn player_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.game.player_count()
    }

    /// Reset the room for a rematch: a fresh board from the room's seed
    /// stream, everybody re-seated, ready votes cleared. A still-running
    /// match is recorded as aborted first.
    pub async fn play_again(&self) -> Result<(), CommandError> {
        let mut inner = self.inner.lock().await;
        if let Some(cd) = inner.countdown.take() {
            cd.task.abort();
        }
        if inner.game.started() && !inner.game.over() {
            inner.game.force_abnormal_end();
            settle_over(&mut inner);
        }
        reset_match(&mut inner);
        broadcast(&inner, |_| ServerMessage::MatchReset);
        broadcast_snapshots(&inner);
        tracing::info!(room = inner.id, "room reset for rematch");
        reevaluate_countdown(&mut inner, self);
        Ok(())
    }

    /// One pass of the room task: feed bots, advance the match, settle an
    /// ending, push snapshots when due, and report whether the room is done.
    pub async fn drive(&self, broadcast_due: bool) -> DriveOutcome {
        let mut inner = self.inner.lock().await;
        let mut outcome = DriveOutcome::default();

        match inner.phase {
            RoomPhase::Active => {
                feed_bots(&mut inner);
                let mut events = Vec::new();
                inner.game.advance(&mut events);
                for event in &events {
                    if let MatchEvent::PlayerEliminated { player, by } = event {
                        tracing::info!(room = inner.id, player, by, "player eliminated");
                    }
                }
                if inner.game.over() && !inner.over_recorded {
                    settle_over(&mut inner);
                }
            }
            RoomPhase::Over => {
                let expired = inner
                    .over_at
                    .map(|at| at.elapsed() >= inner.config.close_grace)
                    .unwrap_or(false);
                if expired {
                    outcome.close = true;
                }
            }
            _ => {}
        }

        if broadcast_due && inner.phase != RoomPhase::Closed {
            broadcast_snapshots(&inner);
        }
        outcome
    }

    /// Terminal cleanup: cancel the countdown, record a still-running match
    /// as aborted, drop connections and stop the room task. Idempotent.
    pub async fn finalize(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(cd) = inner.countdown.take() {
            cd.task.abort();
        }
        if inner.game.started() && !inner.game.over() {
            inner.game.force_abnormal_end();
        }
        if inner.game.started() && !inner.over_recorded {
            settle_over(&mut inner);
        }
        inner.phase = RoomPhase::Closed;
        inner.connections.clear();
        self.request_shutdown();
    }
}

fn pick_color(game: &Match) -> String {
    let used: Vec<String> = game.players().map(|p| p.color.clone()).collect();
    colors::next_free(&used).unwrap_or("#888888").to_string()
}

/// Send one message per connected member. Senders whose reader went away
/// fail silently; the gateway's leave path cleans those up.
fn broadcast<F>(inner: &RoomInner, build: F)
where
    F: Fn(PlayerId) -> ServerMessage,
{
    for (&id, tx) in &inner.connections {
        let _ = tx.send(build(id));
    }
}

fn countdown_left(inner: &RoomInner) -> Option<u8> {
    if inner.phase != RoomPhase::CountingDown {
        return None;
    }
    inner.countdown.as_ref().map(|cd| cd.remaining)
}

fn current_view(inner: &RoomInner, viewer: Option<PlayerId>) -> MatchView {
    render_view(&inner.game, viewer, countdown_left(inner))
}

fn broadcast_snapshots(inner: &RoomInner) {
    for (&id, tx) in &inner.connections {
        let _ = tx.send(ServerMessage::Snapshot {
            room_id: inner.id,
            phase: inner.phase,
            view: current_view(inner, Some(id)),
        });
    }
}

/// At least two contenders and every member ready. Spectators count as
/// ready by construction.
fn lobby_ready(inner: &RoomInner) -> bool {
    inner.game.participant_count() >= 2 && inner.game.players().all(|p| p.ready)
}

/// Start or cancel the countdown to match the current lobby. Only called
/// while waiting or counting down.
fn reevaluate_countdown(inner: &mut RoomInner, handle: &RoomHandle) {
    let ready = lobby_ready(inner);
    match inner.phase {
        RoomPhase::Waiting if ready => {
            inner.phase = RoomPhase::CountingDown;
            let task = tokio::spawn(run_countdown(handle.clone()));
            inner.countdown = Some(Countdown {
                remaining: inner.config.countdown_seconds,
                task,
            });
            tracing::info!(room = inner.id, "countdown started");
        }
        RoomPhase::CountingDown if !ready => {
            if let Some(cd) = inner.countdown.take() {
                cd.task.abort();
            }
            inner.phase = RoomPhase::Waiting;
            broadcast(inner, |_| ServerMessage::CountdownCancelled);
            tracing::info!(room = inner.id, "countdown cancelled");
        }
        _ => {}
    }
}

/// The countdown task: announce each remaining second, then start the
/// match. Cancellation happens from outside via abort.
async fn run_countdown(handle: RoomHandle) {
    loop {
        let interval = {
            let mut inner = handle.inner.lock().await;
            if inner.phase != RoomPhase::CountingDown {
                return;
            }
            let Some(cd) = inner.countdown.as_ref() else {
                return;
            };
            if cd.remaining == 0 {
                start_match(&mut inner);
                return;
            }
            let left = cd.remaining;
            broadcast(&inner, |_| ServerMessage::CountdownTick { seconds_left: left });
            inner.config.countdown_interval
        };
        tokio::time::sleep(interval).await;
        {
            let mut inner = handle.inner.lock().await;
            if inner.phase != RoomPhase::CountingDown {
                return;
            }
            match inner.countdown.as_mut() {
                Some(cd) => cd.remaining -= 1,
                None => return,
            }
        }
    }
}

fn start_match(inner: &mut RoomInner) {
    inner.countdown = None;
    inner.game.start();
    inner.phase = RoomPhase::Active;
    inner.started_at = Some(Instant::now());
    broadcast(inner, |_| ServerMessage::MatchStarted);
    tracing::info!(room = inner.id, "match started");
}

/// Let every bot see the latest state and queue at most one intent, through
/// the same validation path as remote players.
fn feed_bots(inner: &mut RoomInner) {
    let RoomInner { game, bots, .. } = inner;
    let mut orders: Vec<(PlayerId, MoveOrder)> = Vec::new();
    for (&id, bot) in bots.iter_mut() {
        if !game.player(id).is_some_and(|p| p.is_participant()) {
            continue;
        }
        bot.observe(&render_view(game, Some(id), None));
        if let Some(order) = bot.decide() {
            orders.push((id, order));
        }
    }
    for (id, order) in orders {
        game.enqueue_move(id, order);
    }
}

/// Close the books on a finished match: phase, timestamps, persistence and
/// the final announcement. Stats and currency only move for matches that
/// ended by elimination.
fn settle_over(inner: &mut RoomInner) {
    if inner.over_recorded || !inner.game.started() {
        return;
    }
    inner.over_recorded = true;
    inner.phase = RoomPhase::Over;
    inner.over_at = Some(Instant::now());

    let reason = inner.game.over_reason().unwrap_or(OverReason::Abnormal);
    let winner = inner.game.winner();
    let duration = inner.started_at.map(|t| t.elapsed()).unwrap_or_default();
    let total_ticks = inner.game.tick();
    let winner_account = winner.and_then(|id| inner.accounts.get(&id).copied());

    let record = inner
        .recorder
        .record_match_result(inner.id, winner_account, duration, total_ticks);
    let mut rank = 0u32;
    for (pid, _, _) in inner.game.leaderboard() {
        let Some(player) = inner.game.player(pid) else {
            continue;
        };
        if player.voluntary_spectator {
            continue;
        }
        rank += 1;
        let Some(&account) = inner.accounts.get(&pid) else {
            continue;
        };
        inner
            .recorder
            .record_participant(record, account, rank, player.alive);
        if reason == OverReason::Normal {
            inner.recorder.increment_stats(account, winner == Some(pid));
            inner.recorder.grant_currency(account, 1);
        }
    }

    broadcast(inner, |_| ServerMessage::MatchOver { winner, reason });
    tracing::info!(
        room = inner.id,
        ?winner,
        ?reason,
        ticks = total_ticks,
        "match over"
    );
}

/// Rebuild the match for a rematch: next seed from the room's stream,
/// spawn points reserved for the whole roster up front, members re-seated
/// in id order with fresh colors. Voluntary spectators stay spectators;
/// eliminated players return as contenders.
fn reset_match(inner: &mut RoomInner) {
    let seed = inner.seed_rng.gen::<u64>();
    let members: Vec<(PlayerId, String, bool)> = inner
        .game
        .players()
        .map(|p| (p.id, p.name.clone(), p.voluntary_spectator))
        .collect();

    let mut game = Match::new(inner.config.game.clone(), seed);
    game.reserve_spawn_points(
        members.len(),
        Some(inner.config.game.rematch_spawn_distance),
    );
    for (id, name, spectate) in &members {
        let color = pick_color(&game);
        if *spectate {
            game.join_as_spectator(*id, name.clone(), color);
        } else {
            game.join(*id, name.clone(), color);
        }
    }
    for id in inner.bots.keys() {
        let _ = game.toggle_ready(*id);
    }

    inner.game = game;
    inner.phase = RoomPhase::Waiting;
    inner.started_at = None;
    inner.over_at = None;
    inner.over_recorded = false;
}
