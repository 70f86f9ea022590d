use crate::types::{AccountId, RoomId};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Identifies one recorded match result.
pub type MatchRecordId = u64;

/// Persistence seam for finished matches. Called synchronously from inside
/// room tasks, so implementations should return quickly and queue anything
/// slow themselves.
pub trait MatchRecorder: Send + Sync {
    /// Record a finished match and return its ledger id. Called for every
    /// match that actually started, whatever the reason it ended.
    fn record_match_result(
        &self,
        room: RoomId,
        winner: Option<AccountId>,
        duration: Duration,
        total_ticks: u64,
    ) -> MatchRecordId;

    /// Record one contender of a finished match. `final_rank` is their
    /// 1-based leaderboard position.
    fn record_participant(
        &self,
        record: MatchRecordId,
        account: AccountId,
        final_rank: u32,
        survived: bool,
    );

    /// Bump lifetime match/win counters. Only called for matches that ended
    /// by elimination.
    fn increment_stats(&self, account: AccountId, won: bool);

    /// Award play currency. Only called for matches that ended by
    /// elimination.
    fn grant_currency(&self, account: AccountId, amount: u32);
}

/// Discards everything.
pub struct NoopRecorder;

impl MatchRecorder for NoopRecorder {
    fn record_match_result(
        &self,
        _room: RoomId,
        _winner: Option<AccountId>,
        _duration: Duration,
        _total_ticks: u64,
    ) -> MatchRecordId {
        0
    }

    fn record_participant(
        &self,
        _record: MatchRecordId,
        _account: AccountId,
        _final_rank: u32,
        _survived: bool,
    ) {
    }

    fn increment_stats(&self, _account: AccountId, _won: bool) {}

    fn grant_currency(&self, _account: AccountId, _amount: u32) {}
}

/// One recorded match result.
#[derive(Clone, Debug)]
pub struct RecordedMatch {
    pub record: MatchRecordId,
    pub room: RoomId,
    pub winner: Option<AccountId>,
    pub duration: Duration,
    pub total_ticks: u64,
}

/// One recorded contender.
#[derive(Clone, Debug)]
pub struct RecordedParticipant {
    pub record: MatchRecordId,
    pub account: AccountId,
    pub final_rank: u32,
    pub survived: bool,
}

/// Lifetime counters per account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccountStats {
    pub matches: u32,
    pub wins: u32,
    pub currency: u32,
}

#[derive(Default)]
struct MemoryLedger {
    last_record: MatchRecordId,
    matches: Vec<RecordedMatch>,
    participants: Vec<RecordedParticipant>,
    stats: HashMap<AccountId, AccountStats>,
}

/// In-memory ledger for tests and demos.
#[derive(Default)]
pub struct MemoryRecorder {
    inner: Mutex<MemoryLedger>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matches(&self) -> Vec<RecordedMatch> {
        self.lock().matches.clone()
    }

    pub fn participants(&self) -> Vec<RecordedParticipant> {
        self.lock().participants.clone()
    }

    pub fn stats(&self, account: AccountId) -> AccountStats {
        self.lock().stats.get(&account).copied().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryLedger> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MatchRecorder for MemoryRecorder {
    fn record_match_result(
        &self,
        room: RoomId,
        winner: Option<AccountId>,
        duration: Duration,
        total_ticks: u64,
    ) -> MatchRecordId {
        let mut ledger = self.lock();
        ledger.last_record += 1;
        let record = ledger.last_record;
        ledger.matches.push(RecordedMatch {
            record,
            room,
            winner,
            duration,
            total_ticks,
        });
        record
    }

    fn record_participant(
        &self,
        record: MatchRecordId,
        account: AccountId,
        final_rank: u32,
        survived: bool,
    ) {
        self.lock().participants.push(RecordedParticipant {
            record,
            account,
            final_rank,
            survived,
        });
    }

    fn increment_stats(&self, account: AccountId, won: bool) {
        let mut ledger = self.lock();
        let stats = ledger.stats.entry(account).or_default();
        stats.matches += 1;
        if won {
            stats.wins += 1;
        }
    }

    fn grant_currency(&self, account: AccountId, amount: u32) {
        let mut ledger = self.lock();
        let stats = ledger.stats.entry(account).or_default();
        stats.currency += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_keeps_results_participants_and_stats() {
        let rec = MemoryRecorder::new();
        let id = rec.record_match_result(1000, Some(7), Duration::from_secs(12), 40);
        assert_eq!(id, 1);
        rec.record_participant(id, 7, 1, true);
        rec.record_participant(id, 8, 2, false);
        rec.increment_stats(7, true);
        rec.increment_stats(8, false);
        rec.grant_currency(7, 1);
        rec.grant_currency(8, 1);

        assert_eq!(rec.matches().len(), 1);
        assert_eq!(rec.participants().len(), 2);
        assert_eq!(
            rec.stats(7),
            AccountStats { matches: 1, wins: 1, currency: 1 }
        );
        assert_eq!(
            rec.stats(8),
            AccountStats { matches: 1, wins: 0, currency: 1 }
        );
    }
}
