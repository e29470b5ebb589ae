// In memory implementation of the TournamentStore port.
//
// Purpose
// - Support registrar tests and local runs without a database.
//
// Responsibilities
// - Keep committed tournaments and registrations behind a single mutex.
// - Buffer each transaction's writes and apply them atomically on commit.
// - Emulate a row lock on the tournament for the compare-and-set: while one
//   transaction holds a pending bump, another transaction's compare-and-set affects
//   no rows. The lock is released on commit, rollback or drop.

use crate::modules::tournaments::core::registration::Registration;
use crate::modules::tournaments::core::tournament::Tournament;
use crate::shared::infrastructure::tournament_store::{
    StoreError, StoreTransaction, TournamentStore,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
struct Tables {
    tournaments: HashMap<String, Tournament>,
    registrations: HashMap<String, BTreeMap<String, Registration>>,
    row_locks: HashMap<String, u64>,
}

impl Tables {
    fn is_registered(&self, tournament_id: &str, player_id: &str) -> bool {
        self.registrations
            .get(tournament_id)
            .is_some_and(|players| players.contains_key(player_id))
    }

    fn count(&self, tournament_id: &str) -> u64 {
        self.registrations
            .get(tournament_id)
            .map_or(0, |players| players.len() as u64)
    }

    fn release(&mut self, txn_id: u64) {
        self.row_locks.retain(|_, holder| *holder != txn_id);
    }
}

#[derive(Default)]
pub struct InMemoryTournamentStore {
    tables: Arc<Mutex<Tables>>,
    next_txn_id: AtomicU64,
    is_offline: bool,
    delay_ms: AtomicU64,
    fail_next_commit: AtomicBool,
}

impl InMemoryTournamentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_offline(&mut self) {
        self.is_offline = !self.is_offline;
    }

    /// Sleeps inside every compare-and-set, after the transaction has read its snapshot.
    pub fn set_delay_ms(&self, ms: u64) {
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub fn create_tournament(&self, tournament: Tournament) -> Result<(), StoreError> {
        if tournament.max_players == 0 {
            return Err(StoreError::Backend(format!(
                "tournament {} must admit at least one player",
                tournament.tournament_id
            )));
        }
        let mut tables = self.tables.lock();
        tables
            .registrations
            .entry(tournament.tournament_id.clone())
            .or_default();
        tables
            .tournaments
            .insert(tournament.tournament_id.clone(), tournament);
        Ok(())
    }

    /// Inserts committed registrations directly, bypassing the version guard.
    pub fn seed_registrations(&self, registrations: impl IntoIterator<Item = Registration>) {
        let mut tables = self.tables.lock();
        for registration in registrations {
            tables
                .registrations
                .entry(registration.tournament_id.clone())
                .or_default()
                .insert(registration.player_id.clone(), registration);
        }
    }

    pub fn tournament(&self, tournament_id: &str) -> Option<Tournament> {
        self.tables.lock().tournaments.get(tournament_id).cloned()
    }

    pub fn registrations(&self, tournament_id: &str) -> Vec<Registration> {
        self.tables
            .lock()
            .registrations
            .get(tournament_id)
            .map(|players| players.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TournamentStore for InMemoryTournamentStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction, StoreError> {
        if self.is_offline {
            return Err(StoreError::Offline);
        }
        Ok(InMemoryTransaction {
            id: self.next_txn_id.fetch_add(1, Ordering::SeqCst) + 1,
            tables: Arc::clone(&self.tables),
            delay: Duration::from_millis(self.delay_ms.load(Ordering::SeqCst)),
            fail_commit: self.fail_next_commit.swap(false, Ordering::SeqCst),
            bumps: HashMap::new(),
            inserts: Vec::new(),
            finished: false,
        })
    }
}

pub struct InMemoryTransaction {
    id: u64,
    tables: Arc<Mutex<Tables>>,
    delay: Duration,
    fail_commit: bool,
    bumps: HashMap<String, i64>,
    inserts: Vec<Registration>,
    finished: bool,
}

impl InMemoryTransaction {
    fn pending_count(&self, tournament_id: &str) -> u64 {
        self.inserts
            .iter()
            .filter(|r| r.tournament_id == tournament_id)
            .count() as u64
    }

    fn pending_contains(&self, tournament_id: &str, player_id: &str) -> bool {
        self.inserts
            .iter()
            .any(|r| r.key() == (tournament_id, player_id))
    }

    fn finish(&mut self) {
        self.finished = true;
        self.tables.lock().release(self.id);
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn read_tournament(
        &mut self,
        tournament_id: &str,
    ) -> Result<Option<Tournament>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.tournaments.get(tournament_id).map(|t| Tournament {
            version: t.version + self.bumps.get(tournament_id).copied().unwrap_or(0),
            ..t.clone()
        }))
    }

    async fn registration_exists(
        &mut self,
        tournament_id: &str,
        player_id: &str,
    ) -> Result<bool, StoreError> {
        let committed = self.tables.lock().is_registered(tournament_id, player_id);
        Ok(committed || self.pending_contains(tournament_id, player_id))
    }

    async fn count_registrations(&mut self, tournament_id: &str) -> Result<u64, StoreError> {
        let committed = self.tables.lock().count(tournament_id);
        Ok(committed + self.pending_count(tournament_id))
    }

    async fn compare_and_increment_version(
        &mut self,
        tournament_id: &str,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut tables = self.tables.lock();
        let Some(committed) = tables.tournaments.get(tournament_id).map(|t| t.version) else {
            return Ok(false);
        };
        let own_bumps = self.bumps.get(tournament_id).copied().unwrap_or(0);
        if committed + own_bumps != expected_version {
            return Ok(false);
        }
        match tables.row_locks.get(tournament_id) {
            Some(holder) if *holder != self.id => return Ok(false),
            Some(_) => {}
            None => {
                tables.row_locks.insert(tournament_id.to_string(), self.id);
            }
        }
        *self.bumps.entry(tournament_id.to_string()).or_insert(0) += 1;
        Ok(true)
    }

    async fn insert_registration(
        &mut self,
        registration: &Registration,
    ) -> Result<(), StoreError> {
        let (tournament_id, player_id) = registration.key();
        let (exists, registered) = {
            let tables = self.tables.lock();
            (
                tables.tournaments.contains_key(tournament_id),
                tables.is_registered(tournament_id, player_id),
            )
        };
        if !exists {
            return Err(StoreError::Backend(format!(
                "unknown tournament {tournament_id}"
            )));
        }
        if registered || self.pending_contains(tournament_id, player_id) {
            return Err(StoreError::DuplicateRegistration {
                tournament_id: tournament_id.to_string(),
                player_id: player_id.to_string(),
            });
        }
        self.inserts.push(registration.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        if self.fail_commit {
            self.finish();
            return Err(StoreError::Backend("commit rejected".into()));
        }
        let mut tables = self.tables.lock();
        if let Some(duplicate) = self
            .inserts
            .iter()
            .find(|r| tables.is_registered(&r.tournament_id, &r.player_id))
        {
            let error = StoreError::DuplicateRegistration {
                tournament_id: duplicate.tournament_id.clone(),
                player_id: duplicate.player_id.clone(),
            };
            tables.release(self.id);
            drop(tables);
            self.finished = true;
            return Err(error);
        }
        for (tournament_id, bump) in self.bumps.drain() {
            if let Some(tournament) = tables.tournaments.get_mut(&tournament_id) {
                tournament.version += bump;
            }
        }
        for registration in self.inserts.drain(..) {
            tables
                .registrations
                .entry(registration.tournament_id.clone())
                .or_default()
                .insert(registration.player_id.clone(), registration);
        }
        tables.release(self.id);
        drop(tables);
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.finish();
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.tables.lock().release(self.id);
        }
    }
}
