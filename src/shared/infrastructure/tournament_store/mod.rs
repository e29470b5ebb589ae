// Port for the transactional store behind the admission protocol.
//
// A transaction is owned by exactly one in-flight registration. Dropping it without
// calling `commit` must discard every write made through it.

use crate::modules::tournaments::core::registration::Registration;
use crate::modules::tournaments::core::tournament::Tournament;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("player {player_id} is already registered for tournament {tournament_id}")]
    DuplicateRegistration {
        tournament_id: String,
        player_id: String,
    },

    #[error("tournament store offline")]
    Offline,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("backend error during {context}")]
    Driver {
        context: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    pub fn driver(
        context: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Driver {
            context,
            source: Box::new(source),
        }
    }
}

#[async_trait]
pub trait TournamentStore: Send + Sync {
    type Transaction: StoreTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StoreError>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    async fn read_tournament(&mut self, tournament_id: &str)
    -> Result<Option<Tournament>, StoreError>;

    async fn registration_exists(
        &mut self,
        tournament_id: &str,
        player_id: &str,
    ) -> Result<bool, StoreError>;

    async fn count_registrations(&mut self, tournament_id: &str) -> Result<u64, StoreError>;

    /// Bumps the version by one iff it still equals `expected_version`.
    /// Returns `false` when no row was affected.
    async fn compare_and_increment_version(
        &mut self,
        tournament_id: &str,
        expected_version: i64,
    ) -> Result<bool, StoreError>;

    async fn insert_registration(&mut self, registration: &Registration)
    -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

pub mod in_memory;
pub mod sqlite;
