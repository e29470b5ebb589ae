// Contention run used by the binary: one tournament, many concurrent registrations.

use crate::modules::tournaments::core::tournament::Tournament;
use crate::modules::tournaments::use_cases::register_player::command::RegisterPlayer;
use crate::modules::tournaments::use_cases::register_player::handler::{
    RegisterPlayerHandler, RegistrationError,
};
use crate::shared::infrastructure::tournament_store::TournamentStore;
use crate::shared::infrastructure::tournament_store::in_memory::InMemoryTournamentStore;
use crate::shared::infrastructure::tournament_store::sqlite::SqliteTournamentStore;
use crate::shell::config::{RegistrarConfig, StoreBackend};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Outcomes {
    pub admitted: usize,
    pub full: usize,
    pub already_registered: usize,
    pub not_found: usize,
    pub retry_exhausted: usize,
    pub timed_out: usize,
    pub store_errors: usize,
}

impl Outcomes {
    fn record(&mut self, result: &Result<(), RegistrationError>) {
        let slot = match result {
            Ok(()) => &mut self.admitted,
            Err(RegistrationError::Full { .. }) => &mut self.full,
            Err(RegistrationError::AlreadyRegistered { .. }) => &mut self.already_registered,
            Err(RegistrationError::NotFound { .. }) => &mut self.not_found,
            Err(RegistrationError::RetryExhausted { .. }) => &mut self.retry_exhausted,
            Err(RegistrationError::Timeout { .. }) => &mut self.timed_out,
            Err(RegistrationError::Store(_)) => &mut self.store_errors,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub backend: &'static str,
    pub tournament: Tournament,
    pub players: usize,
    pub outcomes: Outcomes,
    pub registrations: usize,
}

pub async fn simulate<TStore>(
    handler: Arc<RegisterPlayerHandler<TStore>>,
    tournament_id: &str,
    players: usize,
) -> anyhow::Result<Outcomes>
where
    TStore: TournamentStore + 'static,
{
    let tasks: Vec<_> = (0..players)
        .map(|_| {
            let handler = Arc::clone(&handler);
            let command = RegisterPlayer::new(tournament_id, Uuid::now_v7().to_string());
            tokio::spawn(async move { handler.handle(command).await.map(|_| ()) })
        })
        .collect();

    let mut outcomes = Outcomes::default();
    for task in tasks {
        outcomes.record(&task.await?);
    }
    Ok(outcomes)
}

pub async fn run(config: &RegistrarConfig) -> anyhow::Result<SimulationReport> {
    let tournament_id = format!("tournament-{}", Uuid::now_v7());
    let seed = Tournament::new(&tournament_id, config.simulation_capacity);
    let players = config.simulation_players;

    match &config.backend {
        StoreBackend::InMemory => {
            let store = Arc::new(InMemoryTournamentStore::new());
            store.create_tournament(seed)?;
            let handler = Arc::new(RegisterPlayerHandler::new(
                store.clone(),
                config.retry.clone(),
            ));
            let outcomes = simulate(handler, &tournament_id, players).await?;
            let tournament = store
                .tournament(&tournament_id)
                .ok_or_else(|| anyhow::anyhow!("tournament {tournament_id} vanished"))?;
            Ok(SimulationReport {
                backend: "memory",
                tournament,
                players,
                outcomes,
                registrations: store.registrations(&tournament_id).len(),
            })
        }
        StoreBackend::Sqlite { path } => {
            tracing::info!(path = %path.display(), "opening sqlite tournament store");
            let store = Arc::new(SqliteTournamentStore::open(path)?);
            store.create_tournament(&seed).await?;
            let handler = Arc::new(RegisterPlayerHandler::new(
                store.clone(),
                config.retry.clone(),
            ));
            let outcomes = simulate(handler, &tournament_id, players).await?;
            let tournament = store
                .tournament(&tournament_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("tournament {tournament_id} vanished"))?;
            Ok(SimulationReport {
                backend: "sqlite",
                tournament,
                players,
                outcomes,
                registrations: store.registrations(&tournament_id).await?.len(),
            })
        }
    }
}
