use crate::modules::tournaments::core::registration::Registration;
use crate::modules::tournaments::use_cases::register_player::command::RegisterPlayer;
use crate::modules::tournaments::use_cases::register_player::decide::{
    AdmissionSnapshot, decide_admission,
};
use crate::modules::tournaments::use_cases::register_player::decision::{DecideError, Decision};
use crate::modules::tournaments::use_cases::register_player::retry_policy::RetryPolicy;
use crate::shared::infrastructure::tournament_store::{
    StoreError, StoreTransaction, TournamentStore,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep, timeout};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("tournament {tournament_id} not found")]
    NotFound { tournament_id: String },

    #[error("tournament {tournament_id} is full ({max_players} players)")]
    Full {
        tournament_id: String,
        max_players: u32,
    },

    #[error("player {player_id} is already registered for tournament {tournament_id}")]
    AlreadyRegistered {
        tournament_id: String,
        player_id: String,
    },

    #[error("gave up after {attempts} conflicting attempts")]
    RetryExhausted { attempts: u32 },

    #[error("timed out after {attempts} attempts ({elapsed:?})")]
    Timeout { attempts: u32, elapsed: Duration },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegistrationError {
    /// Rejections the caller should not retry as-is.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Full { .. } | Self::AlreadyRegistered { .. }
        )
    }

    fn rejected(command: &RegisterPlayer, reason: DecideError) -> Self {
        match reason {
            DecideError::NotFound => Self::NotFound {
                tournament_id: command.tournament_id.clone(),
            },
            DecideError::Full { max_players } => Self::Full {
                tournament_id: command.tournament_id.clone(),
                max_players,
            },
            DecideError::AlreadyRegistered => Self::AlreadyRegistered {
                tournament_id: command.tournament_id.clone(),
                player_id: command.player_id.clone(),
            },
        }
    }

    fn from_write(command: &RegisterPlayer, error: StoreError) -> Self {
        match error {
            StoreError::DuplicateRegistration { .. } => {
                Self::rejected(command, DecideError::AlreadyRegistered)
            }
            other => Self::Store(other),
        }
    }
}

enum Attempt {
    Committed(Registration),
    Conflict,
}

pub struct RegisterPlayerHandler<TStore>
where
    TStore: TournamentStore + 'static,
{
    store: Arc<TStore>,
    policy: RetryPolicy,
}

impl<TStore> RegisterPlayerHandler<TStore>
where
    TStore: TournamentStore + 'static,
{
    pub fn new(store: Arc<TStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    #[tracing::instrument(
        skip(self, command),
        fields(tournament_id = %command.tournament_id, player_id = %command.player_id)
    )]
    pub async fn handle(&self, command: RegisterPlayer) -> Result<Registration, RegistrationError> {
        let started = Instant::now();
        for attempt in 1..=self.policy.max_attempts {
            let Some(budget) = self.policy.budget(started.elapsed()) else {
                return Err(self.timed_out(attempt - 1, started));
            };
            match timeout(budget, self.attempt(&command)).await {
                Ok(Ok(Attempt::Committed(registration))) => {
                    tracing::debug!(attempt, "registration committed");
                    return Ok(registration);
                }
                Ok(Ok(Attempt::Conflict)) => {
                    tracing::debug!(attempt, "version conflict, retrying");
                    if attempt < self.policy.max_attempts {
                        sleep(self.policy.backoff(attempt)).await;
                    }
                }
                Ok(Err(error)) => {
                    if error.is_terminal() {
                        tracing::info!(%error, "registration rejected");
                    } else {
                        tracing::warn!(%error, "registration failed");
                    }
                    return Err(error);
                }
                Err(_) => return Err(self.timed_out(attempt, started)),
            }
        }
        tracing::warn!(
            attempts = self.policy.max_attempts,
            "registration retries exhausted"
        );
        Err(RegistrationError::RetryExhausted {
            attempts: self.policy.max_attempts,
        })
    }

    fn timed_out(&self, attempts: u32, started: Instant) -> RegistrationError {
        let elapsed = started.elapsed();
        tracing::warn!(attempts, ?elapsed, "registration timed out");
        RegistrationError::Timeout { attempts, elapsed }
    }

    async fn attempt(&self, command: &RegisterPlayer) -> Result<Attempt, RegistrationError> {
        let mut tx = self.store.begin().await?;
        let snapshot = match read_snapshot(&mut tx, command).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                abandon(tx).await;
                return Err(error.into());
            }
        };

        let expected_version = match decide_admission(&snapshot) {
            Decision::Admit { expected_version } => expected_version,
            Decision::Rejected { reason } => {
                abandon(tx).await;
                return Err(RegistrationError::rejected(command, reason));
            }
        };

        match tx
            .compare_and_increment_version(&command.tournament_id, expected_version)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                abandon(tx).await;
                return Ok(Attempt::Conflict);
            }
            Err(error) => {
                abandon(tx).await;
                return Err(error.into());
            }
        }

        let registration = Registration {
            tournament_id: command.tournament_id.clone(),
            player_id: command.player_id.clone(),
            registered_at: Utc::now().timestamp_millis(),
        };
        if let Err(error) = tx.insert_registration(&registration).await {
            abandon(tx).await;
            return Err(RegistrationError::from_write(command, error));
        }
        tx.commit()
            .await
            .map_err(|error| RegistrationError::from_write(command, error))?;
        Ok(Attempt::Committed(registration))
    }
}

async fn read_snapshot<TTransaction: StoreTransaction>(
    tx: &mut TTransaction,
    command: &RegisterPlayer,
) -> Result<AdmissionSnapshot, StoreError> {
    let Some(tournament) = tx.read_tournament(&command.tournament_id).await? else {
        return Ok(AdmissionSnapshot {
            tournament: None,
            already_registered: false,
            registered: 0,
        });
    };
    let already_registered = tx
        .registration_exists(&command.tournament_id, &command.player_id)
        .await?;
    let registered = tx.count_registrations(&command.tournament_id).await?;
    Ok(AdmissionSnapshot {
        tournament: Some(tournament),
        already_registered,
        registered,
    })
}

/// Rolls back an attempt that is already failing. A rollback error must not mask the
/// original outcome; the transaction is gone either way.
async fn abandon<TTransaction: StoreTransaction>(tx: TTransaction) {
    if let Err(error) = tx.rollback().await {
        tracing::warn!(%error, "rollback failed");
    }
}
