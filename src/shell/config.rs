use crate::modules::tournaments::use_cases::register_player::retry_policy::RetryPolicy;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrarConfig {
    pub retry: RetryPolicy,
    pub backend: StoreBackend,
    pub simulation_capacity: u32,
    pub simulation_players: usize,
}

impl RegistrarConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = RetryPolicy::default();
        let millis = |key: &'static str, default: Duration| {
            parse(&lookup, key).map(|ms: Option<u64>| ms.map_or(default, Duration::from_millis))
        };

        let retry = RetryPolicy {
            max_attempts: parse(&lookup, "REGISTRAR_MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
            attempt_timeout: millis("REGISTRAR_ATTEMPT_TIMEOUT_MS", defaults.attempt_timeout)?,
            deadline: parse(&lookup, "REGISTRAR_DEADLINE_MS")?.map(Duration::from_millis),
            initial_backoff: millis("REGISTRAR_INITIAL_BACKOFF_MS", defaults.initial_backoff)?,
            max_backoff: millis("REGISTRAR_MAX_BACKOFF_MS", defaults.max_backoff)?,
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "REGISTRAR_MAX_ATTEMPTS",
                value: "0".into(),
            });
        }

        let backend = match lookup("TOURNAMENT_STORE").as_deref() {
            None | Some("memory") => StoreBackend::InMemory,
            Some("sqlite") => StoreBackend::Sqlite {
                path: lookup("TOURNAMENT_SQLITE_PATH")
                    .map_or_else(|| PathBuf::from("tournaments.db"), PathBuf::from),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "TOURNAMENT_STORE",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            retry,
            backend,
            simulation_capacity: parse(&lookup, "SIMULATION_CAPACITY")?.unwrap_or(8),
            simulation_players: parse(&lookup, "SIMULATION_PLAYERS")?.unwrap_or(32),
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}
