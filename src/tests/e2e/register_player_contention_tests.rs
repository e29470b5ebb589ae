// End to end contention tests for the registration flow.
//
// Many players race for fewer slots than there are players; afterwards the store must
// hold exactly `max_players` registrations and a version equal to that count. One player
// racing against themselves must be admitted once.

use crate::modules::tournaments::core::tournament::Tournament;
use crate::modules::tournaments::use_cases::register_player::command::RegisterPlayer;
use crate::modules::tournaments::use_cases::register_player::handler::{
    RegisterPlayerHandler, RegistrationError,
};
use crate::modules::tournaments::use_cases::register_player::retry_policy::RetryPolicy;
use crate::shared::infrastructure::tournament_store::TournamentStore;
use crate::shared::infrastructure::tournament_store::in_memory::InMemoryTournamentStore;
use crate::shared::infrastructure::tournament_store::sqlite::SqliteTournamentStore;
use crate::tests::fixtures::tournaments::TournamentBuilder;
use rstest::rstest;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn contention_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1_000,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(10),
        attempt_timeout: Duration::from_secs(10),
        deadline: None,
    }
}

async fn race<TStore>(
    store: Arc<TStore>,
    policy: RetryPolicy,
    tournament: &Tournament,
    players: usize,
    player_id: impl Fn(usize) -> String,
) -> Vec<Result<String, RegistrationError>>
where
    TStore: TournamentStore + 'static,
{
    let handler = Arc::new(RegisterPlayerHandler::new(store, policy));
    let tasks: Vec<_> = (0..players)
        .map(|i| {
            let handler = Arc::clone(&handler);
            let command = RegisterPlayer::new(&tournament.tournament_id, player_id(i));
            tokio::spawn(async move {
                handler
                    .handle(command)
                    .await
                    .map(|registration| registration.player_id)
            })
        })
        .collect();
    let mut results = Vec::with_capacity(players);
    for task in tasks {
        results.push(task.await.expect("registration task panicked"));
    }
    results
}

fn distinct(i: usize) -> String {
    format!("p-{i}")
}

fn same(_: usize) -> String {
    "p-0".to_string()
}

fn admitted(results: &[Result<String, RegistrationError>]) -> HashSet<String> {
    results.iter().filter_map(|r| r.as_ref().ok().cloned()).collect()
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn it_should_never_oversell_an_in_memory_tournament() {
    let tournament = TournamentBuilder::new().max_players(5).build();
    let store = InMemoryTournamentStore::new();
    store
        .create_tournament(tournament.clone())
        .expect("create tournament failed");
    store.set_delay_ms(1);
    let store = Arc::new(store);

    let results = race(store.clone(), contention_policy(), &tournament, 32, distinct).await;

    let winners = admitted(&results);
    assert_eq!(winners.len(), 5);
    for result in &results {
        if let Err(error) = result {
            assert!(
                matches!(error, RegistrationError::Full { max_players: 5, .. }),
                "unexpected error: {error:?}"
            );
        }
    }
    let registered: HashSet<String> = store
        .registrations(&tournament.tournament_id)
        .into_iter()
        .map(|r| r.player_id)
        .collect();
    assert_eq!(registered, winners);
    assert_eq!(store.tournament(&tournament.tournament_id).unwrap().version, 5);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn it_should_terminate_every_attempt_under_a_small_retry_bound() {
    let tournament = TournamentBuilder::new().max_players(3).build();
    let store = InMemoryTournamentStore::new();
    store
        .create_tournament(tournament.clone())
        .expect("create tournament failed");
    store.set_delay_ms(2);
    let store = Arc::new(store);
    let policy = RetryPolicy {
        max_attempts: 8,
        ..contention_policy()
    };

    let results = tokio::time::timeout(
        Duration::from_secs(30),
        race(store.clone(), policy, &tournament, 8, distinct),
    )
    .await
    .expect("registrations did not terminate");

    assert_eq!(results.len(), 8);
    for result in &results {
        if let Err(error) = result {
            assert!(
                matches!(
                    error,
                    RegistrationError::Full { .. } | RegistrationError::RetryExhausted { .. }
                ),
                "unexpected error: {error:?}"
            );
        }
    }
    let committed = store.registrations(&tournament.tournament_id).len();
    assert!(committed <= 3);
    assert_eq!(admitted(&results).len(), committed);
    assert_eq!(
        store.tournament(&tournament.tournament_id).unwrap().version,
        committed as i64
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn it_should_never_oversell_a_sqlite_tournament() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let store = SqliteTournamentStore::open(dir.path().join("tournaments.db")).expect("open failed");
    let tournament = TournamentBuilder::new().max_players(2).build();
    store.create_tournament(&tournament).await.unwrap();
    let store = Arc::new(store);

    let results = race(store.clone(), contention_policy(), &tournament, 6, distinct).await;

    let winners = admitted(&results);
    assert_eq!(winners.len(), 2);
    for result in &results {
        if let Err(error) = result {
            assert!(
                matches!(error, RegistrationError::Full { max_players: 2, .. }),
                "unexpected error: {error:?}"
            );
        }
    }
    let registered: HashSet<String> = store
        .registrations(&tournament.tournament_id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.player_id)
        .collect();
    assert_eq!(registered, winners);
    assert_eq!(
        store
            .tournament(&tournament.tournament_id)
            .await
            .unwrap()
            .unwrap()
            .version,
        2
    );
}

fn assert_admitted_once(results: &[Result<String, RegistrationError>]) {
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results {
        if let Err(error) = result {
            assert!(
                matches!(
                    error,
                    RegistrationError::AlreadyRegistered { player_id, .. } if player_id == "p-0"
                ),
                "unexpected error: {error:?}"
            );
        }
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn it_should_admit_a_player_racing_themselves_once_in_memory() {
    let tournament = TournamentBuilder::new().max_players(5).build();
    let store = InMemoryTournamentStore::new();
    store
        .create_tournament(tournament.clone())
        .expect("create tournament failed");
    store.set_delay_ms(1);
    let store = Arc::new(store);

    let results = race(store.clone(), contention_policy(), &tournament, 8, same).await;

    assert_admitted_once(&results);
    assert_eq!(store.registrations(&tournament.tournament_id).len(), 1);
    assert_eq!(store.tournament(&tournament.tournament_id).unwrap().version, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn it_should_admit_a_player_racing_themselves_once_in_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let store = SqliteTournamentStore::open(dir.path().join("tournaments.db")).expect("open failed");
    let tournament = TournamentBuilder::new().max_players(5).build();
    store.create_tournament(&tournament).await.unwrap();
    let store = Arc::new(store);

    let results = race(store.clone(), contention_policy(), &tournament, 6, same).await;

    assert_admitted_once(&results);
    assert_eq!(
        store
            .registrations(&tournament.tournament_id)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        store
            .tournament(&tournament.tournament_id)
            .await
            .unwrap()
            .unwrap()
            .version,
        1
    );
}
