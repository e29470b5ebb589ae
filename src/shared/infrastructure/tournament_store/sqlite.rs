// SQLite implementation of the TournamentStore port.
//
// Every transaction owns its own connection so concurrent registrations race
// exactly as separate database clients would. The database runs in WAL mode: a
// transaction whose read snapshot is stale when it reaches the conditional update
// gets SQLITE_BUSY, which is the same lost race as a zero-row update.
//
// rusqlite is blocking, so each statement runs on the tokio blocking pool.

use crate::modules::tournaments::core::registration::Registration;
use crate::modules::tournaments::core::tournament::Tournament;
use crate::shared::infrastructure::tournament_store::{
    StoreError, StoreTransaction, TournamentStore,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, ffi, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tournaments (
    tournament_id TEXT PRIMARY KEY,
    max_players   INTEGER NOT NULL CHECK (max_players > 0),
    version       INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS tournament_registrations (
    tournament_id TEXT NOT NULL REFERENCES tournaments (tournament_id),
    player_id     TEXT NOT NULL,
    registered_at INTEGER NOT NULL,
    PRIMARY KEY (tournament_id, player_id)
);
";

const SELECT_TOURNAMENT: &str =
    "SELECT max_players, version FROM tournaments WHERE tournament_id = ?1";
const SELECT_REGISTRATION_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM tournament_registrations WHERE tournament_id = ?1 AND player_id = ?2)";
const COUNT_REGISTRATIONS: &str =
    "SELECT COUNT(*) FROM tournament_registrations WHERE tournament_id = ?1";
const UPDATE_VERSION: &str =
    "UPDATE tournaments SET version = version + 1 WHERE tournament_id = ?1 AND version = ?2";
const INSERT_REGISTRATION: &str = "INSERT INTO tournament_registrations (tournament_id, player_id, registered_at) VALUES (?1, ?2, ?3)";

pub struct SqliteTournamentStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteTournamentStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: Duration::from_secs(5),
        };
        let conn = store.connect().map_err(|e| StoreError::driver("open", e))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::driver("enable wal", e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::driver("create schema", e))?;
        Ok(store)
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    pub async fn create_tournament(&self, tournament: &Tournament) -> Result<(), StoreError> {
        let conn = Arc::new(Mutex::new(
            self.connect().map_err(|e| StoreError::driver("connect", e))?,
        ));
        let tournament = tournament.clone();
        blocking(conn, "create tournament", move |conn| {
            conn.execute(
                "INSERT INTO tournaments (tournament_id, max_players, version) VALUES (?1, ?2, ?3)",
                params![tournament.tournament_id, tournament.max_players, tournament.version],
            )
            .map(|_| ())
        })
        .await
    }

    pub async fn tournament(&self, tournament_id: &str) -> Result<Option<Tournament>, StoreError> {
        let conn = Arc::new(Mutex::new(
            self.connect().map_err(|e| StoreError::driver("connect", e))?,
        ));
        let tournament_id = tournament_id.to_string();
        blocking(conn, "read tournament", move |conn| {
            select_tournament(conn, &tournament_id)
        })
        .await
    }

    pub async fn registrations(&self, tournament_id: &str) -> Result<Vec<Registration>, StoreError> {
        let conn = Arc::new(Mutex::new(
            self.connect().map_err(|e| StoreError::driver("connect", e))?,
        ));
        let tournament_id = tournament_id.to_string();
        blocking(conn, "list registrations", move |conn| {
            let mut stmt = conn.prepare(
                "SELECT tournament_id, player_id, registered_at FROM tournament_registrations WHERE tournament_id = ?1 ORDER BY registered_at, player_id",
            )?;
            let rows = stmt.query_map(params![tournament_id], |row| {
                Ok(Registration {
                    tournament_id: row.get(0)?,
                    player_id: row.get(1)?,
                    registered_at: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
    }
}

fn select_tournament(conn: &Connection, tournament_id: &str) -> rusqlite::Result<Option<Tournament>> {
    conn.query_row(SELECT_TOURNAMENT, params![tournament_id], |row| {
        Ok(Tournament {
            tournament_id: tournament_id.to_string(),
            max_players: row.get(0)?,
            version: row.get(1)?,
        })
    })
    .optional()
}

fn is_busy(error: &rusqlite::Error) -> bool {
    matches!(error, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::DatabaseBusy)
}

fn is_duplicate_key(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

async fn blocking<T, F>(
    conn: Arc<Mutex<Connection>>,
    context: &'static str,
    op: F,
) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&conn.lock()))
        .await
        .map_err(|e| StoreError::Backend(format!("{context}: worker failed: {e}")))?
        .map_err(|e| StoreError::driver(context, e))
}

#[async_trait]
impl TournamentStore for SqliteTournamentStore {
    type Transaction = SqliteTransaction;

    async fn begin(&self) -> Result<SqliteTransaction, StoreError> {
        let conn = Arc::new(Mutex::new(
            self.connect().map_err(|e| StoreError::driver("connect", e))?,
        ));
        blocking(Arc::clone(&conn), "begin", |conn| conn.execute_batch("BEGIN DEFERRED")).await?;
        Ok(SqliteTransaction { conn })
    }
}

/// Closing the connection rolls back an uncommitted transaction, so dropping this
/// handle discards its writes.
pub struct SqliteTransaction {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTransaction {
    async fn run<T, F>(&self, context: &'static str, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        blocking(Arc::clone(&self.conn), context, op).await
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn read_tournament(
        &mut self,
        tournament_id: &str,
    ) -> Result<Option<Tournament>, StoreError> {
        let tournament_id = tournament_id.to_string();
        self.run("read tournament", move |conn| {
            select_tournament(conn, &tournament_id)
        })
        .await
    }

    async fn registration_exists(
        &mut self,
        tournament_id: &str,
        player_id: &str,
    ) -> Result<bool, StoreError> {
        let (tournament_id, player_id) = (tournament_id.to_string(), player_id.to_string());
        self.run("check registration", move |conn| {
            conn.query_row(
                SELECT_REGISTRATION_EXISTS,
                params![tournament_id, player_id],
                |row| row.get(0),
            )
        })
        .await
    }

    async fn count_registrations(&mut self, tournament_id: &str) -> Result<u64, StoreError> {
        let tournament_id = tournament_id.to_string();
        let count: i64 = self
            .run("count registrations", move |conn| {
                conn.query_row(COUNT_REGISTRATIONS, params![tournament_id], |row| row.get(0))
            })
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn compare_and_increment_version(
        &mut self,
        tournament_id: &str,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let tournament_id = tournament_id.to_string();
        self.run("update version", move |conn| {
            match conn.execute(UPDATE_VERSION, params![tournament_id, expected_version]) {
                Ok(rows) => Ok(rows == 1),
                Err(e) if is_busy(&e) => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn insert_registration(
        &mut self,
        registration: &Registration,
    ) -> Result<(), StoreError> {
        let row = registration.clone();
        let inserted = self
            .run("insert registration", move |conn| {
                match conn.execute(
                    INSERT_REGISTRATION,
                    params![row.tournament_id, row.player_id, row.registered_at],
                ) {
                    Ok(_) => Ok(true),
                    Err(e) if is_duplicate_key(&e) => Ok(false),
                    Err(e) => Err(e),
                }
            })
            .await?;
        if inserted {
            Ok(())
        } else {
            Err(StoreError::DuplicateRegistration {
                tournament_id: registration.tournament_id.clone(),
                player_id: registration.player_id.clone(),
            })
        }
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.run("commit", |conn| conn.execute_batch("COMMIT")).await
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.run("rollback", |conn| conn.execute_batch("ROLLBACK")).await
    }
}
