//! SQLite bootstrap coordinator.
//!
//! SQLite has no advisory locks, so the database write lock is the mutual
//! exclusion: `BEGIN IMMEDIATE` on a dedicated, unpooled connection takes the
//! RESERVED lock up front, and every other coordinator's `BEGIN IMMEDIATE`
//! waits on the busy timeout until it is released. Commit, rollback, or
//! dropping the connection releases it.

use std::time::Duration;

use parley_core::bootstrap::Bootstrapper;
use parley_types::bootstrap::{BOOTSTRAP_MARKER_ID, BootstrapMarker, BootstrapOutcome};
use parley_types::chat::now_micros;
use parley_types::error::BootstrapError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, warn};

use super::pool::connect_options;
use super::{format_datetime, parse_datetime};

const CREATE_MARKER_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS bootstrap_marker (
    id      INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
    ran_at  TEXT NOT NULL
)"#;

/// How long a coordinator waits for another one to release the write lock.
const LOCK_WAIT: Duration = Duration::from_secs(30);

/// SQLite-backed implementation of `Bootstrapper`.
#[derive(Clone)]
pub struct SqliteBootstrapper {
    options: SqliteConnectOptions,
}

impl SqliteBootstrapper {
    /// Coordinator for the database at `database_url`.
    pub fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        Ok(Self {
            options: connect_options(database_url)?.busy_timeout(LOCK_WAIT),
        })
    }

    async fn connect(&self) -> Result<SqliteConnection, BootstrapError> {
        self.options
            .connect()
            .await
            .map_err(|e| BootstrapError::Connection(e.to_string()))
    }

    /// Everything between `BEGIN IMMEDIATE` and `COMMIT`.
    async fn run_locked(
        conn: &mut SqliteConnection,
        script: &str,
    ) -> Result<BootstrapOutcome, BootstrapError> {
        sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(CREATE_MARKER_TABLE))
            .await
            .map_err(|e| BootstrapError::Marker(e.to_string()))?;

        if let Some(marker) = read_marker(&mut *conn).await? {
            return Ok(BootstrapOutcome::AlreadyInitialized {
                ran_at: marker.ran_at,
            });
        }

        sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(script))
            .await
            .map_err(|e| BootstrapError::Script(e.to_string()))?;

        let ran_at = now_micros();
        sqlx::query(
            "INSERT INTO bootstrap_marker (id, ran_at) VALUES (?, ?) ON CONFLICT (id) DO NOTHING",
        )
        .bind(BOOTSTRAP_MARKER_ID)
        .bind(format_datetime(&ran_at))
        .execute(&mut *conn)
        .await
        .map_err(|e| BootstrapError::Marker(e.to_string()))?;

        Ok(BootstrapOutcome::Initialized { ran_at })
    }
}

async fn read_marker(
    conn: &mut SqliteConnection,
) -> Result<Option<BootstrapMarker>, BootstrapError> {
    let ran_at: Option<String> =
        sqlx::query_scalar("SELECT ran_at FROM bootstrap_marker WHERE id = ?")
            .bind(BOOTSTRAP_MARKER_ID)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| BootstrapError::Marker(e.to_string()))?;

    ran_at
        .map(|s| {
            parse_datetime(&s)
                .map(|ran_at| BootstrapMarker { ran_at })
                .map_err(BootstrapError::Marker)
        })
        .transpose()
}

impl Bootstrapper for SqliteBootstrapper {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn ensure_initialized(&self, script: &str) -> Result<BootstrapOutcome, BootstrapError> {
        let mut conn = self.connect().await?;

        sqlx::Executor::execute(&mut conn, sqlx::raw_sql("BEGIN IMMEDIATE"))
            .await
            .map_err(|e| BootstrapError::Lock(e.to_string()))?;
        debug!("Acquired bootstrap write lock");

        let result = match Self::run_locked(&mut conn, script).await {
            Ok(outcome) => sqlx::Executor::execute(&mut conn, sqlx::raw_sql("COMMIT"))
                .await
                .map(|_| outcome)
                .map_err(|e| BootstrapError::Commit(e.to_string())),
            Err(e) => Err(e),
        };

        if result.is_err() {
            if let Err(e) = sqlx::Executor::execute(&mut conn, sqlx::raw_sql("ROLLBACK")).await {
                // Closing the connection below rolls back regardless.
                warn!(error = %e, "Bootstrap rollback failed");
            }
        }
        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close bootstrap connection");
        }

        result
    }

    async fn marker(&self) -> Result<Option<BootstrapMarker>, BootstrapError> {
        let mut conn = self.connect().await?;

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'bootstrap_marker'",
        )
        .fetch_one(&mut conn)
        .await
        .map_err(|e| BootstrapError::Marker(e.to_string()))?;

        let marker = if tables > 0 {
            read_marker(&mut conn).await?
        } else {
            None
        };

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close bootstrap connection");
        }
        Ok(marker)
    }
}
