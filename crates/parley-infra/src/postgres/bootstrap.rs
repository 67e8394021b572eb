//! PostgreSQL bootstrap coordinator.
//!
//! Mutual exclusion is a transaction-scoped advisory lock on a fixed key:
//! `pg_advisory_xact_lock` blocks until every other holder has committed or
//! rolled back, and the server releases it with the transaction, including
//! when the session dies.

use parley_core::bootstrap::Bootstrapper;
use parley_types::bootstrap::{BOOTSTRAP_MARKER_ID, BootstrapMarker, BootstrapOutcome};
use parley_types::chat::now_micros;
use parley_types::error::BootstrapError;
use sqlx::PgPool;
use sqlx::postgres::PgConnection;
use tracing::debug;

/// Application-wide advisory lock key for the bootstrap.
pub const BOOTSTRAP_LOCK_KEY: i64 = 7_242_025;

const CREATE_MARKER_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS bootstrap_marker (
    id      INTEGER PRIMARY KEY CHECK (id = 1),
    ran_at  TIMESTAMPTZ NOT NULL
)"#;

/// PostgreSQL-backed implementation of `Bootstrapper`.
#[derive(Clone)]
pub struct PgBootstrapper {
    pool: PgPool,
}

impl PgBootstrapper {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Everything after the lock is taken, inside the same transaction.
    async fn run_locked(
        conn: &mut PgConnection,
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

        // Simple-query protocol: the script is one multi-statement unit.
        sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(script))
            .await
            .map_err(|e| BootstrapError::Script(e.to_string()))?;

        let ran_at = now_micros();
        sqlx::query(
            "INSERT INTO bootstrap_marker (id, ran_at) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
        )
        .bind(BOOTSTRAP_MARKER_ID)
        .bind(ran_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| BootstrapError::Marker(e.to_string()))?;

        Ok(BootstrapOutcome::Initialized { ran_at })
    }
}

async fn read_marker(conn: &mut PgConnection) -> Result<Option<BootstrapMarker>, BootstrapError> {
    let ran_at: Option<chrono::DateTime<chrono::Utc>> =
        sqlx::query_scalar("SELECT ran_at FROM bootstrap_marker WHERE id = $1")
            .bind(BOOTSTRAP_MARKER_ID)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| BootstrapError::Marker(e.to_string()))?;

    Ok(ran_at.map(|ran_at| BootstrapMarker { ran_at }))
}

impl Bootstrapper for PgBootstrapper {
    fn backend(&self) -> &str {
        "postgres"
    }

    async fn ensure_initialized(&self, script: &str) -> Result<BootstrapOutcome, BootstrapError> {
        // Dropping `tx` on any early return rolls back and releases the lock.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BootstrapError::Connection(e.to_string()))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(BOOTSTRAP_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| BootstrapError::Lock(e.to_string()))?;
        debug!(lock_key = BOOTSTRAP_LOCK_KEY, "Acquired bootstrap advisory lock");

        let outcome = Self::run_locked(&mut tx, script).await?;

        tx.commit()
            .await
            .map_err(|e| BootstrapError::Commit(e.to_string()))?;

        Ok(outcome)
    }

    async fn marker(&self) -> Result<Option<BootstrapMarker>, BootstrapError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| BootstrapError::Connection(e.to_string()))?;

        let exists: bool = sqlx::query_scalar("SELECT to_regclass('bootstrap_marker') IS NOT NULL")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| BootstrapError::Marker(e.to_string()))?;

        if !exists {
            return Ok(None);
        }
        read_marker(&mut conn).await
    }
}
