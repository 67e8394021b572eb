//! Runtime database backend selection.
//!
//! The backend is chosen from the connection URL scheme: `sqlite:` for a
//! local file, `postgres://` or `postgresql://` for a shared server. The rest
//! of the application only sees `Database` and the enum-dispatched
//! `AnyChatRepository` / `AnyBootstrapper` it hands out.

use std::fmt;
use std::path::PathBuf;

use parley_core::bootstrap::Bootstrapper;
use parley_core::chat::repository::ChatRepository;
use parley_types::bootstrap::{BootstrapMarker, BootstrapOutcome};
use parley_types::chat::{Chat, ChatMessage};
use parley_types::config::DatabaseConfig;
use parley_types::error::{BootstrapError, RepositoryError};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::postgres::bootstrap::PgBootstrapper;
use crate::postgres::chat::PgChatRepository;
use crate::postgres::pool::{self as pg_pool, PgPoolConfig};
use crate::sqlite::bootstrap::SqliteBootstrapper;
use crate::sqlite::chat::SqliteChatRepository;
use crate::sqlite::pool::DatabasePool;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    Sqlite,
    Postgres,
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::Sqlite => write!(f, "sqlite"),
            DatabaseType::Postgres => write!(f, "postgres"),
        }
    }
}

/// Errors opening a database backend.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Only the scheme is kept; the URL may carry credentials.
    #[error("unsupported database URL scheme '{0}' (expected sqlite:, postgres:// or postgresql://)")]
    UnsupportedUrl(String),

    /// Every pooled connection to an in-memory SQLite database would see its
    /// own empty database, so the bootstrap would never be visible.
    #[error("in-memory SQLite is not supported; use a file URL like sqlite://parley.db?mode=rwc")]
    InMemorySqlite,

    #[error("failed to open {backend} database: {source}")]
    Connect {
        backend: DatabaseType,
        #[source]
        source: sqlx::Error,
    },
}

/// Detect the backend from a connection URL.
pub fn detect_database_type(database_url: &str) -> Result<DatabaseType, DatabaseError> {
    if database_url.starts_with("sqlite:") {
        if is_in_memory_sqlite(database_url) {
            return Err(DatabaseError::InMemorySqlite);
        }
        Ok(DatabaseType::Sqlite)
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://")
    {
        Ok(DatabaseType::Postgres)
    } else {
        let scheme = database_url.split(':').next().unwrap_or_default();
        Err(DatabaseError::UnsupportedUrl(scheme.to_string()))
    }
}

fn is_in_memory_sqlite(database_url: &str) -> bool {
    let rest = database_url.trim_start_matches("sqlite:").trim_start_matches("//");
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    path.is_empty()
        || path == ":memory:"
        || query.split('&').any(|pair| pair == "mode=memory")
}

/// Map an INSERT failure to the repository taxonomy.
///
/// Unique violations are `Conflict`; foreign-key violations mean the parent
/// row is missing, i.e. `NotFound`.
pub(crate) fn map_write_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepositoryError::NotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Connection
        }
        _ => RepositoryError::Query(err.to_string()),
    }
}

/// An open database, either backend.
#[derive(Clone)]
pub enum Database {
    Sqlite(DatabasePool),
    Postgres(PgPool),
}

impl Database {
    /// Open the database described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pg = PgPoolConfig {
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            ..PgPoolConfig::default()
        };
        Self::connect_url(&config.database_url(), pg).await
    }

    /// Open the database at `database_url`. `pg` only applies to PostgreSQL.
    pub async fn connect_url(database_url: &str, pg: PgPoolConfig) -> Result<Self, DatabaseError> {
        let backend = detect_database_type(database_url)?;
        debug!(backend = %backend, "Opening database");

        let db = match backend {
            DatabaseType::Sqlite => DatabasePool::new(database_url)
                .await
                .map(Database::Sqlite),
            DatabaseType::Postgres => pg_pool::connect(database_url, pg)
                .await
                .map(Database::Postgres),
        }
        .map_err(|source| DatabaseError::Connect { backend, source })?;

        info!(backend = %backend, "Database opened");
        Ok(db)
    }

    pub fn database_type(&self) -> DatabaseType {
        match self {
            Database::Sqlite(_) => DatabaseType::Sqlite,
            Database::Postgres(_) => DatabaseType::Postgres,
        }
    }

    /// Short backend name for logs and the health endpoint.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Database::Sqlite(_) => "sqlite",
            Database::Postgres(_) => "postgres",
        }
    }

    /// Initialization script used when none is configured.
    pub fn default_script_path(&self) -> PathBuf {
        match self {
            Database::Sqlite(_) => PathBuf::from("scripts/init.sqlite.sql"),
            Database::Postgres(_) => PathBuf::from("scripts/init.sql"),
        }
    }

    pub fn chat_repository(&self) -> AnyChatRepository {
        match self {
            Database::Sqlite(pool) => {
                AnyChatRepository::Sqlite(SqliteChatRepository::new(pool.clone()))
            }
            Database::Postgres(pool) => {
                AnyChatRepository::Postgres(PgChatRepository::new(pool.clone()))
            }
        }
    }

    /// Bootstrap coordinator for this database.
    ///
    /// SQLite coordinators use their own unpooled connection; PostgreSQL
    /// coordinators borrow one pooled connection for the transaction.
    pub fn bootstrapper(&self) -> Result<AnyBootstrapper, DatabaseError> {
        match self {
            Database::Sqlite(pool) => SqliteBootstrapper::new(pool.url())
                .map(AnyBootstrapper::Sqlite)
                .map_err(|source| DatabaseError::Connect {
                    backend: DatabaseType::Sqlite,
                    source,
                }),
            Database::Postgres(pool) => {
                Ok(AnyBootstrapper::Postgres(PgBootstrapper::new(pool.clone())))
            }
        }
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        let result = match self {
            Database::Sqlite(pool) => sqlx::query("SELECT 1")
                .execute(&pool.reader)
                .await
                .map(|_| ()),
            Database::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        };
        result.map_err(|e| RepositoryError::Query(e.to_string()))
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        match self {
            Database::Sqlite(pool) => pool.close().await,
            Database::Postgres(pool) => pool.close().await,
        }
    }
}

/// `ChatRepository` over whichever backend is open.
#[derive(Clone)]
pub enum AnyChatRepository {
    Sqlite(SqliteChatRepository),
    Postgres(PgChatRepository),
}

impl ChatRepository for AnyChatRepository {
    async fn create_chat(&self, chat: &Chat) -> Result<(), RepositoryError> {
        match self {
            AnyChatRepository::Sqlite(repo) => repo.create_chat(chat).await,
            AnyChatRepository::Postgres(repo) => repo.create_chat(chat).await,
        }
    }

    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        match self {
            AnyChatRepository::Sqlite(repo) => repo.save_message(message).await,
            AnyChatRepository::Postgres(repo) => repo.save_message(message).await,
        }
    }

    async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        match self {
            AnyChatRepository::Sqlite(repo) => repo.get_chat(chat_id).await,
            AnyChatRepository::Postgres(repo) => repo.get_chat(chat_id).await,
        }
    }

    async fn list_chats(&self, limit: i64, offset: i64) -> Result<Vec<Chat>, RepositoryError> {
        match self {
            AnyChatRepository::Sqlite(repo) => repo.list_chats(limit, offset).await,
            AnyChatRepository::Postgres(repo) => repo.list_chats(limit, offset).await,
        }
    }
}

/// `Bootstrapper` over whichever backend is open.
#[derive(Clone)]
pub enum AnyBootstrapper {
    Sqlite(SqliteBootstrapper),
    Postgres(PgBootstrapper),
}

impl Bootstrapper for AnyBootstrapper {
    fn backend(&self) -> &str {
        match self {
            AnyBootstrapper::Sqlite(b) => b.backend(),
            AnyBootstrapper::Postgres(b) => b.backend(),
        }
    }

    async fn ensure_initialized(&self, script: &str) -> Result<BootstrapOutcome, BootstrapError> {
        match self {
            AnyBootstrapper::Sqlite(b) => b.ensure_initialized(script).await,
            AnyBootstrapper::Postgres(b) => b.ensure_initialized(script).await,
        }
    }

    async fn marker(&self) -> Result<Option<BootstrapMarker>, BootstrapError> {
        match self {
            AnyBootstrapper::Sqlite(b) => b.marker().await,
            AnyBootstrapper::Postgres(b) => b.marker().await,
        }
    }
}
