//! Bounded PostgreSQL connection pool.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Pool sizing for a PostgreSQL backend.
#[derive(Debug, Clone, Copy)]
pub struct PgPoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PgPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 30,
            min_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Open a pool against `database_url`.
pub async fn connect(database_url: &str, config: PgPoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_config() {
        let config = PgPoolConfig::default();
        assert_eq!(config.max_connections, 30);
        assert_eq!(config.min_connections, 5);
    }

    #[tokio::test]
    #[ignore = "requires PARLEY_TEST_POSTGRES_URL"]
    async fn test_connect_and_ping() {
        let pool = connect(&crate::postgres::test_database_url(), PgPoolConfig::default())
            .await
            .unwrap();
        let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
        assert_eq!(one, 1);
    }
}
