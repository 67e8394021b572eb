//! SQLite storage layer.
//!
//! Repository and bootstrap implementations backed by SQLite with WAL mode
//! and split read/write connection pools.

use chrono::{DateTime, SecondsFormat, Utc};

pub mod bootstrap;
pub mod chat;
pub mod pool;

/// Fixed-width RFC 3339 with microseconds, so text order is time order.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid datetime '{s}': {e}"))
}

/// Schema shipped with the binary, used by tests that need real tables.
#[cfg(test)]
pub(crate) const INIT_SCRIPT: &str = include_str!("../../../../scripts/init.sqlite.sql");
