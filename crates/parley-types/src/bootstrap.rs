//! One-time database bootstrap types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed key of the single bootstrap marker row.
pub const BOOTSTRAP_MARKER_ID: i32 = 1;

/// The persisted fact that the initialization script has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapMarker {
    pub ran_at: DateTime<Utc>,
}

/// What a bootstrap attempt did.
///
/// Each process learns whether initialization happened from this value (or
/// from the marker row), never from process-global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BootstrapOutcome {
    /// No initialization script was found; nothing was locked or written.
    Skipped,
    /// Another process (or an earlier start) already ran the script.
    AlreadyInitialized { ran_at: DateTime<Utc> },
    /// This call ran the script and wrote the marker.
    Initialized { ran_at: DateTime<Utc> },
}

impl BootstrapOutcome {
    /// Whether this call executed the initialization script.
    pub fn ran_script(&self) -> bool {
        matches!(self, BootstrapOutcome::Initialized { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serde_tagging() {
        let json = serde_json::to_string(&BootstrapOutcome::Skipped).unwrap();
        assert_eq!(json, r#"{"status":"skipped"}"#);

        let ran_at = Utc::now();
        let json = serde_json::to_value(BootstrapOutcome::Initialized { ran_at }).unwrap();
        assert_eq!(json["status"], "initialized");
    }

    #[test]
    fn test_ran_script() {
        let ran_at = Utc::now();
        assert!(BootstrapOutcome::Initialized { ran_at }.ran_script());
        assert!(!BootstrapOutcome::AlreadyInitialized { ran_at }.ran_script());
        assert!(!BootstrapOutcome::Skipped.ran_script());
    }
}
