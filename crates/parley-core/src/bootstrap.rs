//! One-time database bootstrap: the `Bootstrapper` port and its runner.
//!
//! A `Bootstrapper` runs an initialization script at most once per database,
//! no matter how many processes race to start against it. Implementations
//! (parley-infra) hold a database-wide, transaction-scoped lock while they
//! check for the marker row, run the script, and write the marker, so the
//! check and the write can never interleave with another process.
//!
//! `run_bootstrap` is the startup entry point: it reads the script from disk,
//! skips everything if the file does not exist, and bounds the whole run
//! with a timeout.

use std::path::Path;
use std::time::Duration;

use parley_types::bootstrap::{BootstrapMarker, BootstrapOutcome};
use parley_types::error::BootstrapError;
use tracing::{debug, info};

/// Coordinator that executes an initialization script exactly once.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait Bootstrapper: Send + Sync {
    /// Backend name for logs (e.g., "sqlite", "postgres").
    fn backend(&self) -> &str;

    /// Run `script` unless the marker row says it already ran.
    ///
    /// Safe to call concurrently from independent processes sharing one
    /// database. On any error the transaction is rolled back, the lock is
    /// released and the marker stays absent, so a later call can retry.
    fn ensure_initialized(
        &self,
        script: &str,
    ) -> impl std::future::Future<Output = Result<BootstrapOutcome, BootstrapError>> + Send;

    /// The marker row, if the script has run. `None` also when the marker
    /// table does not exist yet.
    fn marker(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<BootstrapMarker>, BootstrapError>> + Send;
}

/// Read the initialization script. A missing file is `Ok(None)`.
pub async fn load_script(path: &Path) -> Result<Option<String>, BootstrapError> {
    match tokio::fs::read_to_string(path).await {
        Ok(script) => Ok(Some(script)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BootstrapError::ReadScript {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

/// Load the script at `script_path` and hand it to the bootstrapper.
///
/// Returns `BootstrapOutcome::Skipped` without touching the database when
/// the file does not exist. The whole run, including waiting for another
/// process to release the lock, is bounded by `timeout`.
#[tracing::instrument(
    name = "bootstrap",
    skip(bootstrapper, script_path),
    fields(backend = bootstrapper.backend(), script = %script_path.display())
)]
pub async fn run_bootstrap<B: Bootstrapper>(
    bootstrapper: &B,
    script_path: &Path,
    timeout: Duration,
) -> Result<BootstrapOutcome, BootstrapError> {
    let run = async {
        let Some(script) = load_script(script_path).await? else {
            info!("No initialization script found, skipping bootstrap");
            return Ok(BootstrapOutcome::Skipped);
        };

        debug!(bytes = script.len(), "Loaded initialization script");
        let outcome = bootstrapper.ensure_initialized(&script).await?;

        match &outcome {
            BootstrapOutcome::Initialized { ran_at } => {
                info!(ran_at = %ran_at, "Initialization script executed");
            }
            BootstrapOutcome::AlreadyInitialized { ran_at } => {
                info!(ran_at = %ran_at, "Database already initialized");
            }
            BootstrapOutcome::Skipped => {}
        }
        Ok(outcome)
    };

    tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| BootstrapError::Timeout {
            timeout_secs: timeout.as_secs(),
        })?
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use tokio::sync::Mutex;

    use super::*;

    /// In-process stand-in: a mutex plays the database lock.
    #[derive(Clone, Default)]
    struct MockBootstrapper {
        marker: Arc<Mutex<Option<BootstrapMarker>>>,
        runs: Arc<AtomicUsize>,
        delay: Option<Duration>,
    }

    impl Bootstrapper for MockBootstrapper {
        fn backend(&self) -> &str {
            "mock"
        }

        async fn ensure_initialized(
            &self,
            _script: &str,
        ) -> Result<BootstrapOutcome, BootstrapError> {
            let mut marker = self.marker.lock().await;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(existing) = marker.as_ref() {
                return Ok(BootstrapOutcome::AlreadyInitialized {
                    ran_at: existing.ran_at,
                });
            }
            self.runs.fetch_add(1, Ordering::SeqCst);
            let ran_at = Utc::now();
            *marker = Some(BootstrapMarker { ran_at });
            Ok(BootstrapOutcome::Initialized { ran_at })
        }

        async fn marker(&self) -> Result<Option<BootstrapMarker>, BootstrapError> {
            Ok(self.marker.lock().await.clone())
        }
    }

    fn script_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "CREATE TABLE t(x int);").unwrap();
        file
    }

    #[tokio::test]
    async fn test_missing_script_skips() {
        let dir = tempfile::tempdir().unwrap();
        let bootstrapper = MockBootstrapper::default();

        let outcome = run_bootstrap(
            &bootstrapper,
            &dir.path().join("absent.sql"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(outcome, BootstrapOutcome::Skipped);
        assert_eq!(bootstrapper.runs.load(Ordering::SeqCst), 0);
        assert!(bootstrapper.marker().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory exists but cannot be read as a file.
        let err = load_script(dir.path()).await.unwrap_err();
        assert!(matches!(err, BootstrapError::ReadScript { .. }));
    }

    #[tokio::test]
    async fn test_second_run_reports_already_initialized() {
        let file = script_file();
        let bootstrapper = MockBootstrapper::default();

        let first = run_bootstrap(&bootstrapper, file.path(), Duration::from_secs(5))
            .await
            .unwrap();
        let second = run_bootstrap(&bootstrapper, file.path(), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(first.ran_script());
        let BootstrapOutcome::Initialized { ran_at } = first else {
            unreachable!()
        };
        assert_eq!(second, BootstrapOutcome::AlreadyInitialized { ran_at });
        assert_eq!(bootstrapper.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_runs_execute_once() {
        let file = script_file();
        let bootstrapper = MockBootstrapper::default();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let b = bootstrapper.clone();
            let path = file.path().to_path_buf();
            handles.push(tokio::spawn(async move {
                run_bootstrap(&b, &path, Duration::from_secs(5)).await
            }));
        }

        let mut initialized = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().ran_script() {
                initialized += 1;
            }
        }
        assert_eq!(initialized, 1);
        assert_eq!(bootstrapper.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout() {
        let file = script_file();
        let bootstrapper = MockBootstrapper {
            delay: Some(Duration::from_secs(10)),
            ..MockBootstrapper::default()
        };

        let err = run_bootstrap(&bootstrapper, file.path(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Timeout { .. }));
        assert!(bootstrapper.marker().await.unwrap().is_none());
    }
}
