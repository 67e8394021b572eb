//! Application state wiring the orchestrator to its concrete adapters.
//!
//! The orchestrator is generic over its store and completion client;
//! AppState pins it to the runtime-selected database and the
//! OpenAI-compatible client. Used by both CLI commands and REST handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parley_core::bootstrap::run_bootstrap;
use parley_core::chat::service::ChatOrchestrator;
use parley_infra::database::{AnyChatRepository, Database};
use parley_infra::llm::openai_compat::OpenAiCompatibleClient;
use parley_types::bootstrap::BootstrapOutcome;
use parley_types::config::{AppConfig, BootstrapConfig};

/// Orchestrator pinned to the infra implementations.
pub type ConcreteOrchestrator = ChatOrchestrator<AnyChatRepository, OpenAiCompatibleClient>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub database: Database,
}

impl AppState {
    pub fn new(database: Database, client: OpenAiCompatibleClient, model: &str) -> Self {
        let orchestrator = ChatOrchestrator::new(database.chat_repository(), client, model);
        Self {
            orchestrator: Arc::new(orchestrator),
            database,
        }
    }

    /// Open the database, run the bootstrap, then wire the orchestrator.
    ///
    /// No chat operation can run before the bootstrap has finished; a
    /// bootstrap failure aborts startup.
    pub async fn init(config: &AppConfig) -> anyhow::Result<(Self, BootstrapOutcome)> {
        let database = Database::connect(&config.database).await?;
        let outcome = bootstrap(&database, &config.bootstrap).await?;

        let client = OpenAiCompatibleClient::from_config(&config.llm)
            .context("failed to build completion client")?;

        Ok((Self::new(database, client, &config.llm.model), outcome))
    }
}

/// Run the one-time initialization script against `database`.
pub async fn bootstrap(
    database: &Database,
    config: &BootstrapConfig,
) -> anyhow::Result<BootstrapOutcome> {
    let script_path = config
        .script_path
        .clone()
        .unwrap_or_else(|| database.default_script_path());
    let bootstrapper = database.bootstrapper()?;

    run_bootstrap(
        &bootstrapper,
        &script_path,
        Duration::from_secs(config.timeout_secs),
    )
    .await
    .with_context(|| format!("database bootstrap failed ({})", database.backend_name()))
}
