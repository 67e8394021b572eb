//! Parley CLI and REST API entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, loads configuration, initializes tracing, runs the
//! database bootstrap, then dispatches to a chat command or starts the REST
//! API server.

mod cli;
mod http;
mod state;

use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use parley_infra::config::load_config;
use parley_infra::database::Database;
use parley_observe::tracing_setup::{
    LogFormat, TracingOptions, filter_for_verbosity, init_tracing, shutdown_tracing,
};
use parley_types::config::AppConfig;
use tracing::{info, warn};

use cli::{ChatCommand, Cli, Commands};
use state::AppState;

/// Upper bound on draining in-flight requests after a shutdown signal.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).await?;

    init_tracing(&TracingOptions {
        default_filter: filter_for_verbosity(cli.verbose, cli.quiet),
        format: if config.env == "production" {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli, config).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli, mut config: AppConfig) -> anyhow::Result<()> {
    if let Commands::Init = cli.command {
        let database = Database::connect(&config.database).await?;
        let outcome = state::bootstrap(&database, &config.bootstrap).await;
        database.close().await;
        return cli::init::report(database.backend_name(), &outcome?, cli.json);
    }

    let (state, _outcome) = AppState::init(&config).await?;

    let result = match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(state.clone(), &config).await
        }

        Commands::Chat { command } => match command {
            ChatCommand::New { content } => cli::chat::new_chat(&state, &content, cli.json).await,
            ChatCommand::Send { id, content } => {
                cli::chat::send_message(&state, id, &content, cli.json).await
            }
            ChatCommand::Show { id } => cli::chat::show_chat(&state, id, cli.json).await,
            ChatCommand::List { limit, offset } => {
                cli::chat::list_chats(&state, limit, offset, cli.json).await
            }
            ChatCommand::Retry { id } => cli::chat::retry_reply(&state, id, cli.json).await,
        },

        Commands::Init => unreachable!("handled above"),
    };

    state.database.close().await;
    result
}

async fn serve(state: AppState, config: &AppConfig) -> anyhow::Result<()> {
    let addr = config.server.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Parley API listening on {} ({} database)",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan(),
        state.database.backend_name()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());
    info!(address = %addr, env = %config.env, "Server started");

    let router = http::router::build_router(state);

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    // Once shutdown starts, in-flight requests get a bounded drain window.
    let drain_deadline = async move {
        if stop_rx.wait_for(|stopping| *stopping).await.is_ok() {
            tokio::time::sleep(SHUTDOWN_DRAIN_TIMEOUT).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result?,
        () = drain_deadline => {
            warn!(
                timeout_secs = SHUTDOWN_DRAIN_TIMEOUT.as_secs(),
                "Shutdown drain timed out, dropping open connections"
            );
        }
    }

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
