//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros. Chat commands follow a noun-verb pattern
//! (`parley chat new`, `parley chat list`).

pub mod chat;
pub mod init;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Chat transcripts backed by an OpenAI-compatible completion API.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the TOML config file (default: ./parley.toml).
    #[arg(long, global = true, env = "PARLEY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all log output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More log output (-v debug, -vv trace for parley, -vvv everything).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Address to bind (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config).
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Run the database bootstrap and report what it did.
    Init,

    /// Work with chats.
    Chat {
        #[command(subcommand)]
        command: ChatCommand,
    },
}

#[derive(Subcommand)]
pub enum ChatCommand {
    /// Start a new chat with a first message.
    New {
        /// The first user message.
        content: String,
    },

    /// Send a message to an existing chat.
    Send {
        /// Chat id.
        id: Uuid,
        /// The user message.
        content: String,
    },

    /// Show a chat and its transcript.
    Show {
        /// Chat id.
        id: Uuid,
    },

    /// List chats, newest first.
    #[command(alias = "ls")]
    List {
        /// Maximum number of chats.
        #[arg(long, default_value_t = 50)]
        limit: i64,

        /// Number of chats to skip.
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Answer a chat's last unanswered message.
    Retry {
        /// Chat id.
        id: Uuid,
    },
}
