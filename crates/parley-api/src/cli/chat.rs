//! Chat CLI commands: new, send, show, list, retry.
//!
//! Each command calls the same orchestrator the REST API uses and prints
//! either styled text or pretty JSON (`--json`).

use anyhow::Result;
use console::style;
use parley_types::chat::{Chat, ChatMessage, MessageRole};
use parley_types::error::ChatError;
use uuid::Uuid;

use crate::state::AppState;

/// Start a new chat and print its transcript.
///
/// # Examples
///
/// ```bash
/// parley chat new "What is a B-tree?"
/// parley chat new "Hello" --json
/// ```
pub async fn new_chat(state: &AppState, content: &str, json: bool) -> Result<()> {
    let chat = state.orchestrator.start_new_chat(content).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chat)?);
        return Ok(());
    }

    print_chat(&chat);
    println!(
        "  {} Continue with: {}",
        style("→").dim(),
        style(format!("parley chat send {} \"...\"", chat.id)).yellow()
    );
    println!();
    Ok(())
}

/// Send a message to an existing chat and print the reply.
pub async fn send_message(state: &AppState, id: Uuid, content: &str, json: bool) -> Result<()> {
    match state.orchestrator.continue_chat(id, content).await {
        Ok(reply) => print_reply(&reply, json),
        Err(err @ ChatError::Unanswered { .. }) => {
            print_retry_hint(id);
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Answer the chat's last unanswered user message.
pub async fn retry_reply(state: &AppState, id: Uuid, json: bool) -> Result<()> {
    let reply = state.orchestrator.retry_reply(id).await?;
    print_reply(&reply, json)
}

/// Print a chat with its full transcript.
pub async fn show_chat(state: &AppState, id: Uuid, json: bool) -> Result<()> {
    let chat = state.orchestrator.load_chat(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chat)?);
        return Ok(());
    }

    print_chat(&chat);
    Ok(())
}

/// List chats, newest first.
pub async fn list_chats(state: &AppState, limit: i64, offset: i64, json: bool) -> Result<()> {
    let chats = state.orchestrator.list_chats(limit, offset).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chats)?);
        return Ok(());
    }

    println!();
    if chats.is_empty() {
        println!(
            "  {} No chats yet. Start one with: {}",
            style("i").blue().bold(),
            style("parley chat new \"Hello\"").yellow()
        );
        println!();
        return Ok(());
    }

    for chat in &chats {
        println!(
            "  {}  {}  {}",
            style(chat.id).dim(),
            style(chat.created_at.format("%Y-%m-%d %H:%M")).dim(),
            style(chat.title.as_deref().unwrap_or("(untitled)")).cyan().bold()
        );
    }
    println!();
    println!(
        "  {} chat(s){}",
        chats.len(),
        if offset > 0 {
            format!(", starting at {offset}")
        } else {
            String::new()
        }
    );
    println!();
    Ok(())
}

fn print_chat(chat: &Chat) {
    println!();
    println!(
        "  {} {}",
        style(chat.title.as_deref().unwrap_or("(untitled)")).cyan().bold(),
        style(format!("[{}]", chat.model)).dim()
    );
    println!("  {}", style(chat.id).dim());
    println!();

    for message in &chat.messages {
        // The system prompt is the same for every chat.
        if message.role == MessageRole::System {
            continue;
        }
        print_message(message);
    }
}

fn print_message(message: &ChatMessage) {
    let label = match message.role {
        MessageRole::User => style("you").green().bold(),
        MessageRole::Assistant => style("assistant").magenta().bold(),
        MessageRole::System => style("system").dim(),
    };
    println!("  {label}");
    for line in message.content.lines() {
        println!("    {line}");
    }
    println!();
}

fn print_reply(reply: &ChatMessage, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reply)?);
    } else {
        println!();
        print_message(reply);
    }
    Ok(())
}

fn print_retry_hint(id: Uuid) {
    eprintln!();
    eprintln!(
        "  {} Your message was saved but not answered. Retry with: {}",
        style("!").yellow().bold(),
        style(format!("parley chat retry {id}")).yellow()
    );
    eprintln!();
}
