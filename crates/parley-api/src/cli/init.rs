//! `parley init`: report what the database bootstrap did.

use anyhow::Result;
use console::style;
use parley_types::bootstrap::BootstrapOutcome;

/// Print the bootstrap outcome for `backend`.
pub fn report(backend: &str, outcome: &BootstrapOutcome, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "backend": backend,
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    match outcome {
        BootstrapOutcome::Initialized { ran_at } => println!(
            "  {} Initialized {} database at {}",
            style("✓").green().bold(),
            style(backend).cyan(),
            style(ran_at.format("%Y-%m-%d %H:%M:%S UTC")).dim()
        ),
        BootstrapOutcome::AlreadyInitialized { ran_at } => println!(
            "  {} {} database already initialized (at {})",
            style("i").blue().bold(),
            style(backend).cyan(),
            style(ran_at.format("%Y-%m-%d %H:%M:%S UTC")).dim()
        ),
        BootstrapOutcome::Skipped => println!(
            "  {} No initialization script found, nothing to do",
            style("!").yellow().bold()
        ),
    }
    println!();
    Ok(())
}
