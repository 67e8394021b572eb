//! Fixed prompts, input validation and title cleanup for chat workflows.

use parley_types::error::ChatError;

/// Seed system message for every new chat.
pub const SYSTEM_PROMPT: &str = "You are Parley, a helpful assistant. Answer clearly and concisely. \
If you are unsure about something, say so instead of guessing.";

/// User turn appended after the first exchange to ask for a chat title.
pub const TITLE_PROMPT: &str = "Generate a short and concise title for a chat based on the user prompt. \
The title should be no more than 5 words";

/// Upper bound on user message length, in characters.
pub const MAX_CONTENT_CHARS: usize = 32_000;

/// Upper bound on a stored title, in characters.
pub const MAX_TITLE_CHARS: usize = 120;

/// Words taken from the user's message when the title completion is blank.
const FALLBACK_TITLE_WORDS: usize = 5;

/// Reject blank or oversized user content.
pub fn validate_content(content: &str) -> Result<(), ChatError> {
    if content.trim().is_empty() {
        return Err(ChatError::Validation(
            "message content must not be empty".to_string(),
        ));
    }
    let chars = content.chars().count();
    if chars > MAX_CONTENT_CHARS {
        return Err(ChatError::Validation(format!(
            "message content is {chars} characters, limit is {MAX_CONTENT_CHARS}"
        )));
    }
    Ok(())
}

/// Clean a raw title completion.
///
/// Trims whitespace and surrounding quotes. An empty result falls back to
/// the first few words of the user's message. Both paths are capped at
/// `MAX_TITLE_CHARS`.
pub fn clean_title(raw: &str, user_content: &str) -> String {
    let title = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();

    let title = if title.is_empty() {
        user_content
            .split_whitespace()
            .take(FALLBACK_TITLE_WORDS)
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        title.to_string()
    };

    truncate_chars(&title, MAX_TITLE_CHARS)
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].trim_end().to_string(),
        None => s.to_string(),
    }
}
