//! Strips chain-of-thought markup that some local models leak into replies.
//!
//! Best effort only: unbalanced or malformed markers pass through.

use once_cell::sync::Lazy;
use regex::Regex;

static BLOCK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?s)<think>.*?</think>[ \t]*",
        r"(?s)<thinking>.*?</thinking>[ \t]*",
        r"(?s)<thought>.*?</thought>[ \t]*",
        r"(?s)<reasoning>.*?</reasoning>[ \t]*",
        r"(?s)\[thinking\].*?\[/thinking\][ \t]*",
        r"(?s)\[thought\].*?\[/thought\][ \t]*",
        r"(?s)<!-- thinking:.*?-->[ \t]*",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static EXTRA_NEWLINES: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\n{3,}").ok());

pub fn normalize_response(raw: &str) -> String {
    let mut text = raw.to_string();
    for pattern in BLOCK_PATTERNS.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }

    let text = drop_thinking_lines(&text);

    let collapsed = match EXTRA_NEWLINES.as_ref() {
        Some(re) => re.replace_all(&text, "\n\n").into_owned(),
        None => text,
    };
    collapsed.trim().to_string()
}

/// A line opening with "thinking:" or "let me think" suppresses everything up
/// to a blank line (dropped) or a line starting with an uppercase letter (kept).
fn drop_thinking_lines(text: &str) -> String {
    let mut kept = Vec::new();
    let mut suppressing = false;

    for line in text.split('\n') {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();
        if lower.starts_with("thinking:") || lower.starts_with("let me think") {
            suppressing = true;
            continue;
        }
        if suppressing {
            if trimmed.is_empty() {
                suppressing = false;
            } else if trimmed.starts_with(|c: char| c.is_ascii_uppercase()) {
                suppressing = false;
                kept.push(line);
            }
            continue;
        }
        kept.push(line);
    }

    kept.join("\n")
}
