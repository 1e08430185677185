//! Input normalization for display names and message bodies.
//!
//! Display names are trimmed before their limit applies; message bodies are
//! only trimmed to test for emptiness and are otherwise left untouched.
//! Truncation never splits a multi-byte character.

use crate::errors::RelayError;

/// Truncate a string to at most `max_chars` characters.
///
/// ```
/// use huddle_core::text::truncate_chars;
///
/// assert_eq!(truncate_chars("hello", 3), "hel");
/// assert_eq!(truncate_chars("ab—cd", 3), "ab—");
/// ```
#[inline]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Validate and normalize a requested display name.
///
/// Surrounding whitespace is removed, an empty result is rejected, and
/// anything past `max_chars` characters is cut off.
pub fn normalize_display_name(raw: &str, max_chars: usize) -> Result<String, RelayError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RelayError::InvalidInput {
            field: "displayName",
            reason: "must not be empty",
        });
    }
    Ok(truncate_chars(trimmed, max_chars).trim_end().to_owned())
}

/// Validate a chat message body.
///
/// Whitespace-only bodies are rejected. Accepted bodies are returned
/// verbatim, surrounding whitespace included. Bodies over `max_bytes` are
/// rejected rather than truncated so a message is never delivered in a form
/// its author did not write.
pub fn normalize_message(raw: &str, max_bytes: usize) -> Result<String, RelayError> {
    if raw.trim().is_empty() {
        return Err(RelayError::InvalidInput {
            field: "message",
            reason: "must not be empty",
        });
    }
    if raw.len() > max_bytes {
        return Err(RelayError::InvalidInput {
            field: "message",
            reason: "too long",
        });
    }
    Ok(raw.to_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
