//! Substring trigger matching.

use crate::store::Pattern;

/// Lowercase and trim; the canonical form of both triggers and messages.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// First pattern, in the given order, whose trigger occurs in `message`.
///
/// `patterns` is expected in match-priority order (see
/// [`Store::visible_patterns`](crate::store::Store::visible_patterns)).
/// Empty triggers never match.
pub fn first_match<'a>(message: &str, patterns: &'a [Pattern]) -> Option<&'a Pattern> {
    let message = normalize(message);
    patterns
        .iter()
        .find(|p| !p.trigger.is_empty() && message.contains(p.trigger.as_str()))
}
