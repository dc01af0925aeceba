// Output formatting for the CLI: text helpers plus colored terminal display.

pub mod terminal;

use chrono::{DateTime, Local, Utc};

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Counts characters, not bytes, so multi-byte text is never split.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

/// "Just now", "5m ago", "3h ago", or the local date for anything older
/// than a day.
pub fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - at;
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else {
        at.with_timezone(&Local).format("%Y-%m-%d").to_string()
    }
}

/// Thousands separators: 12345 -> "12,345".
pub fn format_points(points: u32) -> String {
    let digits = points.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Time left before a post expires, e.g. "23h left" or "12m left".
pub fn format_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let left = expires_at - now;
    if left.num_seconds() <= 0 {
        "expired".to_string()
    } else if left.num_hours() >= 1 {
        format!("{}h left", left.num_hours())
    } else {
        format!("{}m left", left.num_minutes().max(1))
    }
}
