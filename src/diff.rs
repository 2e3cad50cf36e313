//! Deterministic text diffs between two JSON values.

use crossterm::style::Stylize;
use serde_json::{Map, Value};
use similar::TextDiff;

/// Copy of `value` with every object's keys in lexicographic order.
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sort_keys(v))).collect::<Map<_, _>>())
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Two-space pretty JSON with sorted keys and a trailing newline.
pub fn pretty_sorted(value: &Value) -> String {
    // serializing a Value cannot fail
    let mut text = serde_json::to_string_pretty(&sort_keys(value)).unwrap_or_default();
    text.push('\n');
    text
}

/// Unified diff of the key-sorted renderings; empty when they render the same.
pub fn unified_diff(original: &Value, proposed: &Value, from_label: &str, to_label: &str) -> String {
    let old = pretty_sorted(original);
    let new = pretty_sorted(proposed);
    if old == new {
        return String::new();
    }
    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .context_radius(3)
        .header(from_label, to_label)
        .to_string()
}

/// Colour diff lines for a terminal.
pub fn paint(diff: &str) -> String {
    let mut out = String::with_capacity(diff.len());
    for line in diff.lines() {
        let styled = if line.starts_with("+++") || line.starts_with("---") {
            line.bold().to_string()
        } else if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else if line.starts_with("@@") {
            line.cyan().to_string()
        } else {
            line.to_string()
        };
        out.push_str(&styled);
        out.push('\n');
    }
    out
}
