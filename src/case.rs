//! Identifier case helpers: module titles, column labels and the `<Entity>ID` convention.

use regex::Regex;
use std::sync::OnceLock;

/// Split a CamelCase or snake_case identifier into space separated words.
/// e.g. "ResourceKey" -> "Resource Key", "street_address" -> "street address"
pub fn split_words(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            out.push(' ');
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            // Acronym runs stay together: "FooID" -> "Foo ID", "HTTPServer" -> "HTTP Server".
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uppercase the first character of every word.
pub fn ucwords(s: &str) -> String {
    s.split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title for a module type: "ResourceKey" -> "Resource Key", "user_role" -> "User Role".
pub fn title_from_type(module_type: &str) -> String {
    ucwords(&split_words(module_type))
}

/// Label for a column: "FirstName" -> "First Name".
pub fn column_label(name: &str) -> String {
    split_words(name)
}

fn foreign_key_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(.+?)id$").ok()).as_ref()
}

/// Entity prefix of an `<Entity>ID` shaped column name, matched case-insensitively.
/// e.g. "RoleID" -> Some("Role"), "Name" -> None
pub fn foreign_key_entity(column: &str) -> Option<&str> {
    foreign_key_pattern()?
        .captures(column)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Escape text for an HTML attribute or text node.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Escape text for a single-quoted JavaScript string literal inside a script tag.
pub fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('<', "\\x3C")
}
