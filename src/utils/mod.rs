//! Utility functions and helpers.

pub mod console;
pub mod http;

use std::sync::LazyLock;

use regex::Regex;

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,;]+").expect("separator pattern is valid"));

/// Split pasted AWB text on commas, semicolons and whitespace.
///
/// Empty tokens are dropped; order and repeats are preserved.
pub fn split_awb_list(text: &str) -> Vec<String> {
    SEPARATORS
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
