//! Identifier markers embedded in test display names.
//!
//! A marker is the literal prefix `@T` immediately followed by an opaque
//! alphanumeric token, e.g. `Login Works @Tc51dd44d`. Matching is exact and
//! case-sensitive, so tag-like words such as `@tag` are not markers.

use regex::Regex;
use std::sync::LazyLock;

/// Literal prefix that opens every marker.
pub const MARKER_PREFIX: &str = "@T";

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@T([0-9A-Za-z]+)").expect("marker pattern is valid"));

// Leading whitespace is consumed with the marker so "A @T1 B" strips to "A B".
static MARKER_WITH_GAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*@T[0-9A-Za-z]+").expect("marker pattern is valid"));

/// Return the token of the last marker in `title`, without the prefix.
///
/// Earlier markers are tolerated and ignored; the last one is authoritative.
pub fn extract_identifier(title: &str) -> Option<&str> {
    MARKER_RE
        .captures_iter(title)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Remove every marker from `title` and trim the result.
pub fn strip_identifiers(title: &str) -> String {
    MARKER_WITH_GAP_RE.replace_all(title, "").trim().to_string()
}

/// Whether `title` carries at least one marker.
pub fn has_identifier(title: &str) -> bool {
    MARKER_RE.is_match(title)
}

/// Normalize a registry identifier into marker form.
///
/// The registry hands out ids that already carry the prefix (`@Tc51dd44d`);
/// bare tokens are prefixed so the written name is always recognizable.
pub fn to_marker(identifier: &str) -> String {
    let identifier = identifier.trim();
    if identifier.starts_with(MARKER_PREFIX) {
        identifier.to_string()
    } else {
        format!("{MARKER_PREFIX}{identifier}")
    }
}

/// Append a marker to a display name, the way the rewriter does on disk.
pub fn with_identifier(title: &str, identifier: &str) -> String {
    format!("{} {}", title, to_marker(identifier))
}
