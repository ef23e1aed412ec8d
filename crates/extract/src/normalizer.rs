use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));

/// Literal spellings the completion service uses for "no value".
const PLACEHOLDERS: &[&str] = &["na", "n/a", "n.a.", "n.a"];

/// True for an empty field or one of the "not available" placeholders.
pub fn is_placeholder(field: &str) -> bool {
    let trimmed = field.trim();
    trimmed.is_empty()
        || PLACEHOLDERS
            .iter()
            .any(|p| trimmed.eq_ignore_ascii_case(p))
}

/// Trim, collapse whitespace runs, and map placeholders to `None`.
pub fn normalize_field(field: &str) -> Option<String> {
    if is_placeholder(field) {
        return None;
    }
    let collapsed = WHITESPACE.replace_all(field.trim(), " ");
    Some(collapsed.into_owned())
}
