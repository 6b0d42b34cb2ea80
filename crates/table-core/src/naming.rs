//! Row key sanitizing.

/// Characters that cannot appear in a row key.
const INVALID_KEY_CHARS: &[char] = &['"', '\'', ',', '\n', '\r', '\t'];

/// Turn a raw key value into a stable row key.
///
/// Trims surrounding whitespace and strips characters that cannot form a
/// symbolic name. Returns `None` when nothing usable is left, or when the
/// result spells `None`.
pub fn make_valid_name(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !INVALID_KEY_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(cleaned.to_string())
    }
}
