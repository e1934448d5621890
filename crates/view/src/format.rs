#![forbid(unsafe_code)]

use thousands::Separable;

/// Format a count with `,` thousands separators: `1234567` -> `"1,234,567"`.
pub fn format_count(n: u64) -> String { n.separate_with_commas() }

/// Parse a rendered count back (`"1,234"` -> `1234`). Anything but digits,
/// separators and surrounding whitespace yields `None`.
pub fn parse_count(text: &str) -> Option<u64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}
