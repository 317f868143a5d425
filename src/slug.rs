//! Slug derivation for admin-created records.

use regex::Regex;

lazy_static::lazy_static! {
    static ref NON_SLUG_CHARS: Regex = Regex::new(r"[^a-z0-9\s-]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref HYPHEN_RUNS: Regex = Regex::new(r"-+").unwrap();
}

/// Convert a title to a URL-safe slug: lowercase, alphanumerics and hyphens.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = NON_SLUG_CHARS.replace_all(&lower, "");
    let hyphenated = WHITESPACE.replace_all(stripped.trim(), "-");
    HYPHEN_RUNS.replace_all(&hyphenated, "-").into_owned()
}

/// Disambiguate a colliding slug by appending a base-36 timestamp suffix.
pub fn with_timestamp_suffix(slug: &str) -> String {
    format!("{}-{}", slug, to_base36(chrono::Utc::now().timestamp_millis()))
}

fn to_base36(mut n: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n <= 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Acacia House"), "acacia-house");
        assert_eq!(slugify("Zanzibar by the Sea"), "zanzibar-by-the-sea");
    }

    #[test]
    fn test_slugify_strips_punctuation_and_collapses_runs() {
        assert_eq!(slugify("Mountain & Cabin Getaways!"), "mountain-cabin-getaways");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("pre--hyphenated -- title"), "pre-hyphenated-title");
    }

    #[test]
    fn test_to_base36_round_trips_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn test_timestamp_suffix_extends_original_slug() {
        let suffixed = with_timestamp_suffix("acacia-house");
        assert!(suffixed.starts_with("acacia-house-"));
        assert!(suffixed.len() > "acacia-house-".len());
        // Suffix stays in slug alphabet
        assert!(suffixed
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }
}
