//! Content-addressed identifiers and small text helpers shared by every stage.

use sha2::{Digest, Sha256};

/// Lower-case ASCII slug; runs of anything else collapse to a single `-`.
/// Empty input yields `item`.
pub fn slugify(text: &str) -> String {
    let slug = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() { "item".into() } else { slug }
}

/// Hex SHA-256 of `text`, truncated to `len` characters.
pub fn short_hash(text: &str, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..len.min(hex.len())].to_string()
}

/// Disclosure id for already-normalized disclosure text.
pub fn disclosure_id(normalized_text: &str) -> String {
    format!("disc:{}", short_hash(normalized_text, 12))
}

/// Asset id for a resolved image URL.
pub fn asset_id(url: &str) -> String {
    format!("img:{}", short_hash(url, 12))
}

/// Collapse all whitespace (including non-breaking and narrow spaces) to
/// single ASCII spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split(char::is_whitespace)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Towing & Trailering"), "towing-trailering");
        assert_eq!(slugify("  High Country  "), "high-country");
        assert_eq!(slugify("Silverado 1500"), "silverado-1500");
    }

    #[test]
    fn slugify_empty_falls_back() {
        assert_eq!(slugify(""), "item");
        assert_eq!(slugify("—"), "item");
    }

    #[test]
    fn hashes_are_stable_and_prefixed() {
        let a = disclosure_id("Requires available equipment.");
        let b = disclosure_id("Requires available equipment.");
        assert_eq!(a, b);
        assert!(a.starts_with("disc:"));
        assert_eq!(a.len(), "disc:".len() + 12);
        assert_ne!(asset_id("https://a/x.jpg"), asset_id("https://a/y.jpg"));
    }

    #[test]
    fn collapse_handles_nbsp() {
        assert_eq!(collapse_whitespace(" CAD\u{a0}$36,733 \n as\u{202f}shown "), "CAD $36,733 as shown");
    }
}
