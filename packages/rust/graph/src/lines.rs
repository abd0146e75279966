//! Ordered, line-level deduplicating union of paragraph lists.
//!
//! Each line remembers its relative position in the list it came from.
//! Merging sorts the union by (position, text) before folding duplicates,
//! so the result does not depend on which side was merged first.

use serde::{Deserialize, Serialize};

use pagegraph_shared::collapse_whitespace;

/// Positions are stored as fractions of this scale.
pub const POSITION_SCALE: u32 = 10_000;

/// Shortest key allowed to match another line by prefix.
const MIN_PREFIX_CHARS: usize = 12;

const FOOTNOTE_MARKERS: &[char] = &[
    '*', '†', '‡', '§', '¶', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹', '⁰',
];

/// One paragraph with its relative position in its source list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLine {
    pub text: String,
    pub position: u32,
}

/// Positioned, deduplicated lines from an ordered list of texts.
pub fn lines_from_texts<S: AsRef<str>>(texts: &[S]) -> Vec<SectionLine> {
    let len = texts.len().max(1) as u64;
    let lines: Vec<SectionLine> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| SectionLine {
            text: collapse_whitespace(t.as_ref()),
            position: (i as u64 * u64::from(POSITION_SCALE) / len) as u32,
        })
        .collect();
    merge_lines(&[], &lines)
}

/// Comparison key: whitespace collapsed, trailing punctuation and footnote
/// markers stripped.
pub fn line_key(text: &str) -> String {
    collapse_whitespace(text)
        .trim_end_matches(|c: char| {
            c.is_whitespace() || FOOTNOTE_MARKERS.contains(&c) || matches!(c, '.' | ',' | ';' | ':' | '!' | '?')
        })
        .to_string()
}

fn keys_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.chars().count() >= MIN_PREFIX_CHARS
        && long.starts_with(short)
        && long[short.len()..]
            .chars()
            .next()
            .is_some_and(|c| !c.is_alphanumeric())
}

/// Longer text wins; equal lengths resolve to the lexicographically smaller.
pub fn pick_longer(a: &str, b: &str) -> String {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la > lb || (la == lb && a <= b) {
        a.to_string()
    } else {
        b.to_string()
    }
}

/// Ordered union of two line lists with line-level dedup.
pub fn merge_lines(existing: &[SectionLine], incoming: &[SectionLine]) -> Vec<SectionLine> {
    let mut all: Vec<&SectionLine> = existing.iter().chain(incoming).collect();
    all.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.text.cmp(&b.text)));

    let mut kept: Vec<(String, SectionLine)> = Vec::new();
    for line in all {
        let key = line_key(&line.text);
        if key.is_empty() {
            continue;
        }
        match kept.iter_mut().find(|(k, _)| keys_match(k, &key)) {
            Some((k, existing)) => {
                existing.text = pick_longer(&existing.text, &line.text);
                existing.position = existing.position.min(line.position);
                *k = line_key(&existing.text);
            }
            None => kept.push((key, line.clone())),
        }
    }

    let mut out: Vec<SectionLine> = kept.into_iter().map(|(_, l)| l).collect();
    out.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.text.cmp(&b.text)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[SectionLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn keys_ignore_trailing_markers() {
        assert_eq!(line_key("Up to 13,300 lbs.* "), "Up to 13,300 lbs");
        assert_eq!(line_key("Best-in-class towing†¹"), "Best-in-class towing");
    }

    #[test]
    fn longer_line_wins_on_prefix() {
        let a = lines_from_texts(&["Up to 13,300 lbs of max trailering."]);
        let b = lines_from_texts(&["Up to 13,300 lbs of max trailering. Requires 6.2L V8."]);
        let merged = merge_lines(&a, &b);
        assert_eq!(texts(&merged), vec!["Up to 13,300 lbs of max trailering. Requires 6.2L V8."]);
    }

    #[test]
    fn short_prefixes_do_not_collapse() {
        let merged = lines_from_texts(&["LT", "LT Trail Boss"]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_is_commutative_and_idempotent() {
        let a = lines_from_texts(&["Intro line here.", "Towing package included.", "Closing."]);
        let b = lines_from_texts(&["Intro line here", "Trailer camera system.", "Closing."]);

        let ab = merge_lines(&a, &b);
        let ba = merge_lines(&b, &a);
        assert_eq!(ab, ba);
        assert_eq!(merge_lines(&ab, &ab), ab);
        assert_eq!(merge_lines(&a, &a), a);
        assert_eq!(ab.first().map(|l| l.text.as_str()), Some("Intro line here."));
        assert_eq!(ab.last().map(|l| l.text.as_str()), Some("Closing."));
        assert_eq!(ab.len(), 4);
    }

    #[test]
    fn duplicates_within_one_list_collapse() {
        let lines = lines_from_texts(&["Same  text.", "Same text.", ""]);
        assert_eq!(texts(&lines), vec!["Same text."]);
    }
}
