//! Text cleaning pipeline for embedding documents.
//!
//! Each pass is a function `&str -> String` applied in sequence:
//! line dedup, footnote marker stripping, disclosure cue, unit augmentation.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use pagegraph_shared::collapse_whitespace;

const LB_TO_KG: f64 = 0.45359237;
const MI_TO_KM: f64 = 1.609344;

/// Settings for one run of the pipeline.
#[derive(Debug, Clone)]
pub struct CleanOptions<'a> {
    /// Cue appended when `has_disclosures` is set.
    pub disclosure_cue: &'a str,
    pub has_disclosures: bool,
    /// Characters around a measurement searched for an existing conversion.
    pub unit_window: usize,
}

/// Run the full cleaning pipeline.
pub fn clean_text(text: &str, opts: &CleanOptions<'_>) -> String {
    let mut result = text.to_string();

    result = dedupe_lines(&result);
    result = strip_footnote_markers(&result);
    result = append_disclosure_cue(&result, opts.disclosure_cue, opts.has_disclosures);
    result = augment_units(&result, opts.unit_window);

    result
}

/// Line passes only, for paragraphs that are assembled into chunks later.
pub fn clean_lines(lines: &[String], unit_window: usize) -> Vec<String> {
    let joined = lines.join("\n");
    let cleaned = augment_units(&strip_footnote_markers(&dedupe_lines(&joined)), unit_window);
    cleaned.lines().map(String::from).collect()
}

// ---------------------------------------------------------------------------
// Pass 1: Line dedup
// ---------------------------------------------------------------------------

/// Drop blank lines and lines equal to an earlier one after whitespace
/// normalization.
pub fn dedupe_lines(text: &str) -> String {
    let mut seen = HashSet::new();
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty() && seen.insert(line.clone()))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Footnote markers
// ---------------------------------------------------------------------------

/// Remove stray asterisk/dagger markers and superscript digits left at the
/// start or end of a line.
pub fn strip_footnote_markers(text: &str) -> String {
    static STRAY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[*†‡]+").expect("valid regex"));
    const EDGE: &[char] = &[
        '*', '†', '‡', '§', '¶', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹', '⁰',
    ];

    text.lines()
        .map(|line| {
            let stripped = STRAY_RE.replace_all(line, " ");
            let trimmed = stripped.trim_matches(|c: char| c.is_whitespace() || EDGE.contains(&c));
            collapse_whitespace(trimmed)
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Disclosure cue
// ---------------------------------------------------------------------------

pub fn append_disclosure_cue(text: &str, cue: &str, has_disclosures: bool) -> String {
    if !has_disclosures || cue.is_empty() || text.contains(cue) {
        return text.to_string();
    }
    if text.is_empty() {
        cue.to_string()
    } else {
        format!("{text}\n{cue}")
    }
}

// ---------------------------------------------------------------------------
// Pass 4: Unit augmentation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Pound,
    Kilogram,
    Mile,
    Kilometre,
}

impl Unit {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "lb" | "lbs" | "pound" | "pounds" => Some(Self::Pound),
            "kg" | "kgs" | "kilogram" | "kilograms" => Some(Self::Kilogram),
            "mi" | "mile" | "miles" => Some(Self::Mile),
            "km" | "kilometre" | "kilometres" | "kilometer" | "kilometers" => Some(Self::Kilometre),
            _ => None,
        }
    }

    /// Target unit label and conversion factor.
    fn convert(self, value: f64) -> (f64, &'static str) {
        match self {
            Self::Pound => (value * LB_TO_KG, "kg"),
            Self::Kilogram => (value / LB_TO_KG, "lb"),
            Self::Mile => (value * MI_TO_KM, "km"),
            Self::Kilometre => (value / MI_TO_KM, "mi"),
        }
    }

    fn complement_re(self) -> &'static Regex {
        static KG_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)\b(kg|kgs|kilograms?)\b").expect("valid regex"));
        static LB_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)\b(lbs?|pounds?)\b").expect("valid regex"));
        static KM_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?i)\b(km|kilometres?|kilometers?)\b").expect("valid regex")
        });
        static MI_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)\b(mi|miles?)\b").expect("valid regex"));
        match self {
            Self::Pound => &KG_RE,
            Self::Kilogram => &LB_RE,
            Self::Mile => &KM_RE,
            Self::Kilometre => &MI_RE,
        }
    }
}

/// Values of 100 and up: no decimals, thousands separators. Below: one decimal.
pub fn format_quantity(value: f64) -> String {
    if value >= 100.0 {
        let digits = format!("{:.0}", value);
        let mut out = String::new();
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out
    } else {
        format!("{value:.1}")
    }
}

fn window_before(text: &str, at: usize, chars: usize) -> &str {
    let start = text[..at]
        .char_indices()
        .rev()
        .nth(chars.saturating_sub(1))
        .map_or(0, |(i, _)| i);
    &text[start..at]
}

fn window_after(text: &str, at: usize, chars: usize) -> &str {
    let end = text[at..]
        .char_indices()
        .nth(chars)
        .map_or(text.len(), |(i, _)| at + i);
    &text[at..end]
}

/// Append the converted value after pound/kilogram and mile/kilometre
/// measurements that do not already carry one nearby. Idempotent.
pub fn augment_units(text: &str, window: usize) -> String {
    static MEASURE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)(?P<num>\d{1,3}(?:[,\u{a0}\u{202f}]\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)[\s\u{a0}]*(?P<unit>lbs|lb|pounds|pound|kgs|kg|kilograms|kilogram|miles|mile|mi|kilometres|kilometre|kilometers|kilometer|km)\b",
        )
        .expect("valid regex")
    });

    MEASURE_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let whole = &caps[0];
            let Some(m) = caps.get(0) else {
                return whole.to_string();
            };
            let Some(unit) = Unit::parse(&caps["unit"]) else {
                return whole.to_string();
            };

            // Compound units (lb-ft, km/h) are left alone.
            if text[m.end()..].starts_with(['-', '/']) {
                return whole.to_string();
            }

            let complement = unit.complement_re();
            if complement.is_match(window_after(text, m.end(), window))
                || complement.is_match(window_before(text, m.start(), window))
            {
                return whole.to_string();
            }

            let number: String = caps["num"]
                .chars()
                .filter(|c| !matches!(c, ',' | '\u{a0}' | '\u{202f}'))
                .collect();
            let Ok(value) = number.parse::<f64>() else {
                return whole.to_string();
            };
            let (converted, label) = unit.convert(value);
            format!("{whole} ({} {label})", format_quantity(converted))
        })
        .into_owned()
}
