//! Footnote resolution against an externally supplied disclosure map.
//!
//! Disclosure text is normalized once when the map is built. Each page walk
//! registers the disclosures it actually references under a content-hash id,
//! so two reference ids pointing at the same text share one disclosure.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use pagegraph_shared::{PageDisclosure, PageGraphError, Result, disclosure_id};

use crate::text::{decode_entities, plain_text};

// ---------------------------------------------------------------------------
// DisclosureMap
// ---------------------------------------------------------------------------

/// Reference id → normalized disclosure text.
#[derive(Debug, Clone, Default)]
pub struct DisclosureMap {
    entries: HashMap<String, String>,
}

impl DisclosureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert raw (possibly markup-bearing) text. Blank text is ignored.
    pub fn insert(&mut self, reference_id: impl Into<String>, raw: &str) {
        let text = plain_text(raw);
        if !text.is_empty() {
            self.entries.insert(reference_id.into(), text);
        }
    }

    /// Parse the disclosure endpoint payload.
    ///
    /// Accepts `{id: "text"}` or `{id: {"content": "<p>..</p>", ..}}`. The
    /// payload may itself be HTML-escaped and use `\/` escapes.
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(_) => {
                let cleaned = decode_entities(raw).replace("\\/", "/");
                serde_json::from_str(&cleaned)
                    .or_else(|_| serde_json::from_str(&cleaned.replace('\u{a0}', " ")))
                    .map_err(|e| PageGraphError::parse(format!("disclosure map: {e}")))?
            }
        };
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(object) = value else {
            return Err(PageGraphError::validation(
                "disclosure map must be a JSON object",
            ));
        };

        let mut map = Self::new();
        for (id, entry) in object {
            match entry {
                Value::String(text) => map.insert(id.clone(), text),
                Value::Object(fields) => {
                    if let Some(Value::String(content)) = fields.get("content") {
                        map.insert(id.clone(), content);
                    }
                }
                _ => debug!(id = %id, "skipping non-text disclosure entry"),
            }
        }
        Ok(map)
    }

    pub fn get(&self, reference_id: &str) -> Option<&str> {
        self.entries.get(reference_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: AsRef<str>> FromIterator<(K, V)> for DisclosureMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v.as_ref());
        }
        map
    }
}

// ---------------------------------------------------------------------------
// DisclosureRegistry
// ---------------------------------------------------------------------------

/// Disclosures registered during one page walk, keyed by content id.
#[derive(Debug, Clone, Default)]
pub struct DisclosureRegistry {
    by_id: BTreeMap<String, PageDisclosure>,
}

impl DisclosureRegistry {
    /// Register normalized text seen under `reference_id`; returns its id.
    pub fn register(&mut self, reference_id: &str, text: &str) -> String {
        let id = disclosure_id(text);
        let entry = self.by_id.entry(id.clone()).or_insert_with(|| PageDisclosure {
            id: id.clone(),
            text: text.to_string(),
            reference_ids: Vec::new(),
        });
        if !entry.reference_ids.iter().any(|r| r == reference_id) {
            entry.reference_ids.push(reference_id.to_string());
            entry.reference_ids.sort();
        }
        id
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn into_disclosures(self) -> Vec<PageDisclosure> {
        self.by_id.into_values().collect()
    }
}
