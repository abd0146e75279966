//! Core domain types: raw input trees, semantic nodes, and per-page records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PageGraphError, Result};

/// Current schema version stamped on every emitted document.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RawNode
// ---------------------------------------------------------------------------

/// One element of a scraped markup tree. Input only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    /// Element name as found in the source document.
    pub tag: String,
    /// Attribute map. Non-string JSON values are flattened to strings.
    #[serde(
        default,
        alias = "attributes",
        deserialize_with = "deserialize_attrs",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub attrs: BTreeMap<String, String>,
    /// Ordered children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawNode>,
    /// Direct text of the node (not including descendants).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl RawNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
            text: None,
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: RawNode) -> Self {
        self.children.push(child);
        self
    }

    /// Lower-cased tag name used for dispatch.
    pub fn tag_name(&self) -> String {
        self.tag.trim().to_ascii_lowercase()
    }

    /// Attribute lookup by exact name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Direct text, trimmed; `None` when blank.
    pub fn own_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    fn check_tags(&self, path: &str) -> Result<()> {
        if self.tag.trim().is_empty() {
            return Err(PageGraphError::validation(format!(
                "node at {path} has an empty tag"
            )));
        }
        for (i, child) in self.children.iter().enumerate() {
            child.check_tags(&format!("{path}/{i}"))?;
        }
        Ok(())
    }
}

fn deserialize_attrs<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                // class lists arrive as arrays from some scrapers
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(|i| match i {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
                other => other.to_string(),
            };
            (k, value)
        })
        .collect())
}

// ---------------------------------------------------------------------------
// RawPage
// ---------------------------------------------------------------------------

/// Head metadata captured alongside a page visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    #[serde(default, alias = "language", alias = "lang", skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub opengraph: BTreeMap<String, Option<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub twitter: BTreeMap<String, Option<String>>,
}

/// One scraped page visit: head metadata plus three raw region trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    pub url: String,
    #[serde(default)]
    pub metadata: HeadMetadata,
    #[serde(default, deserialize_with = "one_or_many")]
    pub navbar: Vec<RawNode>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub main_body_content: Vec<RawNode>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub footer: Vec<RawNode>,
    /// Caller-supplied recency indicator used to settle price conflicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl RawPage {
    /// Reject structurally malformed input before any traversal happens.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(PageGraphError::validation("page has an empty url"));
        }
        for (region, nodes) in [
            ("navbar", &self.navbar),
            ("main_body_content", &self.main_body_content),
            ("footer", &self.footer),
        ] {
            for (i, node) in nodes.iter().enumerate() {
                node.check_tags(&format!("{region}[{i}]"))?;
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Box<RawNode>),
    Many(Vec<RawNode>),
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<RawNode>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(node)) => vec![*node],
        Some(OneOrMany::Many(nodes)) => nodes,
    })
}

// ---------------------------------------------------------------------------
// SemanticNode
// ---------------------------------------------------------------------------

/// Typed result of serializing one raw node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SemanticNode {
    Link(LinkNode),
    Image(ImageNode),
    Heading(HeadingNode),
    List(ListNode),
    Button(ButtonNode),
    Table(TableNode),
    DisclosureRef(DisclosureRefNode),
    RichText(RichTextNode),
    Generic(GenericNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkNode {
    pub text: String,
    pub href: String,
    pub internal: bool,
    pub navigational: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SemanticNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageNode {
    /// `img` or `source`.
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srcset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    pub internal: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingNode {
    pub level: u8,
    /// Heading text without footnote markers.
    pub text: String,
    /// Footnote markers found inside the heading, as disclosure refs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SemanticNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListNode {
    pub ordered: bool,
    pub items: Vec<SemanticNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonNode {
    pub tag: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub internal: bool,
    /// `title` and `aria-*` attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aria: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SemanticNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableNode {
    pub rows: Vec<Vec<String>>,
}

/// A footnote marker, resolved against the disclosure map when possible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisclosureRefNode {
    /// External id carried by the marker, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Content-addressed disclosure id; `None` when unresolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosure_id: Option<String>,
    /// Inline marker text.
    pub text: String,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichTextNode {
    pub tag: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SemanticNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SemanticNode>,
}

/// Attribute value on a generic node: plain text, or decoded JSON for
/// custom elements that embed structured data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Json(serde_json::Value),
}

impl AttrValue {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Text(_) => None,
        }
    }
}

impl SemanticNode {
    /// Child nodes, including list items.
    pub fn children(&self) -> &[SemanticNode] {
        match self {
            Self::Link(n) => &n.children,
            Self::Heading(n) => &n.children,
            Self::Button(n) => &n.children,
            Self::List(n) => &n.items,
            Self::RichText(n) => &n.children,
            Self::Generic(n) => &n.children,
            Self::Image(_) | Self::Table(_) | Self::DisclosureRef(_) => &[],
        }
    }

    /// Text carried directly by this node.
    pub fn own_text(&self) -> Option<&str> {
        let text = match self {
            Self::Link(n) => n.text.as_str(),
            Self::Heading(n) => n.text.as_str(),
            Self::Button(n) => n.text.as_str(),
            Self::DisclosureRef(n) => n.text.as_str(),
            Self::RichText(n) => n.text.as_str(),
            Self::Generic(n) => n.text.as_deref().unwrap_or_default(),
            Self::Image(n) => n.alt.as_deref().unwrap_or_default(),
            Self::List(_) | Self::Table(_) => "",
        };
        let text = text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// All text reachable from this node, joined by single spaces.
    /// Disclosure markers are skipped.
    pub fn full_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::DisclosureRef(_) | Self::Image(_) => return,
            Self::Table(t) => {
                for row in &t.rows {
                    for cell in row {
                        out.push(cell.as_str());
                    }
                }
                return;
            }
            // Link text already covers every descendant.
            Self::Link(l) => {
                let text = l.text.trim();
                if !text.is_empty() {
                    out.push(text);
                }
                return;
            }
            _ => {}
        }
        if let Some(text) = self.own_text() {
            out.push(text);
        }
        for child in self.children() {
            child.collect_text(out);
        }
    }

    /// Preorder visit of this node and every descendant.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SemanticNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

// ---------------------------------------------------------------------------
// PageSemanticRecord
// ---------------------------------------------------------------------------

/// A disclosure registered while extracting one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDisclosure {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub reference_ids: Vec<String>,
}

/// Counters collected during extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractStats {
    pub nodes_visited: usize,
    pub serializer_fallbacks: usize,
    pub unresolved_disclosures: usize,
}

/// Structured result of extracting one page visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSemanticRecord {
    pub url: String,
    #[serde(default)]
    pub metadata: HeadMetadata,
    #[serde(default)]
    pub navbar: Vec<SemanticNode>,
    #[serde(default)]
    pub main_body_content: Vec<SemanticNode>,
    #[serde(default)]
    pub footer: Vec<SemanticNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disclosures: Vec<PageDisclosure>,
    #[serde(default)]
    pub stats: ExtractStats,
}

impl PageSemanticRecord {
    /// Canonical URL from the head, falling back to the visited URL.
    pub fn canonical_url(&self) -> &str {
        self.metadata
            .canonical
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(&self.url)
    }

    /// Every node of the three regions in document order (navbar, main, footer).
    pub fn all_nodes(&self) -> impl Iterator<Item = &SemanticNode> {
        self.navbar
            .iter()
            .chain(&self.main_body_content)
            .chain(&self.footer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_page_accepts_single_node_regions() {
        let json = r#"{
            "url": "https://www.chevrolet.ca/en/trucks/silverado-1500",
            "metadata": {"title": "2025 Chevrolet Silverado 1500 | Chevrolet Canada", "language": "en-CA"},
            "navbar": null,
            "main_body_content": {"tag": "main", "children": [{"tag": "h2", "text": "Towing"}]},
            "footer": [{"tag": "footer"}]
        }"#;
        let page: RawPage = serde_json::from_str(json).expect("parse page");
        assert!(page.navbar.is_empty());
        assert_eq!(page.main_body_content.len(), 1);
        assert_eq!(page.main_body_content[0].children[0].text.as_deref(), Some("Towing"));
        assert_eq!(page.metadata.locale.as_deref(), Some("en-CA"));
        assert!(page.validate().is_ok());
    }

    #[test]
    fn attrs_flatten_non_string_values() {
        let json = r#"{"tag": "div", "attrs": {"class": ["a", "b"], "hidden": true, "data-x": null}}"#;
        let node: RawNode = serde_json::from_str(json).expect("parse node");
        assert_eq!(node.attr("class"), Some("a b"));
        assert_eq!(node.attr("hidden"), Some("true"));
        assert_eq!(node.attr("data-x"), Some(""));
    }

    #[test]
    fn empty_tag_fails_validation() {
        let page = RawPage {
            url: "https://example.com".into(),
            metadata: HeadMetadata::default(),
            navbar: Vec::new(),
            main_body_content: vec![RawNode::new("main").with_child(RawNode::new(" "))],
            footer: Vec::new(),
            observed_at: None,
        };
        let err = page.validate().unwrap_err();
        assert!(err.to_string().contains("main_body_content[0]/0"));
    }

    #[test]
    fn full_text_skips_disclosure_markers() {
        let node = SemanticNode::RichText(RichTextNode {
            tag: "p".into(),
            text: "Max towing 13,300 lbs".into(),
            children: vec![SemanticNode::DisclosureRef(DisclosureRefNode {
                reference_id: Some("d1".into()),
                disclosure_id: None,
                text: "1".into(),
                resolved: false,
            })],
        });
        assert_eq!(node.full_text(), "Max towing 13,300 lbs");
    }

    #[test]
    fn link_text_is_not_repeated_by_its_children() {
        let node = SemanticNode::Link(LinkNode {
            text: "Colorado Explore".into(),
            href: "https://www.chevrolet.ca/en/trucks/colorado".into(),
            internal: true,
            navigational: false,
            target: None,
            rel: None,
            children: vec![SemanticNode::Heading(HeadingNode {
                level: 3,
                text: "Colorado".into(),
                children: Vec::new(),
            })],
        });
        assert_eq!(node.full_text(), "Colorado Explore");
    }

    #[test]
    fn semantic_node_serializes_with_kind_tag() {
        let node = SemanticNode::Heading(HeadingNode {
            level: 2,
            text: "Towing".into(),
            children: Vec::new(),
        });
        let json = serde_json::to_value(&node).expect("serialize");
        assert_eq!(json["kind"], "heading");
        assert_eq!(json["level"], 2);
    }
}
