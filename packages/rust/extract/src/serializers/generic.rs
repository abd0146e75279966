use std::collections::BTreeMap;

use pagegraph_shared::{AttrValue, GenericNode, RawNode, SemanticNode};
use serde_json::Value;

use super::{NodeSerializer, SerializeError};
use crate::text::decode_entities;
use crate::walker::WalkContext;

/// Fallback for unknown tags and failed handlers. Always succeeds.
pub struct GenericSerializer;

impl GenericSerializer {
    pub fn build(&self, node: &RawNode, cx: &mut WalkContext<'_>) -> SemanticNode {
        let tag = node.tag_name();
        let custom = tag.contains('-');

        let attrs: BTreeMap<String, AttrValue> = node
            .attrs
            .iter()
            .map(|(k, v)| {
                let value = if custom && looks_like_json(v) {
                    parse_json_attr(v).map_or_else(|| AttrValue::Text(v.clone()), AttrValue::Json)
                } else {
                    AttrValue::Text(v.clone())
                };
                (k.clone(), value)
            })
            .collect();

        let (text, children) = cx.block_content(node);

        SemanticNode::Generic(GenericNode {
            tag,
            attrs,
            text: (!text.is_empty()).then_some(text),
            children,
        })
    }
}

impl NodeSerializer for GenericSerializer {
    fn serialize(
        &self,
        node: &RawNode,
        cx: &mut WalkContext<'_>,
    ) -> Result<SemanticNode, SerializeError> {
        Ok(self.build(node, cx))
    }

    fn name(&self) -> &str {
        "generic"
    }
}

fn looks_like_json(value: &str) -> bool {
    let trimmed = value.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// Defensive decode of JSON embedded in an attribute value.
///
/// Tries the entity-decoded, `\/`-unescaped value, then again with
/// non-breaking spaces replaced. `None` means keep the raw string.
pub fn parse_json_attr(raw: &str) -> Option<Value> {
    let cleaned = decode_entities(raw).replace("\\/", "/");
    serde_json::from_str(&cleaned)
        .or_else(|_| serde_json::from_str(&cleaned.replace('\u{a0}', " ")))
        .ok()
}

/// Attributes worth keeping a generic node alive for.
pub(crate) fn has_interesting_attrs(attrs: &BTreeMap<String, AttrValue>) -> bool {
    const KEEP: [&str; 7] = ["href", "src", "title", "aria-label", "value", "name", "content"];
    attrs.iter().any(|(k, v)| {
        v.as_json().is_some() || k.starts_with("data-") || KEEP.contains(&k.as_str())
    })
}

#[cfg(test)]
mod tests {
    use pagegraph_shared::{AttrValue, ExtractConfig, RawNode, SemanticNode};
    use serde_json::json;

    use super::*;
    use crate::{DisclosureMap, Extractor};

    #[test]
    fn json_attrs_on_custom_elements_decode() {
        let raw = r#"{&quot;ON&quot;:{&quot;startingPrice&quot;:&quot;$36,733&quot;,&quot;url&quot;:&quot;https:\/\/x&quot;}}"#;
        assert_eq!(
            parse_json_attr(raw),
            Some(json!({"ON": {"startingPrice": "$36,733", "url": "https://x"}}))
        );
    }

    #[test]
    fn malformed_json_keeps_raw_string() {
        let extractor = Extractor::new(ExtractConfig::default());
        let node = RawNode::new("gb-dynamic-text")
            .with_attr("regional-information-json", "{ON: broken")
            .with_text("From: $36,733");
        let nodes = extractor.walk(&node, "https://www.chevrolet.ca/", &DisclosureMap::new());
        let SemanticNode::Generic(g) = &nodes[0] else {
            panic!("expected generic");
        };
        assert_eq!(
            g.attrs.get("regional-information-json"),
            Some(&AttrValue::Text("{ON: broken".into()))
        );
        assert_eq!(g.text.as_deref(), Some("From: $36,733"));
    }

    #[test]
    fn plain_elements_do_not_parse_json() {
        let extractor = Extractor::new(ExtractConfig::default());
        let node = RawNode::new("figure")
            .with_attr("data-config", "{\"a\": 1}")
            .with_text("Caption");
        let nodes = extractor.walk(&node, "https://www.chevrolet.ca/", &DisclosureMap::new());
        let SemanticNode::Generic(g) = &nodes[0] else {
            panic!("expected generic");
        };
        assert!(matches!(g.attrs.get("data-config"), Some(AttrValue::Text(_))));
    }
}
