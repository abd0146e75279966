use pagegraph_shared::{RawNode, SemanticNode};

use super::{NodeSerializer, SerializeError};
use crate::walker::WalkContext;

/// Footnote marker tags; resolution happens in the walk context.
pub struct DisclosureSerializer;

impl NodeSerializer for DisclosureSerializer {
    fn serialize(
        &self,
        node: &RawNode,
        cx: &mut WalkContext<'_>,
    ) -> Result<SemanticNode, SerializeError> {
        let attr = cx.config().disclosure_id_attr.clone();
        let reference_id = node
            .attr(&attr)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from);
        let text = cx.marker_text(node);
        Ok(SemanticNode::DisclosureRef(
            cx.resolve_disclosure(reference_id, text),
        ))
    }

    fn name(&self) -> &str {
        "disclosure"
    }
}

#[cfg(test)]
mod tests {
    use pagegraph_shared::{ExtractConfig, RawNode, SemanticNode};

    use crate::{DisclosureMap, Extractor};

    #[test]
    fn unresolved_markers_are_counted_not_fatal() {
        let extractor = Extractor::new(ExtractConfig::default());
        let map: DisclosureMap = [("known", "<p>Requires available equipment.</p>")]
            .into_iter()
            .collect();
        let node = RawNode::new("p")
            .with_text("Max towing")
            .with_child(
                RawNode::new("gb-disclosure")
                    .with_attr("data-disclosure-id", "known")
                    .with_text("1"),
            )
            .with_child(
                RawNode::new("gb-disclosure")
                    .with_attr("data-disclosure-id", "missing")
                    .with_text("2"),
            );

        let (nodes, stats) = extractor.walk_with_stats(&node, "https://www.chevrolet.ca/", &map);
        let SemanticNode::RichText(p) = &nodes[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text, "Max towing");
        let refs: Vec<_> = p
            .children
            .iter()
            .filter_map(|c| match c {
                SemanticNode::DisclosureRef(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(refs.len(), 2);
        assert!(refs[0].resolved);
        assert!(refs[0].disclosure_id.as_deref().is_some_and(|id| id.starts_with("disc:")));
        assert!(!refs[1].resolved);
        assert_eq!(refs[1].reference_id.as_deref(), Some("missing"));
        assert_eq!(refs[1].text, "2");
        assert_eq!(stats.unresolved_disclosures, 1);
    }
}
