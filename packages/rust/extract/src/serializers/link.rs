use pagegraph_shared::{LinkNode, RawNode, SemanticNode};

use super::{NodeSerializer, SerializeError};
use crate::walker::WalkContext;

/// `<a>`: visible text, resolved href, classification, walked children.
pub struct LinkSerializer;

impl NodeSerializer for LinkSerializer {
    fn serialize(
        &self,
        node: &RawNode,
        cx: &mut WalkContext<'_>,
    ) -> Result<SemanticNode, SerializeError> {
        let href = node
            .attr("href")
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| SerializeError::missing(node, "href"))?;

        let resolved = cx.resolve(href);
        let text = cx.visible_text(node);
        let (_, children) = cx.block_content(node);

        Ok(SemanticNode::Link(LinkNode {
            text,
            href: resolved.url,
            internal: resolved.internal,
            navigational: resolved.navigational,
            target: node.attr("target").map(String::from),
            rel: node.attr("rel").map(String::from),
            children,
        }))
    }

    fn name(&self) -> &str {
        "link"
    }
}

#[cfg(test)]
mod tests {
    use pagegraph_shared::{ExtractConfig, RawNode, SemanticNode};

    use crate::{DisclosureMap, Extractor};

    #[test]
    fn link_keeps_children_and_inline_text() {
        let extractor = Extractor::new(ExtractConfig {
            domains: vec!["chevrolet.ca".into()],
            ..ExtractConfig::default()
        });
        let node = RawNode::new("a")
            .with_attr("href", "/en/trucks/colorado")
            .with_attr("target", "_self")
            .with_child(RawNode::new("h3").with_text("Colorado"))
            .with_child(RawNode::new("span").with_text("Explore"));

        let nodes = extractor.walk(&node, "https://www.chevrolet.ca/en/trucks", &DisclosureMap::new());
        let SemanticNode::Link(link) = &nodes[0] else {
            panic!("expected link");
        };
        assert_eq!(link.href, "https://www.chevrolet.ca/en/trucks/colorado");
        assert!(link.internal);
        assert_eq!(link.text, "Colorado Explore");
        assert_eq!(link.target.as_deref(), Some("_self"));
        // the span is absorbed, the heading survives
        assert_eq!(link.children.len(), 1);
        assert!(matches!(&link.children[0], SemanticNode::Heading(h) if h.text == "Colorado"));
    }
}
