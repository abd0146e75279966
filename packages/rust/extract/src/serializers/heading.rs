use pagegraph_shared::{HeadingNode, RawNode, SemanticNode};

use super::{NodeSerializer, SerializeError};
use crate::walker::WalkContext;

/// `<h1>`..`<h6>`: plain text, with nested footnote markers kept as
/// disclosure refs.
pub struct HeadingSerializer;

impl NodeSerializer for HeadingSerializer {
    fn serialize(
        &self,
        node: &RawNode,
        cx: &mut WalkContext<'_>,
    ) -> Result<SemanticNode, SerializeError> {
        let tag = node.tag_name();
        let level = tag
            .strip_prefix('h')
            .and_then(|l| l.parse::<u8>().ok())
            .filter(|l| (1..=6).contains(l))
            .ok_or_else(|| SerializeError::malformed(node, "not a heading level"))?;

        Ok(SemanticNode::Heading(HeadingNode {
            level,
            text: cx.visible_text(node),
            children: cx.nested_markers(node),
        }))
    }

    fn name(&self) -> &str {
        "heading"
    }
}
