use pagegraph_shared::{RawNode, RichTextNode, SemanticNode};

use super::{NodeSerializer, SerializeError};
use crate::walker::WalkContext;

/// Paragraph-like blocks and inline formatting met outside a block.
pub struct RichTextSerializer;

impl NodeSerializer for RichTextSerializer {
    fn serialize(
        &self,
        node: &RawNode,
        cx: &mut WalkContext<'_>,
    ) -> Result<SemanticNode, SerializeError> {
        let (text, children) = cx.block_content(node);
        Ok(SemanticNode::RichText(RichTextNode {
            tag: node.tag_name(),
            text,
            children,
        }))
    }

    fn name(&self) -> &str {
        "rich_text"
    }
}
