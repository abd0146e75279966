use pagegraph_shared::{ListNode, RawNode, SemanticNode};

use super::{NodeSerializer, SerializeError};
use crate::walker::WalkContext;

/// `<ul>`/`<ol>`: children become ordered items.
pub struct ListSerializer;

impl NodeSerializer for ListSerializer {
    fn serialize(
        &self,
        node: &RawNode,
        cx: &mut WalkContext<'_>,
    ) -> Result<SemanticNode, SerializeError> {
        Ok(SemanticNode::List(ListNode {
            ordered: node.tag_name() == "ol",
            items: cx.walk_children(node),
        }))
    }

    fn name(&self) -> &str {
        "list"
    }
}
