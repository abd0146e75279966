use pagegraph_shared::{RawNode, SemanticNode, TableNode};

use super::{NodeSerializer, SerializeError};
use crate::walker::WalkContext;

/// `<table>`: rows of cell text, empty rows dropped.
pub struct TableSerializer;

impl NodeSerializer for TableSerializer {
    fn serialize(
        &self,
        node: &RawNode,
        cx: &mut WalkContext<'_>,
    ) -> Result<SemanticNode, SerializeError> {
        let mut row_nodes = Vec::new();
        collect_rows(node, &mut row_nodes);

        let rows = row_nodes
            .into_iter()
            .map(|tr| {
                tr.children
                    .iter()
                    .filter(|cell| matches!(cell.tag_name().as_str(), "th" | "td"))
                    .map(|cell| cx.visible_text(cell))
                    .collect::<Vec<_>>()
            })
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();

        Ok(SemanticNode::Table(TableNode { rows }))
    }

    fn name(&self) -> &str {
        "table"
    }
}

/// Descendant `<tr>` elements in document order.
fn collect_rows<'n>(node: &'n RawNode, out: &mut Vec<&'n RawNode>) {
    for child in &node.children {
        if child.tag_name() == "tr" {
            out.push(child);
        } else {
            collect_rows(child, out);
        }
    }
}
