use std::collections::BTreeMap;

use pagegraph_shared::{ButtonNode, RawNode, SemanticNode};

use super::{NodeSerializer, SerializeError};
use crate::walker::WalkContext;

const BUTTON_INPUT_TYPES: [&str; 3] = ["button", "submit", "reset"];

/// `<button>` and button-like `<input>`.
pub struct ButtonSerializer;

impl NodeSerializer for ButtonSerializer {
    fn serialize(
        &self,
        node: &RawNode,
        cx: &mut WalkContext<'_>,
    ) -> Result<SemanticNode, SerializeError> {
        let tag = node.tag_name();
        let is_input = tag == "input";
        if is_input {
            let kind = node.attr("type").unwrap_or_default().to_ascii_lowercase();
            if !BUTTON_INPUT_TYPES.contains(&kind.as_str()) {
                return Err(SerializeError::NotApplicable { tag });
            }
        }

        let action = node
            .attr("href")
            .or_else(|| node.attr("formaction"))
            .filter(|a| !a.trim().is_empty())
            .map(|a| cx.resolve(a));

        let mut aria = BTreeMap::new();
        let mut data = BTreeMap::new();
        for (k, v) in &node.attrs {
            if k == "title" || k.starts_with("aria-") {
                aria.insert(k.clone(), v.clone());
            } else if k.starts_with("data-") {
                data.insert(k.clone(), v.clone());
            }
        }

        let text = if is_input {
            node.attr("value").unwrap_or_default().trim().to_string()
        } else {
            cx.visible_text(node)
        };
        let (_, children) = cx.block_content(node);

        Ok(SemanticNode::Button(ButtonNode {
            tag,
            text,
            internal: action.as_ref().is_some_and(|a| a.internal),
            action: action.map(|a| a.url),
            aria,
            data,
            children,
        }))
    }

    fn name(&self) -> &str {
        "button"
    }
}
