//! Tag-keyed serializers that turn raw nodes into typed semantic nodes.
//!
//! Handlers are looked up by lower-cased tag name. A miss, or a handler
//! error, resolves to [`GenericSerializer`], so serialization is total.

mod button;
mod disclosure;
mod generic;
mod heading;
mod link;
mod list;
mod media;
mod table;
mod text;

use std::collections::HashMap;

use pagegraph_shared::{ExtractConfig, RawNode, SemanticNode};
use tracing::{debug, warn};

use crate::walker::WalkContext;

pub use button::ButtonSerializer;
pub use disclosure::DisclosureSerializer;
pub use generic::{GenericSerializer, parse_json_attr};
pub(crate) use generic::has_interesting_attrs;
pub use heading::HeadingSerializer;
pub use link::LinkSerializer;
pub use list::ListSerializer;
pub use media::ImageSerializer;
pub use table::TableSerializer;
pub use text::RichTextSerializer;

/// Formatting tags whose text is folded into the enclosing block.
pub const INLINE_TAGS: [&str; 11] = [
    "span", "strong", "em", "b", "i", "u", "small", "sup", "sub", "mark", "abbr",
];

const BLOCK_TEXT_TAGS: [&str; 5] = ["p", "li", "blockquote", "figcaption", "label"];

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Why a handler declined a node.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// A required attribute is absent or blank.
    #[error("<{tag}> is missing required attribute `{attr}`")]
    MissingAttribute { tag: String, attr: &'static str },

    /// The node is structurally unusable for this handler.
    #[error("<{tag}>: {message}")]
    Malformed { tag: String, message: String },

    /// The handler does not apply to this variant of the tag
    /// (e.g. `<input type="text">`). Falls back silently.
    #[error("<{tag}> is not handled here")]
    NotApplicable { tag: String },
}

impl SerializeError {
    pub fn missing(node: &RawNode, attr: &'static str) -> Self {
        Self::MissingAttribute {
            tag: node.tag_name(),
            attr,
        }
    }

    pub fn malformed(node: &RawNode, message: impl Into<String>) -> Self {
        Self::Malformed {
            tag: node.tag_name(),
            message: message.into(),
        }
    }
}

/// A tag-specific serializer.
pub trait NodeSerializer: Send + Sync {
    /// Serialize `node`. Children are walked through `cx`.
    fn serialize(
        &self,
        node: &RawNode,
        cx: &mut WalkContext<'_>,
    ) -> Result<SemanticNode, SerializeError>;

    /// Human-readable handler name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Tag name → handler, with a mandatory generic fallback.
pub struct SerializerRegistry {
    handlers: HashMap<String, Box<dyn NodeSerializer>>,
    fallback: GenericSerializer,
}

impl SerializerRegistry {
    /// Registry with every built-in handler.
    pub fn new(config: &ExtractConfig) -> Self {
        let mut registry = Self::empty();

        registry.register("a", Box::new(LinkSerializer));
        registry.register("img", Box::new(ImageSerializer));
        registry.register("source", Box::new(ImageSerializer));
        for level in 1..=6 {
            registry.register(&format!("h{level}"), Box::new(HeadingSerializer));
        }
        registry.register("ul", Box::new(ListSerializer));
        registry.register("ol", Box::new(ListSerializer));
        registry.register("button", Box::new(ButtonSerializer));
        registry.register("input", Box::new(ButtonSerializer));
        registry.register("table", Box::new(TableSerializer));
        for tag in BLOCK_TEXT_TAGS.iter().chain(INLINE_TAGS.iter()) {
            registry.register(tag, Box::new(RichTextSerializer));
        }
        for tag in &config.disclosure_tags {
            registry.register(tag, Box::new(DisclosureSerializer));
        }

        registry
    }

    /// Registry with no handlers; everything serializes as generic.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: GenericSerializer,
        }
    }

    /// Add or replace the handler for `tag`.
    pub fn register(&mut self, tag: &str, handler: Box<dyn NodeSerializer>) {
        self.handlers.insert(tag.trim().to_ascii_lowercase(), handler);
    }

    pub fn handles(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    /// Serialize one node. Never fails.
    pub fn serialize(&self, node: &RawNode, cx: &mut WalkContext<'_>) -> SemanticNode {
        let tag = node.tag_name();
        let Some(handler) = self.handlers.get(&tag) else {
            return self.fallback.build(node, cx);
        };

        let checkpoint = cx.checkpoint();
        match handler.serialize(node, cx) {
            Ok(semantic) => semantic,
            Err(err @ SerializeError::NotApplicable { .. }) => {
                cx.restore(checkpoint);
                debug!(%tag, serializer = handler.name(), reason = %err, "handler declined node");
                self.fallback.build(node, cx)
            }
            Err(err) => {
                cx.restore(checkpoint);
                cx.record_fallback();
                warn!(%tag, serializer = handler.name(), error = %err, "serializer failed, using generic fallback");
                self.fallback.build(node, cx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pagegraph_shared::{ExtractConfig, RawNode, SemanticNode};

    use super::*;
    use crate::{DisclosureMap, Extractor};

    struct Exploding;

    impl NodeSerializer for Exploding {
        fn serialize(
            &self,
            node: &RawNode,
            cx: &mut WalkContext<'_>,
        ) -> Result<SemanticNode, SerializeError> {
            // Walk children first so the rollback is observable.
            let _ = cx.walk_children(node);
            Err(SerializeError::malformed(node, "boom"))
        }

        fn name(&self) -> &str {
            "exploding"
        }
    }

    #[test]
    fn failing_handler_falls_back_to_generic() {
        let config = ExtractConfig::default();
        let mut registry = SerializerRegistry::new(&config);
        registry.register("gb-price", Box::new(Exploding));
        let extractor = Extractor::with_registry(config, registry);

        let node = RawNode::new("gb-price")
            .with_attr("data-model", "silverado")
            .with_child(RawNode::new("p").with_text("From: $36,733"));
        let map = DisclosureMap::new();
        let record = extractor.walk_with_stats(&node, "https://www.chevrolet.ca/en", &map);

        assert_eq!(record.0.len(), 1);
        let SemanticNode::Generic(generic) = &record.0[0] else {
            panic!("expected generic fallback, got {:?}", record.0[0]);
        };
        assert_eq!(generic.tag, "gb-price");
        assert_eq!(generic.children.len(), 1);
        assert_eq!(record.1.serializer_fallbacks, 1);
        // Children walked by the failed handler are not double counted.
        assert_eq!(record.1.nodes_visited, 2);
    }

    #[test]
    fn link_without_href_is_generic() {
        let extractor = Extractor::new(ExtractConfig::default());
        let node = RawNode::new("a").with_text("Learn more");
        let (nodes, stats) =
            extractor.walk_with_stats(&node, "https://www.chevrolet.ca/en", &DisclosureMap::new());
        assert!(matches!(&nodes[0], SemanticNode::Generic(g) if g.text.as_deref() == Some("Learn more")));
        assert_eq!(stats.serializer_fallbacks, 1);
    }

    #[test]
    fn text_input_declines_quietly() {
        let extractor = Extractor::new(ExtractConfig::default());
        let node = RawNode::new("input")
            .with_attr("type", "text")
            .with_attr("name", "postal");
        let (nodes, stats) =
            extractor.walk_with_stats(&node, "https://www.chevrolet.ca/en", &DisclosureMap::new());
        assert!(matches!(&nodes[0], SemanticNode::Generic(g) if g.tag == "input"));
        assert_eq!(stats.serializer_fallbacks, 0);
    }
}
