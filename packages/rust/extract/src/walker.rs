//! Depth-first tree walker: noise exclusion, wrapper flattening, dispatch.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};
use url::Url;

use pagegraph_shared::{
    DisclosureRefNode, ExtractConfig, ExtractStats, GenericNode, AttrValue, PageSemanticRecord,
    RawNode, RawPage, Result, RichTextNode, SemanticNode, collapse_whitespace,
};

use crate::disclosures::{DisclosureMap, DisclosureRegistry};
use crate::links::{LinkClassifier, ResolvedUrl};
use crate::serializers::{INLINE_TAGS, SerializerRegistry};

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Turns raw page trees into semantic records.
pub struct Extractor {
    config: ExtractConfig,
    exclude: HashSet<String>,
    discard_text: HashSet<String>,
    wrappers: HashSet<String>,
    disclosure_tags: HashSet<String>,
    registry: SerializerRegistry,
    classifier: LinkClassifier,
}

fn tag_set(tags: &[String]) -> HashSet<String> {
    tags.iter().map(|t| t.trim().to_ascii_lowercase()).collect()
}

impl Extractor {
    /// Extractor with the built-in serializer registry.
    pub fn new(config: ExtractConfig) -> Self {
        let registry = SerializerRegistry::new(&config);
        Self::with_registry(config, registry)
    }

    /// Extractor with a caller-assembled registry.
    pub fn with_registry(config: ExtractConfig, registry: SerializerRegistry) -> Self {
        Self {
            exclude: tag_set(&config.exclude_tags),
            discard_text: tag_set(&config.discard_text_tags),
            wrappers: tag_set(&config.wrapper_tags),
            disclosure_tags: tag_set(&config.disclosure_tags),
            classifier: LinkClassifier::new(&config.domains),
            registry,
            config,
        }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Extract one page visit. Fails fast on malformed input.
    #[instrument(skip_all, fields(url = %page.url))]
    pub fn extract_page(
        &self,
        page: &RawPage,
        disclosures: &DisclosureMap,
    ) -> Result<PageSemanticRecord> {
        page.validate()?;

        let base = Url::parse(page.url.trim()).ok();
        if base.is_none() {
            warn!(url = %page.url, "page url is not absolute, links stay unresolved");
        }

        let mut cx = WalkContext::new(self, base, disclosures);
        let navbar = cx.walk_all(&page.navbar);
        let main_body_content = cx.walk_all(&page.main_body_content);
        let footer = cx.walk_all(&page.footer);
        let (registry, stats) = cx.finish();

        info!(
            nodes = stats.nodes_visited,
            fallbacks = stats.serializer_fallbacks,
            unresolved_disclosures = stats.unresolved_disclosures,
            disclosures = registry.len(),
            "extracted page"
        );

        Ok(PageSemanticRecord {
            url: page.url.clone(),
            metadata: page.metadata.clone(),
            navbar,
            main_body_content,
            footer,
            observed_at: page.observed_at,
            disclosures: registry.into_disclosures(),
            stats,
        })
    }

    /// Walk a single tree against `base_url`.
    pub fn walk(
        &self,
        node: &RawNode,
        base_url: &str,
        disclosures: &DisclosureMap,
    ) -> Vec<SemanticNode> {
        self.walk_with_stats(node, base_url, disclosures).0
    }

    /// [`Extractor::walk`] that also returns the walk counters.
    pub fn walk_with_stats(
        &self,
        node: &RawNode,
        base_url: &str,
        disclosures: &DisclosureMap,
    ) -> (Vec<SemanticNode>, ExtractStats) {
        let mut cx = WalkContext::new(self, Url::parse(base_url).ok(), disclosures);
        let nodes = cx.walk_all(std::slice::from_ref(node));
        (nodes, cx.stats)
    }

    fn walk_node(&self, node: &RawNode, cx: &mut WalkContext<'_>, out: &mut Vec<SemanticNode>) {
        cx.stats.nodes_visited += 1;
        let tag = node.tag_name();

        if self.exclude.contains(&tag) {
            if !self.discard_text.contains(&tag) {
                if let Some(text) = node.own_text() {
                    out.push(SemanticNode::RichText(RichTextNode {
                        tag,
                        text: collapse_whitespace(text),
                        children: Vec::new(),
                    }));
                }
            }
            for child in &node.children {
                self.walk_node(child, cx, out);
            }
            return;
        }

        if self.wrappers.contains(&tag) && !self.is_distinguished(node) && node.own_text().is_none()
        {
            let children = cx.walk_children(node);
            if children.len() <= 1 {
                out.extend(children);
            } else {
                out.push(SemanticNode::Generic(GenericNode {
                    tag,
                    attrs: node
                        .attrs
                        .iter()
                        .map(|(k, v)| (k.clone(), AttrValue::Text(v.clone())))
                        .collect(),
                    text: None,
                    children,
                }));
            }
            return;
        }

        let semantic = self.registry.serialize(node, cx);
        if !is_empty(&semantic) {
            out.push(semantic);
        }
    }

    fn is_distinguished(&self, node: &RawNode) -> bool {
        self.config
            .distinguishing_attrs
            .iter()
            .any(|a| node.attr(a).is_some_and(|v| !v.trim().is_empty()))
    }

    fn is_inline(&self, tag: &str) -> bool {
        INLINE_TAGS.contains(&tag) && !self.disclosure_tags.contains(tag)
    }
}

/// Nodes with nothing to say are dropped from sibling lists.
fn is_empty(node: &SemanticNode) -> bool {
    match node {
        SemanticNode::Link(_) | SemanticNode::DisclosureRef(_) => false,
        SemanticNode::Image(n) => n.src.is_none() && n.srcset.is_none() && n.alt.is_none(),
        SemanticNode::Heading(n) => n.text.is_empty(),
        SemanticNode::List(n) => n.items.is_empty(),
        SemanticNode::Table(n) => n.rows.is_empty(),
        SemanticNode::Button(n) => {
            n.text.is_empty()
                && n.action.is_none()
                && n.children.is_empty()
                && n.data.is_empty()
                && n.aria.is_empty()
        }
        SemanticNode::RichText(n) => n.text.is_empty() && n.children.is_empty(),
        SemanticNode::Generic(n) => {
            n.text.is_none()
                && n.children.is_empty()
                && !crate::serializers::has_interesting_attrs(&n.attrs)
        }
    }
}

// ---------------------------------------------------------------------------
// WalkContext
// ---------------------------------------------------------------------------

/// Mutable state for one walk: base URL, disclosures seen, counters.
pub struct WalkContext<'a> {
    extractor: &'a Extractor,
    base: Option<Url>,
    disclosures: &'a DisclosureMap,
    registry: DisclosureRegistry,
    stats: ExtractStats,
}

/// Snapshot taken before a handler runs, restored if it fails.
pub(crate) struct Checkpoint {
    registry: DisclosureRegistry,
    stats: ExtractStats,
}

impl<'a> WalkContext<'a> {
    fn new(extractor: &'a Extractor, base: Option<Url>, disclosures: &'a DisclosureMap) -> Self {
        Self {
            extractor,
            base,
            disclosures,
            registry: DisclosureRegistry::default(),
            stats: ExtractStats::default(),
        }
    }

    fn finish(self) -> (DisclosureRegistry, ExtractStats) {
        (self.registry, self.stats)
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.extractor.config
    }

    /// Resolve and classify a URL against the page.
    pub fn resolve(&self, href: &str) -> ResolvedUrl {
        self.extractor.classifier.resolve(href, self.base.as_ref())
    }

    fn walk_all(&mut self, nodes: &[RawNode]) -> Vec<SemanticNode> {
        let extractor = self.extractor;
        let mut out = Vec::new();
        for node in nodes {
            extractor.walk_node(node, self, &mut out);
        }
        out
    }

    /// Walk every child of `node`, splicing excluded and collapsed nodes.
    pub fn walk_children(&mut self, node: &RawNode) -> Vec<SemanticNode> {
        self.walk_all(&node.children)
    }

    /// Text of `node` with inline formatting children folded in, plus the
    /// walked non-inline children.
    pub fn block_content(&mut self, node: &RawNode) -> (String, Vec<SemanticNode>) {
        let mut parts = Vec::new();
        let mut children = Vec::new();
        self.absorb(node, &mut parts, &mut children);
        (collapse_whitespace(&parts.join(" ")), children)
    }

    fn absorb(&mut self, node: &RawNode, parts: &mut Vec<String>, children: &mut Vec<SemanticNode>) {
        if let Some(text) = node.own_text() {
            parts.push(text.to_string());
        }
        let extractor = self.extractor;
        for child in &node.children {
            if extractor.is_inline(&child.tag_name()) {
                self.stats.nodes_visited += 1;
                self.absorb(child, parts, children);
            } else {
                extractor.walk_node(child, self, children);
            }
        }
    }

    /// All readable text under `node`, skipping discarded tags and
    /// footnote markers.
    pub fn visible_text(&self, node: &RawNode) -> String {
        let mut parts = Vec::new();
        self.collect_visible(node, &mut parts);
        collapse_whitespace(&parts.join(" "))
    }

    fn collect_visible<'n>(&self, node: &'n RawNode, parts: &mut Vec<&'n str>) {
        if let Some(text) = node.own_text() {
            parts.push(text);
        }
        for child in &node.children {
            let tag = child.tag_name();
            if self.extractor.discard_text.contains(&tag)
                || self.extractor.disclosure_tags.contains(&tag)
            {
                continue;
            }
            self.collect_visible(child, parts);
        }
    }

    /// Walk the footnote markers nested anywhere under `node`, skipping
    /// discarded subtrees.
    pub fn nested_markers(&mut self, node: &RawNode) -> Vec<SemanticNode> {
        let mut out = Vec::new();
        self.collect_markers(node, &mut out);
        out
    }

    fn collect_markers(&mut self, node: &RawNode, out: &mut Vec<SemanticNode>) {
        let extractor = self.extractor;
        for child in &node.children {
            let tag = child.tag_name();
            if extractor.discard_text.contains(&tag) {
                continue;
            }
            if extractor.disclosure_tags.contains(&tag) {
                extractor.walk_node(child, self, out);
            } else {
                self.collect_markers(child, out);
            }
        }
    }

    /// Every text fragment under a footnote marker, markers included.
    pub fn marker_text(&self, node: &RawNode) -> String {
        fn collect<'n>(node: &'n RawNode, parts: &mut Vec<&'n str>) {
            if let Some(text) = node.own_text() {
                parts.push(text);
            }
            for child in &node.children {
                collect(child, parts);
            }
        }
        let mut parts = Vec::new();
        collect(node, &mut parts);
        collapse_whitespace(&parts.join(" "))
    }

    /// Resolve a footnote marker against the disclosure map.
    pub fn resolve_disclosure(
        &mut self,
        reference_id: Option<String>,
        text: String,
    ) -> DisclosureRefNode {
        let found = reference_id
            .as_deref()
            .and_then(|r| self.disclosures.get(r).map(|t| (r, t)));

        match found {
            Some((reference, disclosure_text)) => {
                let id = self.registry.register(reference, disclosure_text);
                DisclosureRefNode {
                    reference_id,
                    disclosure_id: Some(id),
                    text,
                    resolved: true,
                }
            }
            None => {
                self.stats.unresolved_disclosures += 1;
                debug!(reference_id = ?reference_id, "unresolved disclosure marker");
                DisclosureRefNode {
                    reference_id,
                    disclosure_id: None,
                    text,
                    resolved: false,
                }
            }
        }
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            registry: self.registry.clone(),
            stats: self.stats.clone(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.registry = checkpoint.registry;
        self.stats = checkpoint.stats;
    }

    pub(crate) fn record_fallback(&mut self) {
        self.stats.serializer_fallbacks += 1;
    }
}
