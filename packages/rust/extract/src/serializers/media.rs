use std::collections::BTreeMap;

use pagegraph_shared::{ImageNode, RawNode, SemanticNode};

use super::{NodeSerializer, SerializeError};
use crate::walker::WalkContext;

/// `<img>` and `<source>`: URLs resolved, descriptive attributes verbatim.
pub struct ImageSerializer;

impl NodeSerializer for ImageSerializer {
    fn serialize(
        &self,
        node: &RawNode,
        cx: &mut WalkContext<'_>,
    ) -> Result<SemanticNode, SerializeError> {
        let src = node
            .attr("src")
            .or_else(|| node.attr("data-src"))
            .filter(|s| !s.trim().is_empty())
            .map(|s| cx.resolve(s));

        let srcset = node
            .attr("srcset")
            .filter(|s| !s.trim().is_empty())
            .map(|s| resolve_srcset(s, cx));

        let data: BTreeMap<String, String> = node
            .attrs
            .iter()
            .filter(|(k, _)| k.starts_with("data-"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(SemanticNode::Image(ImageNode {
            tag: node.tag_name(),
            internal: src.as_ref().is_some_and(|r| r.internal),
            src: src.map(|r| r.url),
            srcset,
            alt: node.attr("alt").map(String::from),
            title: node.attr("title").map(String::from),
            loading: node.attr("loading").map(String::from),
            media: node.attr("media").map(String::from),
            data,
        }))
    }

    fn name(&self) -> &str {
        "image"
    }
}

/// Resolve each candidate URL of a `srcset`, keeping width/density descriptors.
fn resolve_srcset(srcset: &str, cx: &WalkContext<'_>) -> String {
    srcset
        .replace('\n', " ")
        .split(',')
        .filter_map(|candidate| {
            let mut parts = candidate.split_whitespace();
            let url = parts.next()?;
            let resolved = cx.resolve(url).url;
            let descriptor = parts.collect::<Vec<_>>().join(" ");
            Some(if descriptor.is_empty() {
                resolved
            } else {
                format!("{resolved} {descriptor}")
            })
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use pagegraph_shared::{ExtractConfig, RawNode, SemanticNode};

    use crate::{DisclosureMap, Extractor};

    #[test]
    fn image_urls_resolve_and_attrs_survive() {
        let extractor = Extractor::new(ExtractConfig::default());
        let node = RawNode::new("img")
            .with_attr("src", "/content/dam/silverado-zr2.jpg")
            .with_attr("alt", "Silverado ZR2 in Sterling Grey")
            .with_attr("loading", "lazy")
            .with_attr("data-aspectratio", "16:9");
        let nodes = extractor.walk(&node, "https://www.chevrolet.ca/en/trucks", &DisclosureMap::new());
        let SemanticNode::Image(img) = &nodes[0] else {
            panic!("expected image");
        };
        assert_eq!(
            img.src.as_deref(),
            Some("https://www.chevrolet.ca/content/dam/silverado-zr2.jpg")
        );
        assert!(img.internal);
        assert_eq!(img.loading.as_deref(), Some("lazy"));
        assert_eq!(img.data.get("data-aspectratio").map(String::as_str), Some("16:9"));
    }

    #[test]
    fn source_srcset_keeps_descriptors() {
        let extractor = Extractor::new(ExtractConfig::default());
        let node = RawNode::new("source")
            .with_attr("srcset", "/a.jpg 1x,\n/b.jpg 2x")
            .with_attr("media", "(min-width: 600px)");
        let nodes = extractor.walk(&node, "https://www.chevrolet.ca/", &DisclosureMap::new());
        let SemanticNode::Image(img) = &nodes[0] else {
            panic!("expected image");
        };
        assert_eq!(
            img.srcset.as_deref(),
            Some("https://www.chevrolet.ca/a.jpg 1x, https://www.chevrolet.ca/b.jpg 2x")
        );
        assert!(img.src.is_none());
    }
}
