//! HTML ingestion: an already-downloaded document into a [`RawPage`].
//!
//! No fetching happens here; callers hand over the markup.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

use pagegraph_shared::{HeadMetadata, HtmlSelectors, PageGraphError, RawNode, RawPage, Result};

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| PageGraphError::config(format!("invalid selector `{css}`: {e}")))
}

/// Parse `html` fetched from `url` into the raw page shape.
pub fn parse_html_page(html: &str, url: &str, selectors: &HtmlSelectors) -> Result<RawPage> {
    if url.trim().is_empty() {
        return Err(PageGraphError::validation("page has an empty url"));
    }

    let doc = Html::parse_document(html);
    let metadata = extract_head(&doc)?;

    let navbar = select_nodes(&doc, &selectors.navbar)?;
    let footer = select_nodes(&doc, &selectors.footer)?;
    let mut main_body_content = select_nodes(&doc, &selectors.main)?;
    if main_body_content.is_empty() {
        debug!(selector = %selectors.main, "main selector matched nothing, using <body>");
        main_body_content = select_nodes(&doc, "body")?;
    }

    Ok(RawPage {
        url: url.to_string(),
        metadata,
        navbar,
        main_body_content,
        footer,
        observed_at: None,
    })
}

fn extract_head(doc: &Html) -> Result<HeadMetadata> {
    let first_attr = |css: &str, attr: &str| -> Result<Option<String>> {
        let sel = selector(css)?;
        Ok(doc
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr(attr))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    };

    let title_sel = selector("title")?;
    let title = doc
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let mut opengraph = BTreeMap::new();
    let og_sel = selector(r#"meta[property^="og:"], meta[name^="og:"]"#)?;
    for el in doc.select(&og_sel) {
        let key = el
            .value()
            .attr("property")
            .or_else(|| el.value().attr("name"))
            .unwrap_or_default();
        if let Some(name) = key.strip_prefix("og:") {
            opengraph.insert(name.to_string(), el.value().attr("content").map(String::from));
        }
    }

    let mut twitter = BTreeMap::new();
    let tw_sel = selector(r#"meta[name^="twitter:"]"#)?;
    for el in doc.select(&tw_sel) {
        if let Some(name) = el.value().attr("name").and_then(|n| n.strip_prefix("twitter:")) {
            twitter.insert(name.to_string(), el.value().attr("content").map(String::from));
        }
    }

    Ok(HeadMetadata {
        title,
        description: first_attr(r#"meta[name="description"]"#, "content")?,
        canonical: first_attr(r#"link[rel="canonical"]"#, "href")?,
        locale: first_attr("html[lang]", "lang")?,
        opengraph,
        twitter,
    })
}

fn select_nodes(doc: &Html, css: &str) -> Result<Vec<RawNode>> {
    let sel = selector(css)?;
    Ok(doc.select(&sel).map(to_raw).collect())
}

/// Convert a parsed element into a raw node. Direct text children are
/// concatenated into `text`; comments are dropped.
fn to_raw(el: ElementRef<'_>) -> RawNode {
    let mut node = RawNode::new(el.value().name());
    for (name, value) in el.value().attrs() {
        node.attrs.insert(name.to_string(), value.to_string());
    }

    let mut text = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(t) => {
                text.push_str(t);
                text.push(' ');
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    node.children.push(to_raw(child_el));
                }
            }
            _ => {}
        }
    }
    let text = text.trim();
    if !text.is_empty() {
        node.text = Some(text.to_string());
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/html")
            .join(name);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("missing fixture {}: {e}", path.display()))
    }

    #[test]
    fn parses_head_and_regions() {
        let html = fixture("silverado.html");
        let page = parse_html_page(
            &html,
            "https://www.chevrolet.ca/en/trucks/silverado-1500",
            &HtmlSelectors::default(),
        )
        .expect("parse fixture");

        assert_eq!(
            page.metadata.title.as_deref(),
            Some("2025 Chevrolet Silverado 1500 | Pickup Truck | Chevrolet Canada")
        );
        assert_eq!(
            page.metadata.canonical.as_deref(),
            Some("https://www.chevrolet.ca/en/trucks/silverado-1500")
        );
        assert_eq!(page.metadata.locale.as_deref(), Some("en-CA"));
        assert_eq!(
            page.metadata.opengraph.get("type"),
            Some(&Some("website".to_string()))
        );
        assert_eq!(page.navbar.len(), 1);
        assert_eq!(page.main_body_content.len(), 1);
        assert_eq!(page.footer.len(), 1);
        assert_eq!(page.main_body_content[0].tag, "main");
    }

    #[test]
    fn falls_back_to_body_without_main() {
        let html = "<html><head><title>T</title></head><body><p>Hello <b>there</b></p></body></html>";
        let page = parse_html_page(html, "https://example.com/", &HtmlSelectors::default())
            .expect("parse");
        assert_eq!(page.main_body_content[0].tag, "body");
        let p = &page.main_body_content[0].children[0];
        assert_eq!(p.text.as_deref(), Some("Hello"));
        assert_eq!(p.children[0].text.as_deref(), Some("there"));
    }

    #[test]
    fn bad_selector_is_a_config_error() {
        let selectors = HtmlSelectors {
            main: "main[".into(),
            ..HtmlSelectors::default()
        };
        let err = parse_html_page("<html></html>", "https://example.com/", &selectors).unwrap_err();
        assert!(err.to_string().starts_with("config error"));
    }
}
