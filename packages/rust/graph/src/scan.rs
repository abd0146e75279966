//! Per-page scanning: what a single semantic record contributes to the graph.
//!
//! Scanning never merges across pages. It produces a self-contained graph
//! fragment that the normalizer folds into the running graph.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use pagegraph_shared::{
    AttrValue, GenericNode, LinkNode, NormalizeConfig, PageSemanticRecord, SemanticNode,
    asset_id, collapse_whitespace, slugify,
};

use crate::lines::{lines_from_texts, merge_lines};
use crate::merge::fold_asset;
use crate::model::{
    Asset, Award, Disclosure, Graph, Model, ModelLinks, PriceEntry, RegionalPrice, RelatedModel,
    Section, Trim,
};

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid regex"));

/// Locale assumed when the page head does not declare one.
pub const DEFAULT_LOCALE: &str = "en-CA";

/// Longest paragraph, in words, still read as a trim tagline.
const TAGLINE_MAX_WORDS: usize = 20;

/// Compiled patterns shared by every page scan.
pub(crate) struct Patterns {
    pub award: Regex,
    /// Trim name and its whole-word matcher, longest name first.
    pub trims: Vec<(String, Regex)>,
}

/// Model identity parsed from a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelIdentity {
    pub id: String,
    pub name: String,
    pub year: Option<u16>,
}

/// Year and model name from a head title such as
/// `2025 Chevrolet Silverado 1500 | Pickup Truck | Chevrolet Canada`,
/// falling back to the last path segment of `url`.
pub fn model_identity(title: Option<&str>, url: &str, brands: &[String]) -> ModelIdentity {
    let title = title.unwrap_or_default();
    let year = YEAR_RE
        .find(title)
        .and_then(|m| m.as_str().parse::<u16>().ok());

    let mut name = title_model_name(title, brands);
    if name.is_empty() {
        name = url_model_name(url);
    }

    let slug = slugify(&name);
    let id = match year {
        Some(year) => format!("{slug}-{year}"),
        None => slug,
    };
    ModelIdentity { id, name, year }
}

fn title_model_name(title: &str, brands: &[String]) -> String {
    let after_brand = brands
        .iter()
        .filter(|b| !b.is_empty())
        .filter_map(|b| title.find(b.as_str()).map(|i| (i, b.len())))
        .min_by_key(|(i, _)| *i)
        .map_or(title, |(i, len)| &title[i + len..]);
    let head = after_brand.split('|').next().unwrap_or_default();
    collapse_whitespace(&YEAR_RE.replace_all(head, ""))
}

fn url_model_name(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.rfind(|seg| !seg.is_empty()).map(String::from))
        })
        .unwrap_or_default();
    segment
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim().trim_end_matches('/') == b.trim().trim_end_matches('/')
}

/// Amounts arrive as strings like `$36,733` or as bare numbers.
pub fn normalize_amount(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | '\u{a0}' | '\u{202f}' | '\u{2007}'))
        .collect();
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

fn disclosure_ids_in(node: &SemanticNode) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    node.walk(&mut |n| {
        if let SemanticNode::DisclosureRef(d) = n {
            if let Some(id) = &d.disclosure_id {
                ids.insert(id.clone());
            }
        }
    });
    ids
}

/// Fill-only fold used inside a single page; cross-page conflicts are the
/// normalizer's business.
fn fill_prices(target: &mut BTreeMap<String, RegionalPrice>, incoming: BTreeMap<String, RegionalPrice>) {
    for (region, price) in incoming {
        let slot = target.entry(region).or_insert_with(|| RegionalPrice {
            currency: price.currency.clone(),
            ..RegionalPrice::default()
        });
        if slot.from_amount.is_none() {
            slot.from_amount = price.from_amount;
            slot.from_observed_at = price.from_observed_at;
        }
        if slot.as_shown_amount.is_none() {
            slot.as_shown_amount = price.as_shown_amount;
            slot.as_shown_observed_at = price.as_shown_observed_at;
        }
        slot.disclosure_ids.extend(price.disclosure_ids);
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

pub(crate) struct PageScanner<'a> {
    config: &'a NormalizeConfig,
    patterns: &'a Patterns,
    record: &'a PageSemanticRecord,
    identity: ModelIdentity,
    canonical: String,
    observed_at: Option<DateTime<Utc>>,
}

/// One heading and what followed it, before ids are assigned.
struct SectionDraft {
    title: String,
    paragraphs: Vec<String>,
    disclosure_ids: BTreeSet<String>,
    asset_ids: BTreeSet<String>,
}

enum Piece<'a> {
    Heading(&'a str),
    Paragraph(String),
    Disclosure(&'a str),
    Asset(String),
}

impl<'a> PageScanner<'a> {
    pub fn new(config: &'a NormalizeConfig, patterns: &'a Patterns, record: &'a PageSemanticRecord) -> Self {
        let canonical = record.canonical_url().trim().to_string();
        let identity = model_identity(record.metadata.title.as_deref(), &canonical, &config.brands);
        Self {
            config,
            patterns,
            record,
            identity,
            canonical,
            observed_at: record.observed_at,
        }
    }

    /// Build the graph fragment for this page.
    pub fn scan(&self) -> Graph {
        let model_id = self.identity.id.clone();
        let mut graph = Graph::default();
        let mut model = Model {
            id: model_id.clone(),
            name: self.identity.name.clone(),
            year: self.identity.year,
            canonical_url: self.canonical.clone(),
            locale: self
                .record
                .metadata
                .locale
                .clone()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            metadata: self.record.metadata.clone(),
            section_ids: BTreeSet::new(),
            trim_ids: BTreeSet::new(),
            price_ids: BTreeSet::new(),
            asset_ids: BTreeSet::new(),
            award_ids: BTreeSet::new(),
            related_model_ids: BTreeSet::new(),
            links: self.commerce_links(),
            source_urls: BTreeSet::from([self.record.url.clone()]),
        };

        for disclosure in &self.record.disclosures {
            graph.disclosures.insert(
                disclosure.id.clone(),
                Disclosure {
                    id: disclosure.id.clone(),
                    text: disclosure.text.clone(),
                    reference_ids: disclosure.reference_ids.iter().cloned().collect(),
                    referenced_by: BTreeSet::new(),
                },
            );
        }

        for asset in self.assets() {
            model.asset_ids.insert(asset.id.clone());
            match graph.assets.entry(asset.id.clone()) {
                Entry::Occupied(mut slot) => fold_asset(slot.get_mut(), asset),
                Entry::Vacant(slot) => {
                    slot.insert(asset);
                }
            }
        }

        for (region, price) in self.model_prices() {
            let id = format!("price:{model_id}:{region}");
            model.price_ids.insert(id.clone());
            graph.prices.insert(
                id.clone(),
                PriceEntry {
                    id,
                    model_id: model_id.clone(),
                    region,
                    price,
                    source_urls: BTreeSet::from([self.record.url.clone()]),
                },
            );
        }

        let drafts = self.section_drafts();
        for award in self.awards(&drafts) {
            model.award_ids.insert(award.id.clone());
            graph.awards.insert(award.id.clone(), award);
        }
        for draft in drafts {
            let id = format!("sec:{model_id}:{}", slugify(&draft.title));
            let section = Section {
                id: id.clone(),
                model_id: model_id.clone(),
                title: draft.title,
                paragraphs: lines_from_texts(&draft.paragraphs),
                disclosure_ids: draft.disclosure_ids,
                asset_ids: draft.asset_ids,
                source_urls: BTreeSet::from([self.record.url.clone()]),
            };
            model.section_ids.insert(id.clone());
            match graph.sections.get_mut(&id) {
                // Same heading twice on one page: treat as one section.
                Some(existing) => {
                    existing.paragraphs = merge_lines(&existing.paragraphs, &section.paragraphs);
                    existing.disclosure_ids.extend(section.disclosure_ids);
                    existing.asset_ids.extend(section.asset_ids);
                }
                None => {
                    graph.sections.insert(id, section);
                }
            }
        }

        for trim in self.trims().into_values() {
            model.trim_ids.insert(trim.id.clone());
            graph.trims.insert(trim.id.clone(), trim);
        }

        for related in self.related_models() {
            model.related_model_ids.insert(related.id.clone());
            graph
                .related_models
                .entry(related.id.clone())
                .and_modify(|r| fill_prices(&mut r.prices, related.prices.clone()))
                .or_insert(related);
        }

        graph.models.insert(model_id, model);
        link_disclosures(&mut graph);
        graph
    }

    // ----- Prices -----

    fn regional_json(&self, node: &GenericNode) -> Option<Map<String, Value>> {
        match node.attrs.get(&self.config.regional_price_attr)? {
            AttrValue::Json(Value::Object(map)) => Some(map.clone()),
            AttrValue::Text(raw) => match serde_json::from_str(raw) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            },
            AttrValue::Json(_) => None,
        }
    }

    fn is_price_block(&self, node: &SemanticNode) -> bool {
        matches!(node, SemanticNode::Generic(g) if self.regional_json(g).is_some())
    }

    /// Region → price for one price block. The block's own text decides
    /// which field its amounts fill.
    fn read_price_block(&self, node: &SemanticNode) -> BTreeMap<String, RegionalPrice> {
        let mut out = BTreeMap::new();
        let SemanticNode::Generic(generic) = node else {
            return out;
        };
        let Some(regions) = self.regional_json(generic) else {
            return out;
        };

        let cue = node.full_text().to_lowercase();
        let has_cue = |cues: &[String]| cues.iter().any(|c| cue.contains(&c.to_lowercase()));
        let is_from = has_cue(&self.config.from_cues);
        let is_shown = has_cue(&self.config.as_shown_cues);
        let disclosure_ids = disclosure_ids_in(node);

        for (region, values) in &regions {
            let mut price = RegionalPrice {
                currency: self.config.currency.clone(),
                disclosure_ids: disclosure_ids.clone(),
                ..RegionalPrice::default()
            };
            if is_from {
                price.from_amount = values.get(&self.config.from_key).and_then(normalize_amount);
                price.from_observed_at = price.from_amount.as_ref().and(self.observed_at);
            }
            if is_shown {
                price.as_shown_amount = values
                    .get(&self.config.as_shown_key)
                    .and_then(normalize_amount);
                price.as_shown_observed_at = price.as_shown_amount.as_ref().and(self.observed_at);
            }
            if price.has_amount() {
                out.insert(region.clone(), price);
            }
        }
        out
    }

    /// Every price block under `nodes`, folded by region.
    fn prices_under(&self, nodes: &[SemanticNode]) -> BTreeMap<String, RegionalPrice> {
        let mut prices = BTreeMap::new();
        for node in nodes {
            node.walk(&mut |n| {
                if self.is_price_block(n) {
                    fill_prices(&mut prices, self.read_price_block(n));
                }
            });
        }
        prices
    }

    fn links(&self) -> Vec<&'a LinkNode> {
        let mut links = Vec::new();
        for node in self.record.all_nodes() {
            node.walk(&mut |n| {
                if let SemanticNode::Link(link) = n {
                    links.push(link);
                }
            });
        }
        links
    }

    /// Prices from links that point back at this page.
    fn model_prices(&self) -> BTreeMap<String, RegionalPrice> {
        let mut prices = BTreeMap::new();
        for link in self.links() {
            if same_url(&link.href, &self.canonical) {
                fill_prices(&mut prices, self.prices_under(&link.children));
            }
        }
        prices
    }

    // ----- Assets -----

    fn assets(&self) -> Vec<Asset> {
        let mut assets = Vec::new();
        for node in &self.record.main_body_content {
            node.walk(&mut |n| {
                if let SemanticNode::Image(img) = n {
                    let Some(src) = img.src.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
                        return;
                    };
                    assets.push(Asset {
                        id: asset_id(src),
                        url: src.to_string(),
                        alt: img.alt.as_deref().map(collapse_whitespace).filter(|a| !a.is_empty()),
                        title: img.title.as_deref().map(collapse_whitespace).filter(|t| !t.is_empty()),
                        model_ids: BTreeSet::from([self.identity.id.clone()]),
                    });
                }
            });
        }
        assets
    }

    // ----- Sections -----

    fn collect_pieces(&self, node: &'a SemanticNode, out: &mut Vec<Piece<'a>>) {
        // Price templates are read as prices, not prose.
        if self.is_price_block(node) {
            return;
        }
        match node {
            SemanticNode::Link(_) | SemanticNode::Button(_) => {}
            SemanticNode::Heading(h) => {
                out.push(Piece::Heading(&h.text));
                // Markers in a heading cite the section it opens.
                for child in &h.children {
                    self.collect_pieces(child, out);
                }
            }
            SemanticNode::RichText(_) => {
                let text = collapse_whitespace(&node.full_text());
                if !text.is_empty() {
                    out.push(Piece::Paragraph(text));
                }
                node.walk(&mut |n| match n {
                    SemanticNode::DisclosureRef(d) => {
                        if let Some(id) = &d.disclosure_id {
                            out.push(Piece::Disclosure(id));
                        }
                    }
                    SemanticNode::Image(img) => {
                        if let Some(src) = img.src.as_deref() {
                            out.push(Piece::Asset(asset_id(src.trim())));
                        }
                    }
                    _ => {}
                });
            }
            SemanticNode::Table(t) => {
                for row in &t.rows {
                    let cells: Vec<&str> = row
                        .iter()
                        .map(|c| c.trim())
                        .filter(|c| !c.is_empty())
                        .collect();
                    if !cells.is_empty() {
                        out.push(Piece::Paragraph(cells.join(" | ")));
                    }
                }
            }
            SemanticNode::DisclosureRef(d) => {
                if let Some(id) = &d.disclosure_id {
                    out.push(Piece::Disclosure(id));
                }
            }
            SemanticNode::Image(img) => {
                if let Some(src) = img.src.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                    out.push(Piece::Asset(asset_id(src)));
                }
            }
            SemanticNode::Generic(g) => {
                if let Some(text) = g.text.as_deref().map(collapse_whitespace).filter(|t| !t.is_empty()) {
                    out.push(Piece::Paragraph(text));
                }
                for child in &g.children {
                    self.collect_pieces(child, out);
                }
            }
            SemanticNode::List(l) => {
                for item in &l.items {
                    self.collect_pieces(item, out);
                }
            }
        }
    }

    /// Heading-delimited runs of the main body, in document order. Only
    /// sections with at least one paragraph survive.
    fn section_drafts(&self) -> Vec<SectionDraft> {
        let mut pieces = Vec::new();
        for node in &self.record.main_body_content {
            self.collect_pieces(node, &mut pieces);
        }

        let mut drafts = Vec::new();
        let mut current: Option<SectionDraft> = None;
        let flush = |draft: Option<SectionDraft>, drafts: &mut Vec<SectionDraft>| {
            if let Some(d) = draft.filter(|d| !d.title.is_empty() && !d.paragraphs.is_empty()) {
                drafts.push(d);
            }
        };

        for piece in pieces {
            match piece {
                Piece::Heading(title) => {
                    flush(current.take(), &mut drafts);
                    current = Some(SectionDraft {
                        title: collapse_whitespace(title),
                        paragraphs: Vec::new(),
                        disclosure_ids: BTreeSet::new(),
                        asset_ids: BTreeSet::new(),
                    });
                }
                Piece::Paragraph(text) => {
                    if let Some(d) = current.as_mut() {
                        d.paragraphs.push(text);
                    }
                }
                Piece::Disclosure(id) => {
                    if let Some(d) = current.as_mut() {
                        d.disclosure_ids.insert(id.to_string());
                    }
                }
                Piece::Asset(id) => {
                    if let Some(d) = current.as_mut() {
                        d.asset_ids.insert(id);
                    }
                }
            }
        }
        flush(current, &mut drafts);
        drafts
    }

    // ----- Awards -----

    /// Contiguous runs of award-like sections become one award each.
    fn awards(&self, drafts: &[SectionDraft]) -> Vec<Award> {
        let model_id = &self.identity.id;
        let mut awards = Vec::new();
        let mut run: Vec<&SectionDraft> = Vec::new();

        let close = |run: &mut Vec<&SectionDraft>, awards: &mut Vec<Award>| {
            let Some(first) = run.first() else {
                return;
            };
            let summary = run
                .iter()
                .flat_map(|d| d.paragraphs.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            awards.push(Award {
                id: format!("awd:{model_id}:{}", slugify(&first.title)),
                model_id: model_id.clone(),
                title: first.title.clone(),
                summary,
                disclosure_ids: run.iter().flat_map(|d| d.disclosure_ids.iter().cloned()).collect(),
                section_ids: run
                    .iter()
                    .map(|d| format!("sec:{model_id}:{}", slugify(&d.title)))
                    .collect(),
            });
            run.clear();
        };

        for draft in drafts {
            if self.patterns.award.is_match(&draft.title) {
                run.push(draft);
            } else {
                close(&mut run, &mut awards);
            }
        }
        close(&mut run, &mut awards);
        awards
    }

    // ----- Trims -----

    /// Configured spelling of `text` when it names a known trim exactly.
    fn exact_trim(&self, text: &str) -> Option<&'a str> {
        let text = collapse_whitespace(text);
        self.patterns
            .trims
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&text))
            .map(|(name, _)| name.as_str())
    }

    /// Longest trim name appearing as a whole word in `text`.
    fn trim_in_text(&self, text: &str) -> Option<&'a str> {
        self.patterns
            .trims
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(name, _)| name.as_str())
    }

    fn trims(&self) -> BTreeMap<String, Trim> {
        let mut trims = BTreeMap::new();
        let Some(window) = find_models_window(
            &self.record.main_body_content,
            &self.config.models_heading,
            self.config.trim_window,
        ) else {
            return trims;
        };

        let mut current: Option<&str> = None;
        for sibling in window {
            if let SemanticNode::Heading(h) = sibling {
                if self.exact_trim(&h.text).is_none() {
                    break;
                }
            }
            self.visit_trim_node(sibling, &mut current, &mut trims);
        }
        trims
    }

    fn ensure_trim<'m>(&self, trims: &'m mut BTreeMap<String, Trim>, name: &str) -> &'m mut Trim {
        let model_id = &self.identity.id;
        let id = format!("trim:{model_id}:{}", slugify(name));
        trims.entry(id.clone()).or_insert_with(|| Trim {
            id,
            model_id: model_id.clone(),
            name: name.to_string(),
            tagline: None,
            features: Vec::new(),
            prices: BTreeMap::new(),
        })
    }

    fn visit_trim_node(
        &self,
        node: &SemanticNode,
        current: &mut Option<&'a str>,
        trims: &mut BTreeMap<String, Trim>,
    ) {
        if self.is_price_block(node) {
            if let Some(name) = *current {
                let prices = self.read_price_block(node);
                fill_prices(&mut self.ensure_trim(trims, name).prices, prices);
            }
            return;
        }

        match node {
            SemanticNode::Heading(h) => {
                if let Some(name) = self.exact_trim(&h.text) {
                    *current = Some(name);
                    self.ensure_trim(trims, name);
                }
            }
            SemanticNode::RichText(_) => {
                let text = collapse_whitespace(&node.full_text());
                if let Some(name) = self.exact_trim(&text) {
                    *current = Some(name);
                    self.ensure_trim(trims, name);
                } else if let Some(name) = *current {
                    let short = text.split_whitespace().count() <= TAGLINE_MAX_WORDS;
                    if short && !text.is_empty() && !text.contains(':') {
                        let trim = self.ensure_trim(trims, name);
                        if trim.tagline.is_none() {
                            trim.tagline = Some(text);
                        }
                    }
                }
            }
            SemanticNode::Image(img) => {
                let found = img.alt.as_deref().and_then(|alt| self.trim_in_text(alt));
                if let Some(name) = found {
                    if *current != Some(name) {
                        *current = Some(name);
                        self.ensure_trim(trims, name);
                    }
                }
            }
            SemanticNode::List(list) => {
                if let Some(name) = current.take() {
                    let items: Vec<String> = list
                        .items
                        .iter()
                        .map(|item| collapse_whitespace(&item.full_text()))
                        .filter(|t| !t.is_empty())
                        .collect();
                    let trim = self.ensure_trim(trims, name);
                    trim.features = merge_lines(&trim.features, &lines_from_texts(&items));
                }
            }
            _ => {
                for child in node.children() {
                    self.visit_trim_node(child, current, trims);
                }
            }
        }
    }

    // ----- Related models -----

    fn related_models(&self) -> Vec<RelatedModel> {
        let mut related = Vec::new();
        for link in self.links() {
            if same_url(&link.href, &self.canonical) {
                continue;
            }
            let text = link.text.to_lowercase();
            let has_block = link
                .children
                .iter()
                .any(|c| {
                    let mut found = false;
                    c.walk(&mut |n| found |= self.is_price_block(n));
                    found
                });
            if !(has_block || (text.contains("from:") && text.contains("as shown"))) {
                continue;
            }

            let mut name: Option<String> = None;
            for child in &link.children {
                child.walk(&mut |n| {
                    if name.is_some() {
                        return;
                    }
                    if let SemanticNode::Heading(h) = n {
                        let text = collapse_whitespace(&h.text);
                        if !text.is_empty() {
                            name = Some(text);
                        }
                    }
                });
            }

            related.push(RelatedModel {
                id: related_model_id(&link.href, name.as_deref()),
                name,
                url: link.href.clone(),
                prices: self.prices_under(&link.children),
                referenced_by: BTreeSet::from([self.identity.id.clone()]),
            });
        }
        related
    }

    // ----- Commerce links -----

    fn commerce_links(&self) -> ModelLinks {
        let mut links = ModelLinks::default();
        let name_slug = slugify(&self.identity.name);
        let name_lower = self.identity.name.to_lowercase();
        let name_tokens = [
            name_lower.clone(),
            name_lower.replace(' ', "+"),
            name_lower.replace(' ', "%20"),
            name_lower.replace(' ', "-"),
        ];

        for link in self.links() {
            let href = link.href.trim();
            if href.is_empty() {
                continue;
            }
            let text = link.text.to_lowercase();
            let href_lower = href.to_lowercase();

            if links.find_dealer.is_none() && text.contains("find a dealer") {
                links.find_dealer = Some(href.to_string());
            }
            if text.contains("build") && text.contains("price") && href_lower.contains(&name_slug) {
                links.build_and_price.insert(href.to_string());
            }
            let inventory_like = text.contains("inventory") || href.contains("SearchResults");
            if inventory_like
                && !name_lower.is_empty()
                && name_tokens.iter().any(|t| href_lower.contains(t.as_str()))
            {
                links.inventory.insert(href.to_string());
            }
        }
        links
    }
}

/// Siblings following the models heading, capped at `window`.
fn find_models_window<'n>(
    nodes: &'n [SemanticNode],
    heading: &str,
    window: usize,
) -> Option<&'n [SemanticNode]> {
    for (i, node) in nodes.iter().enumerate() {
        if let SemanticNode::Heading(h) = node {
            if collapse_whitespace(&h.text).eq_ignore_ascii_case(heading.trim()) {
                let end = (i + 1 + window).min(nodes.len());
                return Some(&nodes[i + 1..end]);
            }
        }
        if let Some(found) = find_models_window(node.children(), heading, window) {
            return Some(found);
        }
    }
    None
}

/// Slug after `/en/`, else the last path segment, else the name.
pub fn related_model_id(href: &str, name: Option<&str>) -> String {
    let segment = href
        .split_once("/en/")
        .map(|(_, rest)| rest)
        .or_else(|| Url::parse(href).ok().map(|_| href))
        .and_then(|path| {
            let path = path.split(['?', '#']).next().unwrap_or_default();
            path.trim_end_matches('/')
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty() && !s.contains(':'))
                .map(String::from)
        });
    match (segment, name) {
        (Some(seg), _) => slugify(&seg),
        (None, Some(name)) => slugify(name),
        (None, None) => slugify(href),
    }
}

/// Record which entities cite each disclosure present in the fragment.
fn link_disclosures(graph: &mut Graph) {
    let mut citations: Vec<(String, String)> = Vec::new();
    let mut cite = |ids: &BTreeSet<String>, entity: &str| {
        for id in ids {
            citations.push((id.clone(), entity.to_string()));
        }
    };

    for p in graph.prices.values() {
        cite(&p.price.disclosure_ids, &p.id);
    }
    for s in graph.sections.values() {
        cite(&s.disclosure_ids, &s.id);
    }
    for a in graph.awards.values() {
        cite(&a.disclosure_ids, &a.id);
    }
    for t in graph.trims.values() {
        for price in t.prices.values() {
            cite(&price.disclosure_ids, &t.id);
        }
    }
    for r in graph.related_models.values() {
        for price in r.prices.values() {
            cite(&price.disclosure_ids, &r.id);
        }
    }

    for (disclosure, entity) in citations {
        if let Some(d) = graph.disclosures.get_mut(&disclosure) {
            d.referenced_by.insert(entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_from_title() {
        let brands = vec!["Chevrolet".to_string(), "GMC".to_string()];
        let id = model_identity(
            Some("2025 Chevrolet Silverado 1500 | Pickup Truck | Chevrolet Canada"),
            "https://www.chevrolet.ca/en/trucks/silverado-1500",
            &brands,
        );
        assert_eq!(id.name, "Silverado 1500");
        assert_eq!(id.year, Some(2025));
        assert_eq!(id.id, "silverado-1500-2025");
    }

    #[test]
    fn identity_falls_back_to_url() {
        let id = model_identity(None, "https://www.chevrolet.ca/en/suvs/trax/", &[]);
        assert_eq!(id.name, "Trax");
        assert_eq!(id.year, None);
        assert_eq!(id.id, "trax");
    }

    #[test]
    fn identity_without_brand_uses_text_before_pipe() {
        let id = model_identity(Some("2024 Equinox EV | Electric SUV"), "https://x.ca/en/equinox-ev", &[]);
        assert_eq!(id.name, "Equinox EV");
        assert_eq!(id.id, "equinox-ev-2024");
    }

    #[test]
    fn amounts_lose_currency_and_odd_spaces() {
        assert_eq!(normalize_amount(&Value::from("$36,733")).as_deref(), Some("36,733"));
        assert_eq!(normalize_amount(&Value::from("$\u{a0}46\u{202f}673")).as_deref(), Some("46673"));
        assert_eq!(normalize_amount(&Value::from(41999)).as_deref(), Some("41999"));
        assert_eq!(normalize_amount(&Value::from("  $ ")), None);
        assert_eq!(normalize_amount(&Value::Null), None);
    }

    #[test]
    fn related_ids_follow_locale_path() {
        assert_eq!(
            related_model_id("https://www.chevrolet.ca/en/trucks/colorado/", None),
            "colorado"
        );
        assert_eq!(related_model_id("https://www.gmc.ca/sierra-hd?x=1", None), "sierra-hd");
        assert_eq!(related_model_id("#", Some("Silverado EV")), "silverado-ev");
    }
}
