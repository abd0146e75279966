//! Graph → embedding documents.

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use pagegraph_graph::{Award, Graph, Model, Section};
use pagegraph_shared::{
    CURRENT_SCHEMA_VERSION, DocumentsConfig, PageGraphError, Result, short_hash,
};

use crate::chunking::{group_sizes, split_block, word_count};
use crate::cleaning::{
    CleanOptions, append_disclosure_cue, clean_lines, clean_text, strip_footnote_markers,
};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Overview,
    Price,
    Feature,
    Award,
}

/// Everything needed to trace a chunk back to the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub model_id: String,
    pub model_name: String,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub section_title: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub doc_type: DocType,
    pub locale: String,
    #[serde(default)]
    pub asset_ids: Vec<String>,
    #[serde(default)]
    pub disclosure_ids: Vec<String>,
    #[serde(default)]
    pub trim_ids: Vec<String>,
    #[serde(default)]
    pub price_ids: Vec<String>,
    pub schema_version: u32,
    /// Zero-based position within its group.
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub char_count: usize,
    pub word_count: usize,
    /// First 16 hex chars of the SHA-256 of `text`.
    pub content_hash: String,
    pub source_url: String,
    #[serde(default)]
    pub source_domain: Option<String>,
}

/// One embedding-ready chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingDocument {
    pub id: String,
    pub text: String,
    pub doc_type: DocType,
    pub metadata: DocumentMetadata,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Converts a normalized graph into cleaned, bounded documents.
pub struct DocumentBuilder {
    config: DocumentsConfig,
    topics: Regex,
}

/// Per-model context shared by every document of that model.
struct ModelScope<'g> {
    graph: &'g Graph,
    model: &'g Model,
    /// Trim id and a case-sensitive whole-word matcher for its name.
    trims: Vec<(String, Regex)>,
    source_domain: Option<String>,
}

/// Title line, cue and remaining body budget for one section's chunks.
struct ChunkFrame {
    title: String,
    cue: bool,
    budget: usize,
}

/// A document before metadata counts are filled in.
struct Draft {
    id: String,
    text: String,
    doc_type: DocType,
    section_id: Option<String>,
    section_title: Option<String>,
    region: Option<String>,
    asset_ids: BTreeSet<String>,
    disclosure_ids: BTreeSet<String>,
    price_ids: Vec<String>,
    chunk_index: usize,
    chunk_count: usize,
}

impl DocumentBuilder {
    pub fn new(config: DocumentsConfig) -> Result<Self> {
        let topics = Regex::new(&config.interesting_topics).map_err(|e| {
            PageGraphError::config(format!("invalid documents.interesting_topics: {e}"))
        })?;
        if config.max_words == 0 {
            return Err(PageGraphError::config("documents.max_words must be positive"));
        }
        Ok(Self { config, topics })
    }

    pub fn config(&self) -> &DocumentsConfig {
        &self.config
    }

    /// Every document for every model, grouped by model id.
    #[instrument(skip_all, fields(models = graph.models.len()))]
    pub fn build(&self, graph: &Graph) -> Vec<EmbeddingDocument> {
        let mut docs = Vec::new();
        for model in graph.models.values() {
            let scope = self.scope(graph, model);
            let before = docs.len();
            docs.extend(self.model_documents(&scope));
            debug!(model = %model.id, documents = docs.len() - before, "built model documents");
        }
        info!(documents = docs.len(), "built documents");
        docs
    }

    fn scope<'g>(&self, graph: &'g Graph, model: &'g Model) -> ModelScope<'g> {
        let mut trims: Vec<(String, Regex)> = graph
            .trims_of(model)
            .filter_map(|t| {
                Regex::new(&format!(r"\b{}\b", regex::escape(&t.name)))
                    .ok()
                    .map(|re| (t.id.clone(), re))
            })
            .collect();
        trims.sort_by(|a, b| a.0.cmp(&b.0));
        let source_domain = Url::parse(&model.canonical_url)
            .ok()
            .and_then(|u| u.host_str().map(String::from));
        ModelScope {
            graph,
            model,
            trims,
            source_domain,
        }
    }

    fn model_documents(&self, scope: &ModelScope<'_>) -> Vec<EmbeddingDocument> {
        let mut drafts = vec![self.overview(scope)];
        drafts.extend(self.prices(scope));
        for section in scope.graph.sections_of(scope.model) {
            if self.topics.is_match(&section.title) {
                drafts.extend(self.features(scope, section));
            }
        }
        for award in scope.graph.awards_of(scope.model) {
            drafts.push(self.award(scope, award));
        }
        drafts
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .map(|d| self.finish(scope, d))
            .collect()
    }

    fn clean(&self, text: &str, has_disclosures: bool) -> String {
        clean_text(
            text,
            &CleanOptions {
                disclosure_cue: &self.config.disclosure_cue,
                has_disclosures,
                unit_window: self.config.unit_window,
            },
        )
    }

    // ----- Overview -----

    fn overview(&self, scope: &ModelScope<'_>) -> Draft {
        let model = scope.model;
        let heading = display_name(model);
        let lines: Vec<&str> = [
            Some(heading.as_str()),
            model.metadata.title.as_deref(),
            model.metadata.description.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();

        Draft {
            id: format!("doc:{}:overview", model.id),
            text: self.clean(&lines.join("\n"), false),
            doc_type: DocType::Overview,
            section_id: None,
            section_title: Some("Overview".into()),
            region: None,
            asset_ids: model.asset_ids.clone(),
            disclosure_ids: BTreeSet::new(),
            price_ids: Vec::new(),
            chunk_index: 0,
            chunk_count: 1,
        }
    }

    // ----- Prices -----

    fn prices(&self, scope: &ModelScope<'_>) -> Vec<Draft> {
        let model = scope.model;
        scope
            .graph
            .prices_of(model)
            .filter(|p| p.price.has_amount())
            .map(|entry| {
                let text = format!(
                    "{} pricing ({})\nFrom: {}; As shown: {}.",
                    display_name(model),
                    entry.region,
                    format_amount(entry.price.from_amount.as_deref(), &entry.price.currency),
                    format_amount(entry.price.as_shown_amount.as_deref(), &entry.price.currency),
                );
                let disclosures = entry.price.disclosure_ids.clone();
                Draft {
                    id: format!("doc:{}:pricing:{}", model.id, entry.region),
                    text: self.clean(&text, !disclosures.is_empty()),
                    doc_type: DocType::Price,
                    section_id: None,
                    section_title: Some("Pricing".into()),
                    region: Some(entry.region.clone()),
                    asset_ids: BTreeSet::new(),
                    disclosure_ids: disclosures,
                    price_ids: vec![entry.id.clone()],
                    chunk_index: 0,
                    chunk_count: 1,
                }
            })
            .collect()
    }

    // ----- Features -----

    /// Paragraph groups of 2-3, then split until title line, body and cue
    /// fit the word bound.
    fn features(&self, scope: &ModelScope<'_>, section: &Section) -> Vec<Draft> {
        let paragraphs: Vec<String> = section.paragraph_texts().map(String::from).collect();
        let paragraphs = clean_lines(&paragraphs, self.config.unit_window);
        if paragraphs.is_empty() {
            return Vec::new();
        }

        let cleaned_title = strip_footnote_markers(&section.title);
        let has_disclosures = !section.disclosure_ids.is_empty();
        let frame = self.chunk_frame(&cleaned_title, has_disclosures);
        let budget = frame.budget;

        let mut blocks = Vec::new();
        let mut start = 0;
        for size in group_sizes(paragraphs.len(), self.config.paragraphs_per_chunk) {
            blocks.extend(split_block(&paragraphs[start..start + size], budget));
            start += size;
        }

        let section_slug = section.id.rsplit(':').next().unwrap_or("section");
        let count = blocks.len();
        blocks
            .into_iter()
            .enumerate()
            .map(|(index, block)| {
                let block = block.join("\n");
                let body = if frame.title.is_empty() {
                    block
                } else {
                    format!("{}\n{block}", frame.title)
                };
                Draft {
                    id: format!("doc:{}:{section_slug}:ch{}", scope.model.id, index + 1),
                    text: append_disclosure_cue(&body, &self.config.disclosure_cue, frame.cue),
                    doc_type: DocType::Feature,
                    section_id: Some(section.id.clone()),
                    section_title: Some(section.title.clone()),
                    region: None,
                    asset_ids: section.asset_ids.clone(),
                    disclosure_ids: section.disclosure_ids.clone(),
                    price_ids: Vec::new(),
                    chunk_index: index,
                    chunk_count: count,
                }
            })
            .collect()
    }

    /// Title line and cue that fit around a chunk body. When they would
    /// crowd out the body, the title is cut to its leading words so at
    /// least half of what remains is body; the cue is dropped only when it
    /// alone fills the bound.
    fn chunk_frame(&self, title: &str, has_disclosures: bool) -> ChunkFrame {
        let max_words = self.config.max_words;
        let cue_words = word_count(&self.config.disclosure_cue);
        let cue = has_disclosures && cue_words > 0 && cue_words < max_words;
        let available = max_words - if cue { cue_words } else { 0 };

        let title_words: Vec<&str> = title.split_whitespace().collect();
        let kept = title_words.len().min(available / 2);
        ChunkFrame {
            title: title_words[..kept].join(" "),
            cue,
            budget: available - kept,
        }
    }

    // ----- Awards -----

    fn award(&self, scope: &ModelScope<'_>, award: &Award) -> Draft {
        let text = format!("{}\n{}", award.title, award.summary);
        let asset_ids = award
            .section_ids
            .iter()
            .filter_map(|id| scope.graph.sections.get(id))
            .flat_map(|s| s.asset_ids.iter().cloned())
            .collect();
        let slug = award.id.rsplit(':').next().unwrap_or("award");
        Draft {
            id: format!("doc:{}:award:{slug}", scope.model.id),
            text: self.clean(&text, !award.disclosure_ids.is_empty()),
            doc_type: DocType::Award,
            section_id: Some(award.id.clone()),
            section_title: Some(award.title.clone()),
            region: None,
            asset_ids,
            disclosure_ids: award.disclosure_ids.clone(),
            price_ids: Vec::new(),
            chunk_index: 0,
            chunk_count: 1,
        }
    }

    // ----- Metadata -----

    fn finish(&self, scope: &ModelScope<'_>, draft: Draft) -> EmbeddingDocument {
        let model = scope.model;
        let trim_ids = scope
            .trims
            .iter()
            .filter(|(_, re)| re.is_match(&draft.text))
            .map(|(id, _)| id.clone())
            .collect();

        let metadata = DocumentMetadata {
            model_id: model.id.clone(),
            model_name: model.name.clone(),
            year: model.year,
            section_id: draft.section_id,
            section_title: draft.section_title,
            region: draft.region,
            doc_type: draft.doc_type,
            locale: model.locale.clone(),
            asset_ids: draft.asset_ids.into_iter().collect(),
            disclosure_ids: draft.disclosure_ids.into_iter().collect(),
            trim_ids,
            price_ids: draft.price_ids,
            schema_version: CURRENT_SCHEMA_VERSION,
            chunk_index: draft.chunk_index,
            chunk_count: draft.chunk_count,
            char_count: draft.text.chars().count(),
            word_count: word_count(&draft.text),
            content_hash: short_hash(&draft.text, 16),
            source_url: model.canonical_url.clone(),
            source_domain: scope.source_domain.clone(),
        };

        EmbeddingDocument {
            id: draft.id,
            text: draft.text,
            doc_type: draft.doc_type,
            metadata,
        }
    }
}

fn display_name(model: &Model) -> String {
    match model.year {
        Some(year) => format!("{year} {}", model.name),
        None => model.name.clone(),
    }
}

/// `CAD $36,733`, or `n/a` when the field is missing.
fn format_amount(amount: Option<&str>, currency: &str) -> String {
    match amount {
        Some(a) if a.chars().any(|c| c.is_ascii_digit()) => format!("{currency} ${a}"),
        Some(a) => a.to_string(),
        None => "n/a".into(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pagegraph_graph::{PriceEntry, RegionalPrice, Trim, lines_from_texts};
    use pagegraph_shared::HeadMetadata;

    use super::*;

    const MODEL_ID: &str = "silverado-1500-2025";

    fn builder() -> DocumentBuilder {
        DocumentBuilder::new(DocumentsConfig::default()).expect("default config")
    }

    fn graph() -> Graph {
        let mut graph = Graph::default();
        let model = Model {
            id: MODEL_ID.into(),
            name: "Silverado 1500".into(),
            year: Some(2025),
            canonical_url: "https://www.chevrolet.ca/en/trucks/silverado-1500".into(),
            locale: "en-CA".into(),
            metadata: HeadMetadata {
                title: Some("2025 Chevrolet Silverado 1500 | Pickup Truck".into()),
                description: Some("Built to tow and haul.".into()),
                ..HeadMetadata::default()
            },
            section_ids: BTreeSet::new(),
            trim_ids: BTreeSet::new(),
            price_ids: BTreeSet::new(),
            asset_ids: BTreeSet::new(),
            award_ids: BTreeSet::new(),
            related_model_ids: BTreeSet::new(),
            links: Default::default(),
            source_urls: BTreeSet::new(),
        };
        graph.models.insert(model.id.clone(), model);
        graph
    }

    fn add_section(graph: &mut Graph, title: &str, paragraphs: &[&str], disclosures: &[&str]) {
        let section = Section {
            id: format!("sec:{MODEL_ID}:{}", pagegraph_shared::slugify(title)),
            model_id: MODEL_ID.into(),
            title: title.into(),
            paragraphs: lines_from_texts(paragraphs),
            disclosure_ids: disclosures.iter().map(|d| d.to_string()).collect(),
            asset_ids: BTreeSet::new(),
            source_urls: BTreeSet::new(),
        };
        if let Some(model) = graph.models.get_mut(MODEL_ID) {
            model.section_ids.insert(section.id.clone());
        }
        graph.sections.insert(section.id.clone(), section);
    }

    fn add_trim(graph: &mut Graph, name: &str) {
        let trim = Trim {
            id: format!("trim:{MODEL_ID}:{}", pagegraph_shared::slugify(name)),
            model_id: MODEL_ID.into(),
            name: name.into(),
            tagline: None,
            features: Vec::new(),
            prices: BTreeMap::new(),
        };
        if let Some(model) = graph.models.get_mut(MODEL_ID) {
            model.trim_ids.insert(trim.id.clone());
        }
        graph.trims.insert(trim.id.clone(), trim);
    }

    fn doc<'a>(docs: &'a [EmbeddingDocument], id: &str) -> &'a EmbeddingDocument {
        docs.iter()
            .find(|d| d.id == id)
            .unwrap_or_else(|| panic!("missing {id}: {:?}", docs.iter().map(|d| &d.id).collect::<Vec<_>>()))
    }

    #[test]
    fn overview_uses_head_metadata() {
        let docs = builder().build(&graph());
        assert_eq!(docs.len(), 1);
        let overview = doc(&docs, "doc:silverado-1500-2025:overview");
        assert_eq!(overview.doc_type, DocType::Overview);
        assert_eq!(
            overview.text,
            "2025 Silverado 1500\n2025 Chevrolet Silverado 1500 | Pickup Truck\nBuilt to tow and haul."
        );
        assert_eq!(overview.metadata.source_domain.as_deref(), Some("www.chevrolet.ca"));
        assert_eq!(overview.metadata.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(overview.metadata.content_hash.len(), 16);
    }

    #[test]
    fn price_document_reports_missing_fields() {
        let mut graph = graph();
        for (region, from) in [("ON", Some("36,733")), ("QC", None)] {
            let entry = PriceEntry {
                id: format!("price:{MODEL_ID}:{region}"),
                model_id: MODEL_ID.into(),
                region: region.into(),
                price: RegionalPrice {
                    from_amount: from.map(String::from),
                    currency: "CAD".into(),
                    disclosure_ids: ["disc:abc".to_string()].into(),
                    ..RegionalPrice::default()
                },
                source_urls: BTreeSet::new(),
            };
            if let Some(model) = graph.models.get_mut(MODEL_ID) {
                model.price_ids.insert(entry.id.clone());
            }
            graph.prices.insert(entry.id.clone(), entry);
        }

        let docs = builder().build(&graph);
        let on = doc(&docs, "doc:silverado-1500-2025:pricing:ON");
        assert_eq!(
            on.text,
            "2025 Silverado 1500 pricing (ON)\nFrom: CAD $36,733; As shown: n/a.\n[See disclosures]"
        );
        assert_eq!(on.metadata.region.as_deref(), Some("ON"));
        assert_eq!(on.metadata.price_ids, vec!["price:silverado-1500-2025:ON"]);
        assert_eq!(on.metadata.disclosure_ids, vec!["disc:abc"]);
        assert!(docs.iter().all(|d| d.id != "doc:silverado-1500-2025:pricing:QC"));
    }

    #[test]
    fn feature_sections_chunk_in_pairs() {
        let mut graph = graph();
        add_section(
            &mut graph,
            "Towing",
            &[
                "Up to 13,300 lbs of max trailering.",
                "Available Max Trailering Package.",
                "Integrated trailer brake controller.",
                "Up to 14 camera views.",
            ],
            &["disc:tow"],
        );

        let docs = builder().build(&graph);
        let chunks: Vec<_> = docs.iter().filter(|d| d.doc_type == DocType::Feature).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "doc:silverado-1500-2025:towing:ch1");
        assert_eq!(chunks[1].id, "doc:silverado-1500-2025:towing:ch2");
        assert_eq!(
            chunks[0].text,
            "Towing\nUp to 13,300 lbs (6,033 kg) of max trailering.\nAvailable Max Trailering Package.\n[See disclosures]"
        );
        assert_eq!(chunks[1].metadata.chunk_index, 1);
        assert_eq!(chunks[1].metadata.chunk_count, 2);
        assert_eq!(chunks[1].metadata.section_title.as_deref(), Some("Towing"));
    }

    #[test]
    fn uninteresting_sections_are_skipped() {
        let mut graph = graph();
        add_section(&mut graph, "Shop Our Vehicles", &["Browse the lineup today."], &[]);
        let docs = builder().build(&graph);
        assert!(docs.iter().all(|d| d.doc_type != DocType::Feature));
    }

    #[test]
    fn chunks_never_exceed_word_bound() {
        let mut graph = graph();
        let long: Vec<String> = (0..6)
            .map(|p| {
                (0..20)
                    .map(|s| format!("Sentence {p} {s} covers payload detail."))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        let refs: Vec<&str> = long.iter().map(String::as_str).collect();
        add_section(&mut graph, "Performance", &refs, &["disc:perf"]);

        let config = DocumentsConfig {
            max_words: 60,
            ..DocumentsConfig::default()
        };
        let docs = DocumentBuilder::new(config).expect("config").build(&graph);
        let chunks: Vec<_> = docs.iter().filter(|d| d.doc_type == DocType::Feature).collect();
        assert!(chunks.len() > 6);
        for chunk in &chunks {
            assert!(chunk.metadata.word_count <= 60, "{} has {} words", chunk.id, chunk.metadata.word_count);
            assert!(chunk.text.starts_with("Performance\n"));
            assert!(chunk.text.ends_with("[See disclosures]"));
        }
        let ids: BTreeSet<_> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), chunks.len());
    }

    #[test]
    fn long_title_is_cut_to_fit_small_bound() {
        let mut graph = graph();
        add_section(
            &mut graph,
            "Towing and Trailering Capability Overview",
            &[
                "Tow up to 13,300 lbs with the available Max Trailering Package.",
                "Integrated trailer brake controller comes standard.",
            ],
            &["disc:tow"],
        );

        let config = DocumentsConfig {
            max_words: 5,
            ..DocumentsConfig::default()
        };
        let docs = DocumentBuilder::new(config).expect("config").build(&graph);
        let chunks: Vec<_> = docs.iter().filter(|d| d.doc_type == DocType::Feature).collect();
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(
                chunk.metadata.word_count <= 5,
                "{} has {} words: {:?}",
                chunk.id,
                chunk.metadata.word_count,
                chunk.text
            );
            assert!(chunk.text.ends_with("[See disclosures]"));
            assert_eq!(
                chunk.metadata.section_title.as_deref(),
                Some("Towing and Trailering Capability Overview")
            );
        }

        let tiny = DocumentsConfig {
            max_words: 2,
            ..DocumentsConfig::default()
        };
        let docs = DocumentBuilder::new(tiny).expect("config").build(&graph);
        for chunk in docs.iter().filter(|d| d.doc_type == DocType::Feature) {
            assert!(chunk.metadata.word_count <= 2, "{:?}", chunk.text);
            assert!(!chunk.text.contains("[See disclosures]"));
            assert_eq!(chunk.metadata.disclosure_ids, vec!["disc:tow"]);
        }
    }

    #[test]
    fn trims_are_matched_as_whole_words() {
        let mut graph = graph();
        add_trim(&mut graph, "LT");
        add_trim(&mut graph, "ZR2");
        add_section(
            &mut graph,
            "Performance",
            &["The ZR2 brings Multimatic dampers.", "ALTITUDE ready and VOLT free."],
            &[],
        );
        let docs = builder().build(&graph);
        let chunk = doc(&docs, "doc:silverado-1500-2025:performance:ch1");
        assert_eq!(chunk.metadata.trim_ids, vec!["trim:silverado-1500-2025:zr2"]);
    }

    #[test]
    fn invalid_topic_pattern_is_a_config_error() {
        let config = DocumentsConfig {
            interesting_topics: "(unclosed".into(),
            ..DocumentsConfig::default()
        };
        let err = DocumentBuilder::new(config).err().expect("error");
        assert!(err.to_string().contains("interesting_topics"));
    }
}
