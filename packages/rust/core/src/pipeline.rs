//! End-to-end pipeline: raw pages → semantic records → graph → documents.

use std::time::{Duration, Instant};

use tracing::{info, instrument};

use pagegraph_documents::{DocumentBuilder, EmbeddingDocument};
use pagegraph_extract::{DisclosureMap, Extractor};
use pagegraph_graph::{Graph, MergeReport, Normalizer};
use pagegraph_shared::{AppConfig, PageSemanticRecord, RawPage, Result};

/// Everything one pipeline run produces.
#[derive(Debug)]
pub struct PipelineResult {
    /// One record per input page, in input order.
    pub records: Vec<PageSemanticRecord>,
    pub graph: Graph,
    pub report: MergeReport,
    pub documents: Vec<EmbeddingDocument>,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each page is extracted.
    fn page_extracted(&self, url: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &PipelineResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_extracted(&self, _url: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &PipelineResult) {}
}

/// The three stages, each configured once up front.
pub struct Pipeline {
    extractor: Extractor,
    normalizer: Normalizer,
    builder: DocumentBuilder,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: Extractor::new(config.extract.clone()),
            normalizer: Normalizer::new(config.normalize.clone())?,
            builder: DocumentBuilder::new(config.documents.clone())?,
        })
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn builder(&self) -> &DocumentBuilder {
        &self.builder
    }

    /// Extract every page. Stops at the first malformed page.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn extract(
        &self,
        pages: &[RawPage],
        disclosures: &DisclosureMap,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<PageSemanticRecord>> {
        progress.phase("Extracting pages");
        let total = pages.len();
        let mut records = Vec::with_capacity(total);
        for (i, page) in pages.iter().enumerate() {
            records.push(self.extractor.extract_page(page, disclosures)?);
            progress.page_extracted(&page.url, i + 1, total);
        }
        Ok(records)
    }

    /// Run all stages, folding into `prior` when given.
    #[instrument(skip_all, fields(pages = pages.len(), prior = prior.is_some()))]
    pub fn run(
        &self,
        pages: &[RawPage],
        disclosures: &DisclosureMap,
        prior: Option<Graph>,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineResult> {
        let start = Instant::now();

        let records = self.extract(pages, disclosures, progress)?;

        progress.phase("Normalizing graph");
        let (graph, report) = self.normalizer.normalize(&records, prior);

        progress.phase("Building documents");
        let documents = self.builder.build(&graph);

        let result = PipelineResult {
            records,
            graph,
            report,
            documents,
            elapsed: start.elapsed(),
        };

        info!(
            pages = result.records.len(),
            entities = result.graph.entity_count(),
            conflicts = result.report.conflicts.len(),
            documents = result.documents.len(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "pipeline complete"
        );
        progress.done(&result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pagegraph_documents::DocType;
    use pagegraph_shared::{HeadMetadata, PageGraphError, RawNode};

    use super::*;
    use crate::update::diff_documents;

    const URL: &str = "https://www.chevrolet.ca/en/trucks/silverado-1500";

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, event: String) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }
    }

    impl ProgressReporter for Recorder {
        fn phase(&self, name: &str) {
            self.push(format!("phase:{name}"));
        }
        fn page_extracted(&self, _url: &str, current: usize, total: usize) {
            self.push(format!("page:{current}/{total}"));
        }
        fn done(&self, result: &PipelineResult) {
            self.push(format!("done:{}", result.documents.len()));
        }
    }

    fn page(main: Vec<RawNode>) -> RawPage {
        RawPage {
            url: URL.into(),
            metadata: HeadMetadata {
                title: Some("2025 Chevrolet Silverado 1500 | Pickup Truck | Chevrolet Canada".into()),
                description: Some("Built for the toughest jobs.".into()),
                canonical: Some(URL.into()),
                locale: Some("en-CA".into()),
                ..HeadMetadata::default()
            },
            navbar: Vec::new(),
            main_body_content: vec![main.into_iter().fold(RawNode::new("main"), RawNode::with_child)],
            footer: Vec::new(),
            observed_at: None,
        }
    }

    fn p(text: &str) -> RawNode {
        RawNode::new("p").with_text(text)
    }

    fn pages() -> Vec<RawPage> {
        vec![
            page(vec![
                RawNode::new("h2").with_text("Towing"),
                p("Up to 13,300 lbs of max trailering."),
                p("Available Max Trailering Package."),
            ]),
            page(vec![
                RawNode::new("h2").with_text("Towing"),
                p("Integrated trailer brake controller."),
                p("Up to 14 available camera views."),
                RawNode::new("a").with_attr("href", URL).with_child(
                    RawNode::new("gb-dynamic-text")
                        .with_attr("regional-information-json", r#"{"ON": {"startingPrice": "$36,733"}}"#)
                        .with_child(p("From: {startingPrice}")),
                ),
            ]),
        ]
    }

    #[test]
    fn run_produces_graph_and_documents() {
        let pipeline = Pipeline::new(&AppConfig::default()).expect("pipeline");
        let recorder = Recorder::default();
        let result = pipeline
            .run(&pages(), &DisclosureMap::new(), None, &recorder)
            .expect("run");

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.report.pages, 2);
        assert_eq!(result.graph.models.len(), 1);
        assert_eq!(result.graph.prices.len(), 1);

        let ids: Vec<&str> = result.documents.iter().map(|d| d.id.as_str()).collect();
        assert!(ids.contains(&"doc:silverado-1500-2025:overview"));
        assert!(ids.contains(&"doc:silverado-1500-2025:pricing:ON"));
        let features = result
            .documents
            .iter()
            .filter(|d| d.doc_type == DocType::Feature)
            .count();
        assert_eq!(features, 2);

        let events = recorder.events.lock().expect("lock").clone();
        assert_eq!(events[0], "phase:Extracting pages");
        assert!(events.contains(&"page:2/2".to_string()));
        assert_eq!(events.last().map(String::as_str), Some(format!("done:{}", ids.len()).as_str()));
    }

    #[test]
    fn rerun_against_prior_graph_changes_nothing() {
        let pipeline = Pipeline::new(&AppConfig::default()).expect("pipeline");
        let first = pipeline
            .run(&pages(), &DisclosureMap::new(), None, &SilentProgress)
            .expect("first run");
        let second = pipeline
            .run(&pages(), &DisclosureMap::new(), Some(first.graph.clone()), &SilentProgress)
            .expect("second run");

        assert_eq!(first.graph, second.graph);
        let diff = diff_documents(&first.documents, &second.documents);
        assert!(diff.is_empty());
        assert_eq!(diff.unchanged.len(), first.documents.len());
    }

    #[test]
    fn malformed_page_fails_before_normalizing() {
        let pipeline = Pipeline::new(&AppConfig::default()).expect("pipeline");
        let mut bad = pages();
        bad[1].url = String::new();
        let err = pipeline
            .run(&bad, &DisclosureMap::new(), None, &SilentProgress)
            .expect_err("empty url");
        assert!(matches!(err, PageGraphError::Validation { .. }));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.documents.max_words = 0;
        assert!(Pipeline::new(&config).is_err());
    }

    fn fixture(name: &str) -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/json")
            .join(name);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("missing fixture {}: {e}", path.display()))
    }

    #[test]
    fn fixture_pages_fold_into_one_model() {
        let pages = crate::input::parse_pages(&fixture("pages.json")).expect("pages");
        let disclosures = DisclosureMap::from_json(&fixture("disclosures.json")).expect("disclosures");
        let pipeline = Pipeline::new(&AppConfig::default()).expect("pipeline");
        let result = pipeline
            .run(&pages, &disclosures, None, &SilentProgress)
            .expect("run");

        let graph = &result.graph;
        assert_eq!(graph.models.len(), 1);
        let model = &graph.models["silverado-1500-2025"];
        assert_eq!(model.locale, "en-CA");
        assert_eq!(model.source_urls.len(), 2);

        let on = &graph.prices["price:silverado-1500-2025:ON"];
        assert_eq!(on.price.from_amount.as_deref(), Some("36,733"));
        assert_eq!(on.price.as_shown_amount.as_deref(), Some("46,673"));
        assert!(result.report.conflicts.is_empty());

        let towing = &graph.sections["sec:silverado-1500-2025:towing"];
        assert_eq!(towing.paragraphs.len(), 4);
        assert_eq!(towing.disclosure_ids.len(), 1);
        assert!(graph.disclosures.values().any(|d| d.referenced_by.contains(&towing.id)));

        let towing_docs: Vec<_> = result
            .documents
            .iter()
            .filter(|d| d.metadata.section_id.as_deref() == Some(towing.id.as_str()))
            .collect();
        assert_eq!(towing_docs.len(), 2);
        assert!(towing_docs.iter().all(|d| d.text.ends_with("[See disclosures]")));
        assert!(result.documents.iter().all(|d| d.metadata.word_count <= 350));
    }
}
