//! Folds per-page semantic records into one deduplicated graph.

use regex::Regex;
use tracing::{debug, info, instrument};

use pagegraph_shared::{NormalizeConfig, PageGraphError, PageSemanticRecord, Result};

use crate::merge::{MergeContext, MergeReport};
use crate::model::Graph;
use crate::scan::{PageScanner, Patterns};

/// Graph normalizer. Configuration is fixed at construction.
pub struct Normalizer {
    config: NormalizeConfig,
    patterns: Patterns,
}

impl Normalizer {
    /// Compile the configured patterns. Fails on an invalid award pattern.
    pub fn new(config: NormalizeConfig) -> Result<Self> {
        let award = Regex::new(&config.award_pattern)
            .map_err(|e| PageGraphError::config(format!("invalid normalize.award_pattern: {e}")))?;

        let mut names: Vec<String> = config
            .trim_names
            .iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();

        let trims = names
            .into_iter()
            .map(|name| {
                let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&name)))
                    .map_err(|e| PageGraphError::config(format!("invalid trim name `{name}`: {e}")))?;
                Ok((name, re))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            patterns: Patterns { award, trims },
        })
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Merge `pages` into `prior` (or an empty graph).
    #[instrument(skip_all, fields(pages = pages.len(), prior = prior.is_some()))]
    pub fn normalize(
        &self,
        pages: &[PageSemanticRecord],
        prior: Option<Graph>,
    ) -> (Graph, MergeReport) {
        let mut graph = prior.unwrap_or_default();
        let mut report = MergeReport::default();

        for page in pages {
            self.merge_page(&mut graph, page, &mut report);
        }

        info!(
            pages = report.pages,
            models = graph.models.len(),
            sections = graph.sections.len(),
            prices = graph.prices.len(),
            disclosures = graph.disclosures.len(),
            conflicts = report.conflicts.len(),
            "normalized graph"
        );
        (graph, report)
    }

    /// Scan one page and fold it into `graph`.
    pub fn merge_page(&self, graph: &mut Graph, page: &PageSemanticRecord, report: &mut MergeReport) {
        let fragment = self.scan_page(page);
        debug!(url = %page.url, entities = fragment.entity_count(), "merging page");

        report.pages += 1;
        report.serializer_fallbacks += page.stats.serializer_fallbacks;
        report.unresolved_disclosures += page.stats.unresolved_disclosures;

        let mut cx = MergeContext {
            policy: self.config.conflict_policy,
            report,
        };
        graph.absorb(fragment, &mut cx);
    }

    /// What a single page contributes, before any merging.
    pub fn scan_page(&self, page: &PageSemanticRecord) -> Graph {
        PageScanner::new(&self.config, &self.patterns, page).scan()
    }
}
