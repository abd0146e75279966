//! Typed merge functions, one per entity kind.
//!
//! Sets union, scalar text keeps the longer value, paragraph lists take the
//! ordered line union. Prices are the only place where two values can
//! genuinely disagree; those conflicts are settled by recency first, then by
//! the configured [`ConflictPolicy`], and every one is recorded.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use pagegraph_shared::{ConflictPolicy, HeadMetadata};

use crate::lines::{merge_lines, pick_longer};
use crate::model::{
    Asset, Award, Disclosure, Entity, Graph, Model, ModelLinks, PriceEntry, RegionalPrice,
    RelatedModel, Section, Trim,
};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// How a conflicting price field was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// One side carried a newer (or the only) recency indicator.
    Recency,
    /// No usable recency; the conflict policy decided.
    Policy,
}

/// One price field that held two different non-null values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub entity_id: String,
    pub field: String,
    pub kept: String,
    pub discarded: String,
    pub resolution: Resolution,
}

/// Summary of one normalization run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub pages: usize,
    pub conflicts: Vec<MergeConflict>,
    pub serializer_fallbacks: usize,
    pub unresolved_disclosures: usize,
}

/// Merge settings plus the report being filled.
pub struct MergeContext<'a> {
    pub policy: ConflictPolicy,
    pub report: &'a mut MergeReport,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Fold another sighting of the same entity into `self`.
pub trait Merge {
    fn merge(&mut self, incoming: Self, cx: &mut MergeContext<'_>);
}

fn absorb_registry<T: Entity + Merge>(
    target: &mut BTreeMap<String, T>,
    incoming: BTreeMap<String, T>,
    cx: &mut MergeContext<'_>,
) {
    for (id, entity) in incoming {
        match target.get_mut(&id) {
            Some(existing) => existing.merge(entity, cx),
            None => {
                target.insert(id, entity);
            }
        }
    }
}

impl Graph {
    /// Merge every entity of `fragment` into this graph.
    pub fn absorb(&mut self, fragment: Graph, cx: &mut MergeContext<'_>) {
        absorb_registry(&mut self.models, fragment.models, cx);
        absorb_registry(&mut self.prices, fragment.prices, cx);
        absorb_registry(&mut self.disclosures, fragment.disclosures, cx);
        absorb_registry(&mut self.assets, fragment.assets, cx);
        absorb_registry(&mut self.sections, fragment.sections, cx);
        absorb_registry(&mut self.trims, fragment.trims, cx);
        absorb_registry(&mut self.related_models, fragment.related_models, cx);
        absorb_registry(&mut self.awards, fragment.awards, cx);
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn longer(existing: &mut String, incoming: &str) {
    *existing = pick_longer(existing, incoming);
}

fn longer_opt(existing: &mut Option<String>, incoming: Option<String>) {
    *existing = match (existing.take(), incoming) {
        (Some(a), Some(b)) => Some(pick_longer(&a, &b)),
        (a, b) => a.or(b),
    };
}

fn union(existing: &mut BTreeSet<String>, incoming: BTreeSet<String>) {
    existing.extend(incoming);
}

fn merge_head(existing: &mut HeadMetadata, incoming: HeadMetadata) {
    longer_opt(&mut existing.title, incoming.title);
    longer_opt(&mut existing.description, incoming.description);
    longer_opt(&mut existing.canonical, incoming.canonical);
    longer_opt(&mut existing.locale, incoming.locale);
    for (target, source) in [
        (&mut existing.opengraph, incoming.opengraph),
        (&mut existing.twitter, incoming.twitter),
    ] {
        for (key, value) in source {
            longer_opt(target.entry(key).or_default(), value);
        }
    }
}

/// One nullable price field plus its recency.
struct AmountField<'a> {
    value: &'a mut Option<String>,
    observed_at: &'a mut Option<DateTime<Utc>>,
}

fn merge_amount(
    entity_id: &str,
    field: &str,
    existing: AmountField<'_>,
    incoming: Option<String>,
    incoming_at: Option<DateTime<Utc>>,
    cx: &mut MergeContext<'_>,
) {
    let Some(incoming) = incoming else {
        return;
    };
    let Some(current) = existing.value.clone() else {
        *existing.value = Some(incoming);
        *existing.observed_at = incoming_at;
        return;
    };
    if current == incoming {
        *existing.observed_at = (*existing.observed_at).max(incoming_at);
        return;
    }

    let (take_incoming, resolution) = match (*existing.observed_at, incoming_at) {
        (Some(a), Some(b)) if a != b => (b > a, Resolution::Recency),
        (Some(_), None) => (false, Resolution::Recency),
        (None, Some(_)) => (true, Resolution::Recency),
        _ => (
            cx.policy == ConflictPolicy::LastWriteWins,
            Resolution::Policy,
        ),
    };

    let (kept, discarded) = if take_incoming {
        *existing.value = Some(incoming.clone());
        *existing.observed_at = incoming_at;
        (incoming, current)
    } else {
        (current, incoming)
    };

    warn!(
        entity = entity_id,
        field,
        kept = %kept,
        discarded = %discarded,
        ?resolution,
        "conflicting price values"
    );
    cx.report.conflicts.push(MergeConflict {
        entity_id: entity_id.to_string(),
        field: field.to_string(),
        kept,
        discarded,
        resolution,
    });
}

/// Field-wise price fill with conflict resolution. `owner` names the entity
/// in conflict records.
pub fn merge_regional_price(
    owner: &str,
    existing: &mut RegionalPrice,
    incoming: RegionalPrice,
    cx: &mut MergeContext<'_>,
) {
    merge_amount(
        owner,
        "from_amount",
        AmountField {
            value: &mut existing.from_amount,
            observed_at: &mut existing.from_observed_at,
        },
        incoming.from_amount,
        incoming.from_observed_at,
        cx,
    );
    merge_amount(
        owner,
        "as_shown_amount",
        AmountField {
            value: &mut existing.as_shown_amount,
            observed_at: &mut existing.as_shown_observed_at,
        },
        incoming.as_shown_amount,
        incoming.as_shown_observed_at,
        cx,
    );
    longer(&mut existing.currency, &incoming.currency);
    union(&mut existing.disclosure_ids, incoming.disclosure_ids);
}

fn merge_price_map(
    owner: &str,
    existing: &mut BTreeMap<String, RegionalPrice>,
    incoming: BTreeMap<String, RegionalPrice>,
    cx: &mut MergeContext<'_>,
) {
    for (region, price) in incoming {
        match existing.get_mut(&region) {
            Some(current) => merge_regional_price(&format!("{owner}:{region}"), current, price, cx),
            None => {
                existing.insert(region, price);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-entity merges
// ---------------------------------------------------------------------------

impl Merge for Model {
    fn merge(&mut self, incoming: Self, _cx: &mut MergeContext<'_>) {
        longer(&mut self.name, &incoming.name);
        self.year = self.year.max(incoming.year);
        longer(&mut self.canonical_url, &incoming.canonical_url);
        longer(&mut self.locale, &incoming.locale);
        merge_head(&mut self.metadata, incoming.metadata);
        union(&mut self.section_ids, incoming.section_ids);
        union(&mut self.trim_ids, incoming.trim_ids);
        union(&mut self.price_ids, incoming.price_ids);
        union(&mut self.asset_ids, incoming.asset_ids);
        union(&mut self.award_ids, incoming.award_ids);
        union(&mut self.related_model_ids, incoming.related_model_ids);
        merge_links(&mut self.links, incoming.links);
        union(&mut self.source_urls, incoming.source_urls);
    }
}

fn merge_links(existing: &mut ModelLinks, incoming: ModelLinks) {
    union(&mut existing.build_and_price, incoming.build_and_price);
    union(&mut existing.inventory, incoming.inventory);
    // Smaller URL wins so the result does not depend on page order.
    existing.find_dealer = match (existing.find_dealer.take(), incoming.find_dealer) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
}

impl Merge for PriceEntry {
    fn merge(&mut self, incoming: Self, cx: &mut MergeContext<'_>) {
        merge_regional_price(&self.id, &mut self.price, incoming.price, cx);
        union(&mut self.source_urls, incoming.source_urls);
    }
}

impl Merge for Disclosure {
    /// Text is fixed at registration; only the reference sets grow.
    fn merge(&mut self, incoming: Self, _cx: &mut MergeContext<'_>) {
        union(&mut self.reference_ids, incoming.reference_ids);
        union(&mut self.referenced_by, incoming.referenced_by);
    }
}

impl Merge for Asset {
    fn merge(&mut self, incoming: Self, _cx: &mut MergeContext<'_>) {
        fold_asset(self, incoming);
    }
}

/// First sighting establishes; a strictly longer alt or title replaces.
pub(crate) fn fold_asset(existing: &mut Asset, incoming: Asset) {
    replace_if_strictly_longer(&mut existing.alt, incoming.alt);
    replace_if_strictly_longer(&mut existing.title, incoming.title);
    union(&mut existing.model_ids, incoming.model_ids);
}

fn replace_if_strictly_longer(existing: &mut Option<String>, incoming: Option<String>) {
    let Some(incoming) = incoming else {
        return;
    };
    let current_len = existing.as_deref().map_or(0, |s| s.chars().count());
    if existing.is_none() || incoming.chars().count() > current_len {
        *existing = Some(incoming);
    }
}

impl Merge for Section {
    fn merge(&mut self, incoming: Self, _cx: &mut MergeContext<'_>) {
        longer(&mut self.title, &incoming.title);
        self.paragraphs = merge_lines(&self.paragraphs, &incoming.paragraphs);
        union(&mut self.disclosure_ids, incoming.disclosure_ids);
        union(&mut self.asset_ids, incoming.asset_ids);
        union(&mut self.source_urls, incoming.source_urls);
    }
}

impl Merge for Trim {
    fn merge(&mut self, incoming: Self, cx: &mut MergeContext<'_>) {
        longer(&mut self.name, &incoming.name);
        longer_opt(&mut self.tagline, incoming.tagline);
        self.features = merge_lines(&self.features, &incoming.features);
        let id = self.id.clone();
        merge_price_map(&id, &mut self.prices, incoming.prices, cx);
    }
}

impl Merge for RelatedModel {
    fn merge(&mut self, incoming: Self, cx: &mut MergeContext<'_>) {
        longer_opt(&mut self.name, incoming.name);
        longer(&mut self.url, &incoming.url);
        let id = self.id.clone();
        merge_price_map(&id, &mut self.prices, incoming.prices, cx);
        union(&mut self.referenced_by, incoming.referenced_by);
    }
}

impl Merge for Award {
    fn merge(&mut self, incoming: Self, _cx: &mut MergeContext<'_>) {
        longer(&mut self.title, &incoming.title);
        longer(&mut self.summary, &incoming.summary);
        union(&mut self.disclosure_ids, incoming.disclosure_ids);
        union(&mut self.section_ids, incoming.section_ids);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn price(from: Option<&str>, shown: Option<&str>) -> RegionalPrice {
        RegionalPrice {
            from_amount: from.map(String::from),
            as_shown_amount: shown.map(String::from),
            currency: "CAD".into(),
            ..RegionalPrice::default()
        }
    }

    fn at(day: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap())
    }

    fn merged(
        existing: RegionalPrice,
        incoming: RegionalPrice,
        policy: ConflictPolicy,
    ) -> (RegionalPrice, MergeReport) {
        let mut report = MergeReport::default();
        let mut cx = MergeContext {
            policy,
            report: &mut report,
        };
        let mut target = existing;
        merge_regional_price("price:m:ON", &mut target, incoming, &mut cx);
        (target, report)
    }

    #[test]
    fn complementary_fields_fill() {
        let (p, report) = merged(
            price(Some("36,733"), None),
            price(None, Some("46,673")),
            ConflictPolicy::default(),
        );
        assert_eq!(p.from_amount.as_deref(), Some("36,733"));
        assert_eq!(p.as_shown_amount.as_deref(), Some("46,673"));
        assert!(report.conflicts.is_empty());
    }

    #[test]
    fn newer_recency_wins_regardless_of_order() {
        let mut old = price(Some("36,733"), None);
        old.from_observed_at = at(1);
        let mut new = price(Some("37,199"), None);
        new.from_observed_at = at(9);

        for policy in [ConflictPolicy::LastWriteWins, ConflictPolicy::FirstWriteWins] {
            let (a, _) = merged(old.clone(), new.clone(), policy);
            let (b, report) = merged(new.clone(), old.clone(), policy);
            assert_eq!(a.from_amount.as_deref(), Some("37,199"));
            assert_eq!(a, b);
            assert_eq!(report.conflicts[0].resolution, Resolution::Recency);
        }
    }

    #[test]
    fn one_sided_recency_wins() {
        let mut dated = price(Some("36,733"), None);
        dated.from_observed_at = at(2);
        let (p, _) = merged(dated, price(Some("1"), None), ConflictPolicy::LastWriteWins);
        assert_eq!(p.from_amount.as_deref(), Some("36,733"));
    }

    #[test]
    fn policy_decides_without_recency() {
        let first = price(Some("36,733"), Some("46,673"));
        let second = price(Some("35,000"), Some("46,673"));

        let (lww, report) = merged(first.clone(), second.clone(), ConflictPolicy::LastWriteWins);
        assert_eq!(lww.from_amount.as_deref(), Some("35,000"));
        assert_eq!(report.conflicts.len(), 1);
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.field, "from_amount");
        assert_eq!(conflict.kept, "35,000");
        assert_eq!(conflict.discarded, "36,733");
        assert_eq!(conflict.resolution, Resolution::Policy);

        let (fww, report) = merged(first, second, ConflictPolicy::FirstWriteWins);
        assert_eq!(fww.from_amount.as_deref(), Some("36,733"));
        assert_eq!(report.conflicts[0].kept, "36,733");
    }

    #[test]
    fn equal_values_are_not_conflicts() {
        let mut a = price(Some("36,733"), None);
        a.from_observed_at = at(1);
        let mut b = price(Some("36,733"), None);
        b.from_observed_at = at(5);
        let (p, report) = merged(a, b, ConflictPolicy::FirstWriteWins);
        assert!(report.conflicts.is_empty());
        assert_eq!(p.from_observed_at, at(5));
    }

    #[test]
    fn asset_alt_needs_strictly_longer() {
        let mut report = MergeReport::default();
        let mut cx = MergeContext {
            policy: ConflictPolicy::default(),
            report: &mut report,
        };
        let mut asset = Asset {
            id: "img:1".into(),
            url: "https://x/a.jpg".into(),
            alt: Some("Silverado LT".into()),
            title: None,
            model_ids: BTreeSet::new(),
        };
        let mut same_len = asset.clone();
        same_len.alt = Some("Silverado RS".into());
        asset.merge(same_len, &mut cx);
        assert_eq!(asset.alt.as_deref(), Some("Silverado LT"));

        let mut longer = asset.clone();
        longer.alt = Some("Silverado LT Trail Boss".into());
        longer.title = Some("Hero".into());
        asset.merge(longer, &mut cx);
        assert_eq!(asset.alt.as_deref(), Some("Silverado LT Trail Boss"));
        assert_eq!(asset.title.as_deref(), Some("Hero"));
    }

    #[test]
    fn disclosure_text_never_changes() {
        let mut report = MergeReport::default();
        let mut cx = MergeContext {
            policy: ConflictPolicy::default(),
            report: &mut report,
        };
        let mut d = Disclosure {
            id: "disc:abc".into(),
            text: "Original.".into(),
            reference_ids: BTreeSet::from(["d1".to_string()]),
            referenced_by: BTreeSet::new(),
        };
        let mut other = d.clone();
        other.text = "Something much longer than the original.".into();
        other.reference_ids = BTreeSet::from(["d2".to_string()]);
        d.merge(other, &mut cx);
        assert_eq!(d.text, "Original.");
        assert_eq!(d.reference_ids.len(), 2);
    }
}
