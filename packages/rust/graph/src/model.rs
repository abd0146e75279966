//! Graph entities and the graph container.
//!
//! Every registry is a `BTreeMap` keyed by canonical id. On the wire each
//! registry is a plain array sorted by id, so a serialized graph reads back
//! as a prior graph without any extra bookkeeping.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pagegraph_shared::HeadMetadata;

use crate::lines::SectionLine;

/// Anything stored in a graph registry.
pub trait Entity {
    fn id(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// The normalized, deduplicated entity graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(with = "entity_list", default)]
    pub models: BTreeMap<String, Model>,
    #[serde(with = "entity_list", default)]
    pub prices: BTreeMap<String, PriceEntry>,
    #[serde(with = "entity_list", default)]
    pub disclosures: BTreeMap<String, Disclosure>,
    #[serde(with = "entity_list", default)]
    pub assets: BTreeMap<String, Asset>,
    #[serde(with = "entity_list", default)]
    pub sections: BTreeMap<String, Section>,
    #[serde(with = "entity_list", default)]
    pub trims: BTreeMap<String, Trim>,
    #[serde(with = "entity_list", default)]
    pub related_models: BTreeMap<String, RelatedModel>,
    #[serde(with = "entity_list", default)]
    pub awards: BTreeMap<String, Award>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
            && self.prices.is_empty()
            && self.disclosures.is_empty()
            && self.assets.is_empty()
            && self.sections.is_empty()
            && self.trims.is_empty()
            && self.related_models.is_empty()
            && self.awards.is_empty()
    }

    /// Total entity count across every registry.
    pub fn entity_count(&self) -> usize {
        self.models.len()
            + self.prices.len()
            + self.disclosures.len()
            + self.assets.len()
            + self.sections.len()
            + self.trims.len()
            + self.related_models.len()
            + self.awards.len()
    }

    /// Sections of a model, in id order.
    pub fn sections_of<'a>(&'a self, model: &'a Model) -> impl Iterator<Item = &'a Section> + 'a {
        model.section_ids.iter().filter_map(|id| self.sections.get(id))
    }

    /// Price entries of a model, in id order.
    pub fn prices_of<'a>(&'a self, model: &'a Model) -> impl Iterator<Item = &'a PriceEntry> + 'a {
        model.price_ids.iter().filter_map(|id| self.prices.get(id))
    }

    /// Trims of a model, in id order.
    pub fn trims_of<'a>(&'a self, model: &'a Model) -> impl Iterator<Item = &'a Trim> + 'a {
        model.trim_ids.iter().filter_map(|id| self.trims.get(id))
    }

    /// Awards of a model, in id order.
    pub fn awards_of<'a>(&'a self, model: &'a Model) -> impl Iterator<Item = &'a Award> + 'a {
        model.award_ids.iter().filter_map(|id| self.awards.get(id))
    }
}

/// Serialize a registry as an id-sorted array; read it back into a map.
mod entity_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Entity;

    pub fn serialize<S, T>(map: &BTreeMap<String, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Entity,
    {
        let items: Vec<T> = Vec::deserialize(deserializer)?;
        Ok(items
            .into_iter()
            .map(|item| (item.id().to_string(), item))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A vehicle model, keyed by `slug(name)-year`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    pub canonical_url: String,
    pub locale: String,
    #[serde(default)]
    pub metadata: HeadMetadata,
    #[serde(default)]
    pub section_ids: BTreeSet<String>,
    #[serde(default)]
    pub trim_ids: BTreeSet<String>,
    #[serde(default)]
    pub price_ids: BTreeSet<String>,
    #[serde(default)]
    pub asset_ids: BTreeSet<String>,
    #[serde(default)]
    pub award_ids: BTreeSet<String>,
    #[serde(default)]
    pub related_model_ids: BTreeSet<String>,
    #[serde(default)]
    pub links: ModelLinks,
    #[serde(default)]
    pub source_urls: BTreeSet<String>,
}

impl Model {
    /// Slug of the name alone, without the year suffix.
    pub fn name_slug(&self) -> String {
        pagegraph_shared::slugify(&self.name)
    }
}

/// Commerce links recovered from link text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelLinks {
    #[serde(default)]
    pub build_and_price: BTreeSet<String>,
    #[serde(default)]
    pub inventory: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub find_dealer: Option<String>,
}

/// Starting and as-shown amounts for one region, with per-field recency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionalPrice {
    #[serde(default)]
    pub from_amount: Option<String>,
    #[serde(default)]
    pub as_shown_amount: Option<String>,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_observed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_shown_observed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disclosure_ids: BTreeSet<String>,
}

impl RegionalPrice {
    pub fn has_amount(&self) -> bool {
        self.from_amount.is_some() || self.as_shown_amount.is_some()
    }
}

/// Model price for one region, keyed by `price:{model}:{region}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub id: String,
    pub model_id: String,
    pub region: String,
    #[serde(flatten)]
    pub price: RegionalPrice,
    #[serde(default)]
    pub source_urls: BTreeSet<String>,
}

/// Legal footnote text, keyed by a hash of the text itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disclosure {
    pub id: String,
    pub text: String,
    /// External ids that resolved to this text.
    #[serde(default)]
    pub reference_ids: BTreeSet<String>,
    /// Graph entities that cite this disclosure.
    #[serde(default)]
    pub referenced_by: BTreeSet<String>,
}

/// An image, keyed by a hash of its resolved URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub model_ids: BTreeSet<String>,
}

/// A titled run of paragraphs, keyed by `sec:{model}:{slug(title)}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub model_id: String,
    pub title: String,
    #[serde(default)]
    pub paragraphs: Vec<SectionLine>,
    #[serde(default)]
    pub disclosure_ids: BTreeSet<String>,
    #[serde(default)]
    pub asset_ids: BTreeSet<String>,
    #[serde(default)]
    pub source_urls: BTreeSet<String>,
}

impl Section {
    pub fn paragraph_texts(&self) -> impl Iterator<Item = &str> {
        self.paragraphs.iter().map(|l| l.text.as_str())
    }
}

/// A named trim level, keyed by `trim:{model}:{slug(name)}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trim {
    pub id: String,
    pub model_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default)]
    pub features: Vec<SectionLine>,
    /// Region code → price hints.
    #[serde(default)]
    pub prices: BTreeMap<String, RegionalPrice>,
}

/// Another model advertised from a page, keyed by its URL slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedModel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub prices: BTreeMap<String, RegionalPrice>,
    /// Models whose pages advertise this one.
    #[serde(default)]
    pub referenced_by: BTreeSet<String>,
}

/// Awards and accolades, keyed by `awd:{model}:{slug(first heading)}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub id: String,
    pub model_id: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub disclosure_ids: BTreeSet<String>,
    #[serde(default)]
    pub section_ids: BTreeSet<String>,
}

macro_rules! impl_entity {
    ($($ty:ty),+ $(,)?) => {
        $(impl Entity for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })+
    };
}

impl_entity!(Model, PriceEntry, Disclosure, Asset, Section, Trim, RelatedModel, Award);
