//! Graph normalization for PageGraph.
//!
//! Folds per-page semantic records into one deduplicated graph of typed
//! entities (models, prices, disclosures, assets, sections, trims, related
//! models, awards). Ids are content-derived, merges are typed per entity,
//! and price conflicts are settled by recency, then by [`ConflictPolicy`].
//!
//! [`ConflictPolicy`]: pagegraph_shared::ConflictPolicy

pub mod lines;
pub mod merge;
pub mod model;
pub mod normalizer;
pub mod scan;

pub use lines::{SectionLine, lines_from_texts, merge_lines};
pub use merge::{Merge, MergeConflict, MergeContext, MergeReport, Resolution};
pub use model::{
    Asset, Award, Disclosure, Entity, Graph, Model, ModelLinks, PriceEntry, RegionalPrice,
    RelatedModel, Section, Trim,
};
pub use normalizer::Normalizer;
pub use scan::{DEFAULT_LOCALE, ModelIdentity, model_identity, normalize_amount};
