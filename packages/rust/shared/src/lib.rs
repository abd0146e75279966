//! Shared types, error model, and configuration for PageGraph.
//!
//! This crate is the foundation depended on by all other PageGraph crates.
//! It provides:
//! - [`PageGraphError`] — the unified error type
//! - Domain types ([`RawNode`], [`RawPage`], [`SemanticNode`], [`PageSemanticRecord`])
//! - Configuration ([`AppConfig`] and its sections, config loading)
//! - Content-addressed id helpers

pub mod config;
pub mod error;
pub mod ids;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConflictPolicy, DocumentsConfig, ExtractConfig, HtmlSelectors, NormalizeConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, parse_config,
};
pub use error::{PageGraphError, Result};
pub use ids::{asset_id, collapse_whitespace, disclosure_id, short_hash, slugify};
pub use types::{
    AttrValue, ButtonNode, CURRENT_SCHEMA_VERSION, DisclosureRefNode, ExtractStats, GenericNode,
    HeadMetadata, HeadingNode, ImageNode, LinkNode, ListNode, PageDisclosure, PageSemanticRecord,
    RawNode, RawPage, RichTextNode, SemanticNode, TableNode,
};
