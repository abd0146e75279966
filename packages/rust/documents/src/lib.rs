//! Embedding document construction for PageGraph.
//!
//! Turns a normalized [`Graph`](pagegraph_graph::Graph) into overview,
//! pricing, feature and award documents. Text goes through a fixed cleaning
//! pipeline, and every chunk stays under the configured word bound.

pub mod builder;
pub mod chunking;
pub mod cleaning;

pub use builder::{DocType, DocumentBuilder, DocumentMetadata, EmbeddingDocument};
pub use chunking::{group_sizes, split_block, split_sentences, word_count};
pub use cleaning::{CleanOptions, augment_units, clean_lines, clean_text};
