//! Core pipeline orchestration for PageGraph.
//!
//! Ties extraction, graph normalization, and document building into one
//! run over a batch of pages, and adds the input decoding and document
//! diffing the binary needs.

pub mod input;
pub mod pipeline;
pub mod update;

pub use input::{parse_documents, parse_graph, parse_pages, parse_records};
pub use pipeline::{Pipeline, PipelineResult, ProgressReporter, SilentProgress};
pub use update::{DocumentDiff, diff_documents};
