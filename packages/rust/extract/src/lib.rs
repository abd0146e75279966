//! Markup tree extraction for PageGraph.
//!
//! Walks raw node trees depth-first, drops noise, flattens layout wrappers,
//! and dispatches every remaining element to a tag-keyed serializer. Links
//! are resolved and classified, footnote markers are resolved against a
//! disclosure map, and the result is one [`PageSemanticRecord`] per page.
//!
//! [`PageSemanticRecord`]: pagegraph_shared::PageSemanticRecord

pub mod disclosures;
pub mod html;
pub mod links;
pub mod serializers;
mod text;
pub mod walker;

pub use disclosures::{DisclosureMap, DisclosureRegistry};
pub use html::parse_html_page;
pub use links::{LinkClassifier, ResolvedUrl};
pub use serializers::{NodeSerializer, SerializeError, SerializerRegistry};
pub use walker::{Extractor, WalkContext};
