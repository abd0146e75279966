//! Incremental re-indexing support.
//!
//! Compares a previously emitted document set against a fresh one so that
//! callers only re-embed what actually changed.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::info;

use pagegraph_documents::EmbeddingDocument;

/// Document ids grouped by change status, each in new-set order (removed
/// ids in old-set order).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentDiff {
    /// Ids not present in the old set.
    pub added: Vec<String>,
    /// Ids whose content hash changed.
    pub changed: Vec<String>,
    /// Ids with an identical content hash.
    pub unchanged: Vec<String>,
    /// Ids in the old set but not in the new one.
    pub removed: Vec<String>,
}

impl DocumentDiff {
    /// True when nothing needs re-embedding or deleting.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Compute the diff between existing documents and newly built ones.
pub fn diff_documents(existing: &[EmbeddingDocument], fresh: &[EmbeddingDocument]) -> DocumentDiff {
    let existing_by_id: HashMap<&str, &EmbeddingDocument> =
        existing.iter().map(|d| (d.id.as_str(), d)).collect();
    let fresh_ids: HashSet<&str> = fresh.iter().map(|d| d.id.as_str()).collect();

    let mut diff = DocumentDiff::default();

    for doc in fresh {
        match existing_by_id.get(doc.id.as_str()) {
            Some(old) if old.metadata.content_hash == doc.metadata.content_hash => {
                diff.unchanged.push(doc.id.clone());
            }
            Some(_) => diff.changed.push(doc.id.clone()),
            None => diff.added.push(doc.id.clone()),
        }
    }

    for old in existing {
        if !fresh_ids.contains(old.id.as_str()) {
            diff.removed.push(old.id.clone());
        }
    }

    info!(
        added = diff.added.len(),
        changed = diff.changed.len(),
        unchanged = diff.unchanged.len(),
        removed = diff.removed.len(),
        "diffed documents"
    );
    diff
}
