//! Catalogue metadata types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Searchable metadata for one release. All fields optional; whichever are
/// present drive the external search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMeta {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub label: Option<String>,
    pub catno: Option<String>,
    pub barcode: Option<String>,
}

impl ReleaseMeta {
    /// True when no field usable as a search constraint is present.
    /// Label alone does not count: it is never sent as a query term.
    pub fn is_unsearchable(&self) -> bool {
        fn empty(f: &Option<String>) -> bool {
            f.as_deref().map(str::trim).unwrap_or("").is_empty()
        }
        empty(&self.artist) && empty(&self.title) && empty(&self.catno) && empty(&self.barcode)
    }
}

/// A catalogued record awaiting (or holding) estimates. Read-only to the
/// pipeline; created elsewhere by the upload path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub id: Uuid,
    pub meta: ReleaseMeta,
}
