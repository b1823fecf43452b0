//! In-memory bookkeeping of what offline content exists.
//!
//! The registry is the source of truth for availability queries. It is never
//! persisted: hydration derives it from database contents at startup, and
//! cache/remove operations keep it current afterwards. All mutations are
//! plain synchronous map updates, so no torn state is ever observable across
//! an await point.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::db::ContentDatabase;
use crate::error::CacheError;

pub const DRIVERS: &str = "drivers";
pub const NEWS: &str = "news";
pub const DASHBOARD: &str = "dashboard";
pub const BOOKMARKS: &str = "bookmarks";

/// The fixed content buckets the dashboard caches by default.
pub const KNOWN_CONTENT_TYPES: &[&str] = &[DRIVERS, NEWS, DASHBOARD, BOOKMARKS];

/// Metadata for one content bucket.
#[derive(Debug, Clone, Serialize)]
pub struct ContentDescriptor {
    pub content_type: String,
    pub title: String,
    pub description: String,
    /// Byte length of the last successfully cached payload; 0 when nothing
    /// is cached.
    pub size_bytes: u64,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_available: bool,
}

impl ContentDescriptor {
    pub fn new(
        content_type: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            title: title.into(),
            description: description.into(),
            size_bytes: 0,
            last_updated: None,
            is_available: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    Available,
    All,
}

#[derive(Debug, Default)]
pub struct ContentRegistry {
    entries: BTreeMap<String, ContentDescriptor>,
}

impl ContentRegistry {
    pub fn new(descriptors: impl IntoIterator<Item = ContentDescriptor>) -> Self {
        let entries = descriptors
            .into_iter()
            .map(|d| (d.content_type.clone(), d))
            .collect();
        Self { entries }
    }

    pub fn with_defaults() -> Self {
        Self::new([
            ContentDescriptor::new(DRIVERS, "Drivers", "Driver standings and profiles"),
            ContentDescriptor::new(NEWS, "News", "Latest paddock news articles"),
            ContentDescriptor::new(DASHBOARD, "Dashboard", "Season statistics overview"),
            ContentDescriptor::new(BOOKMARKS, "Bookmarks", "Saved articles and sessions"),
        ])
    }

    pub fn content_types(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn get(&self, content_type: &str) -> Option<&ContentDescriptor> {
        self.entries.get(content_type)
    }

    pub fn is_available(&self, content_type: &str) -> bool {
        self.entries
            .get(content_type)
            .map(|d| d.is_available)
            .unwrap_or(false)
    }

    pub fn list(&self, filter: ListFilter) -> Vec<ContentDescriptor> {
        self.entries
            .values()
            .filter(|d| match filter {
                ListFilter::Available => d.is_available,
                ListFilter::All => true,
            })
            .cloned()
            .collect()
    }

    /// No-op for a type the registry was not seeded with: descriptors exist
    /// from initialization only.
    pub fn mark_cached(&mut self, content_type: &str, size_bytes: u64, updated: DateTime<Utc>) {
        match self.entries.get_mut(content_type) {
            Some(entry) => {
                entry.size_bytes = size_bytes;
                entry.last_updated = Some(updated);
                entry.is_available = true;
            }
            None => warn!(content_type, "mark_cached for unknown content type"),
        }
    }

    pub fn mark_removed(&mut self, content_type: &str) {
        if let Some(entry) = self.entries.get_mut(content_type) {
            entry.size_bytes = 0;
            entry.last_updated = None;
            entry.is_available = false;
        }
    }

    pub fn mark_all_removed(&mut self) {
        for entry in self.entries.values_mut() {
            entry.size_bytes = 0;
            entry.last_updated = None;
            entry.is_available = false;
        }
    }
}

/// Rebuild the registry from database contents.
///
/// A database-level failure (the store cannot be opened) aborts the pass and
/// propagates so the caller can trigger the destructive reset. A single
/// unreadable record is logged and skipped; the remaining types still
/// hydrate.
pub async fn hydrate(
    registry: &Mutex<ContentRegistry>,
    db: &ContentDatabase,
) -> Result<(), CacheError> {
    db.ensure_open().await?;

    let types = registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .content_types();

    for content_type in types {
        match db.get_record(&content_type).await {
            Ok(Some(record)) => {
                let size = record.size_bytes();
                registry
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .mark_cached(&content_type, size, record.timestamp);
            }
            Ok(None) => {
                registry
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .mark_removed(&content_type);
            }
            Err(err) => {
                warn!(content_type, error = %err, "skipping unreadable record during hydration");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_start_unavailable() {
        let registry = ContentRegistry::with_defaults();
        assert_eq!(registry.content_types().len(), 4);
        assert!(registry.list(ListFilter::Available).is_empty());
        assert_eq!(registry.list(ListFilter::All).len(), 4);
    }

    #[test]
    fn mark_cached_then_removed() {
        let mut registry = ContentRegistry::with_defaults();
        let now = Utc::now();

        registry.mark_cached(NEWS, 128, now);
        assert!(registry.is_available(NEWS));
        let entry = registry.get(NEWS).unwrap();
        assert_eq!(entry.size_bytes, 128);
        assert_eq!(entry.last_updated, Some(now));

        registry.mark_removed(NEWS);
        assert!(!registry.is_available(NEWS));
        assert_eq!(registry.get(NEWS).unwrap().size_bytes, 0);
    }

    #[test]
    fn mark_cached_ignores_unknown_types() {
        let mut registry = ContentRegistry::with_defaults();
        registry.mark_cached("telemetry", 64, Utc::now());
        assert!(!registry.is_available("telemetry"));
        assert_eq!(registry.list(ListFilter::All).len(), 4);
    }

    #[test]
    fn mark_all_removed_resets_everything() {
        let mut registry = ContentRegistry::with_defaults();
        let now = Utc::now();
        registry.mark_cached(NEWS, 1, now);
        registry.mark_cached(DRIVERS, 2, now);

        registry.mark_all_removed();
        assert!(registry.list(ListFilter::Available).is_empty());
    }

    #[tokio::test]
    async fn hydrate_reflects_database_contents() {
        let dir = tempfile::tempdir().unwrap();
        let db = ContentDatabase::new(dir.path().join("db"));
        db.put(NEWS, json!({ "articles": [] })).await.unwrap();

        let registry = Mutex::new(ContentRegistry::with_defaults());
        hydrate(&registry, &db).await.unwrap();

        let registry = registry.into_inner().unwrap();
        assert!(registry.is_available(NEWS));
        assert!(!registry.is_available(DRIVERS));
        assert!(registry.get(NEWS).unwrap().size_bytes > 0);
    }

    #[tokio::test]
    async fn hydrate_skips_corrupt_records() {
        let dir = tempfile::tempdir().unwrap();
        let db = ContentDatabase::new(dir.path().join("db"));
        db.put(NEWS, json!(1)).await.unwrap();
        db.put(DRIVERS, json!(2)).await.unwrap();
        std::fs::write(dir.path().join("db/store/drivers.json"), "{oops").unwrap();

        let registry = Mutex::new(ContentRegistry::with_defaults());
        hydrate(&registry, &db).await.unwrap();

        let registry = registry.into_inner().unwrap();
        assert!(registry.is_available(NEWS));
        assert!(!registry.is_available(DRIVERS));
    }

    #[tokio::test]
    async fn hydrate_propagates_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("db");
        std::fs::write(&root, "not a database").unwrap();
        let db = ContentDatabase::new(&root);

        let registry = Mutex::new(ContentRegistry::with_defaults());
        assert!(hydrate(&registry, &db).await.is_err());
    }
}
