//! Versioned on-disk content database.
//!
//! One record per content type under `<root>/store/<type>.json`, with the
//! schema version in `<root>/VERSION`. The migration policy is forward-only
//! and destructive: a version mismatch drops the record store and recreates
//! it empty. Cached payloads are cheap to refetch, so no data ever moves
//! between schema versions.
//!
//! Every operation re-validates the database rather than holding a handle,
//! which keeps the adapter correct when the database is reset between calls.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::CacheError;

/// Current schema version. Bump on any record shape change; older stores are
/// dropped and recreated, never migrated in place.
pub const SCHEMA_VERSION: u32 = 2;

/// Directory name of the on-disk store under the default cache location.
const DB_DIR_NAME: &str = "offline-content-store";

const VERSION_FILE: &str = "VERSION";
const STORE_DIR: &str = "store";

/// A single cached record. Put overwrites; there is at most one record per
/// content type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPayload {
    pub content_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl CachedPayload {
    /// Byte length of the serialized `data` field, as reported to the
    /// registry and the quota guard.
    pub fn size_bytes(&self) -> u64 {
        serde_json::to_vec(&self.data)
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(0)
    }
}

/// Schema migration strategy, applied when the stored version does not match
/// the current one. Isolated behind a trait so a future version can migrate
/// records in place without touching any call site.
pub trait Migration: Send + Sync {
    fn migrate(&self, from: Option<u32>, to: u32, store_dir: &Path) -> Result<(), CacheError>;
}

/// The only strategy currently shipped: drop the record store and recreate it
/// empty.
pub struct DropAndRecreate;

impl Migration for DropAndRecreate {
    fn migrate(&self, from: Option<u32>, to: u32, store_dir: &Path) -> Result<(), CacheError> {
        info!(?from, to, "schema changed, dropping record store");
        if store_dir.exists() {
            std::fs::remove_dir_all(store_dir).map_err(|e| CacheError::io(store_dir, e))?;
        }
        std::fs::create_dir_all(store_dir).map_err(|e| CacheError::io(store_dir, e))?;
        Ok(())
    }
}

pub struct ContentDatabase {
    root: PathBuf,
    version: u32,
    migration: Box<dyn Migration>,
}

impl ContentDatabase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            version: SCHEMA_VERSION,
            migration: Box::new(DropAndRecreate),
        }
    }

    /// Platform cache directory, e.g. `~/.cache/gridcache/offline-content-store`.
    pub fn at_default_location() -> Result<Self> {
        let cache_dir = dirs::cache_dir().context("could not determine a cache directory")?;
        Ok(Self::new(cache_dir.join("gridcache").join(DB_DIR_NAME)))
    }

    pub fn with_migration(mut self, migration: Box<dyn Migration>) -> Self {
        self.migration = migration;
        self
    }

    /// Pin the schema version. Tests use this to exercise migration.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate the database, migrating if the stored version mismatches, and
    /// return the record store directory. Called by every operation.
    async fn open(&self) -> Result<PathBuf, CacheError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CacheError::io(&self.root, e))?;

        let version_path = self.root.join(VERSION_FILE);
        let store_dir = self.root.join(STORE_DIR);

        let stored = match tokio::fs::read_to_string(&version_path).await {
            Ok(raw) => raw.trim().parse::<u32>().ok(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(CacheError::io(&version_path, err)),
        };

        if stored != Some(self.version) {
            self.migration.migrate(stored, self.version, &store_dir)?;
            tokio::fs::write(&version_path, self.version.to_string())
                .await
                .map_err(|e| CacheError::io(&version_path, e))?;
        } else {
            // VERSION can outlive the store dir if a reset was interrupted.
            tokio::fs::create_dir_all(&store_dir)
                .await
                .map_err(|e| CacheError::io(&store_dir, e))?;
        }

        Ok(store_dir)
    }

    /// Open-only probe, used by hydration to distinguish a database-level
    /// failure (fatal to the pass) from a per-record one (skipped).
    pub async fn ensure_open(&self) -> Result<(), CacheError> {
        self.open().await.map(|_| ())
    }

    fn record_path(&self, store_dir: &Path, content_type: &str) -> Result<PathBuf, CacheError> {
        let valid = !content_type.is_empty()
            && content_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CacheError::InvalidContentType(content_type.to_string()));
        }
        Ok(store_dir.join(format!("{content_type}.json")))
    }

    /// Upsert the record for `content_type`, timestamped now.
    pub async fn put(&self, content_type: &str, data: Value) -> Result<CachedPayload, CacheError> {
        let store_dir = self.open().await?;
        let path = self.record_path(&store_dir, content_type)?;

        let record = CachedPayload {
            content_type: content_type.to_string(),
            data,
            timestamp: Utc::now(),
        };
        let contents = serde_json::to_vec(&record)?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| CacheError::io(&path, e))?;

        debug!(content_type, "stored cached payload");
        Ok(record)
    }

    /// Full record, or `None` when nothing is stored for the type.
    pub async fn get_record(&self, content_type: &str) -> Result<Option<CachedPayload>, CacheError> {
        let store_dir = self.open().await?;
        let path = self.record_path(&store_dir, content_type)?;

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CacheError::io(&path, err)),
        };
        let record = serde_json::from_slice(&contents).map_err(|source| {
            CacheError::CorruptRecord {
                content_type: content_type.to_string(),
                source,
            }
        })?;
        Ok(Some(record))
    }

    /// Just the stored payload data.
    pub async fn get(&self, content_type: &str) -> Result<Option<Value>, CacheError> {
        Ok(self
            .get_record(content_type)
            .await?
            .map(|record| record.data))
    }

    /// Remove the record for `content_type`; no-op when absent.
    pub async fn delete(&self, content_type: &str) -> Result<(), CacheError> {
        let store_dir = self.open().await?;
        let path = self.record_path(&store_dir, content_type)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CacheError::io(&path, err)),
        }
    }

    /// Remove every record, keeping the store itself.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let store_dir = self.open().await?;
        let mut entries = tokio::fs::read_dir(&store_dir)
            .await
            .map_err(|e| CacheError::io(&store_dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&store_dir, e))?
        {
            let path = entry.path();
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| CacheError::io(&path, e))?;
        }
        Ok(())
    }

    /// Destroy the entire database, version marker included. The next
    /// operation recreates it from scratch at the current schema version.
    /// This is the designated recovery path for corruption.
    pub async fn reset(&self) -> Result<(), CacheError> {
        let meta = match tokio::fs::metadata(&self.root).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(CacheError::io(&self.root, err)),
        };
        // A plain file squatting on the database path counts as corruption
        // and is removed the same way.
        let removal = if meta.is_dir() {
            tokio::fs::remove_dir_all(&self.root).await
        } else {
            tokio::fs::remove_file(&self.root).await
        };
        match removal {
            Ok(()) => {
                info!(root = %self.root.display(), "database reset");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CacheError::io(&self.root, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_db(dir: &tempfile::TempDir) -> ContentDatabase {
        ContentDatabase::new(dir.path().join("db"))
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);

        let data = json!({ "articles": [{ "title": "Silly season" }] });
        db.put("news", data.clone()).await.unwrap();

        assert_eq!(db.get("news").await.unwrap(), Some(data));
        assert_eq!(db.get("drivers").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);

        db.put("news", json!({ "rev": 1 })).await.unwrap();
        db.put("news", json!({ "rev": 2 })).await.unwrap();

        assert_eq!(db.get("news").await.unwrap(), Some(json!({ "rev": 2 })));
    }

    #[tokio::test]
    async fn delete_is_noop_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);

        db.delete("news").await.unwrap();

        db.put("news", json!(1)).await.unwrap();
        db.delete("news").await.unwrap();
        assert_eq!(db.get("news").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_removes_all_records() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);

        db.put("news", json!(1)).await.unwrap();
        db.put("drivers", json!(2)).await.unwrap();
        db.clear().await.unwrap();

        assert_eq!(db.get("news").await.unwrap(), None);
        assert_eq!(db.get("drivers").await.unwrap(), None);
    }

    #[tokio::test]
    async fn version_bump_drops_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("db");

        let old = ContentDatabase::new(&root).with_version(1);
        old.put("news", json!({ "rev": 1 })).await.unwrap();

        let new = ContentDatabase::new(&root).with_version(2);
        assert_eq!(new.get("news").await.unwrap(), None);
        assert_eq!(
            std::fs::read_to_string(root.join(VERSION_FILE)).unwrap().trim(),
            "2"
        );
    }

    #[tokio::test]
    async fn reset_then_put_recreates() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);

        db.put("news", json!(1)).await.unwrap();
        db.reset().await.unwrap();
        assert_eq!(db.get("news").await.unwrap(), None);

        db.put("news", json!(2)).await.unwrap();
        assert_eq!(db.get("news").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn reset_removes_a_squatting_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("db");
        std::fs::write(&root, "not a database").unwrap();

        let db = ContentDatabase::new(&root);
        assert!(db.ensure_open().await.is_err());

        db.reset().await.unwrap();
        assert!(db.ensure_open().await.is_ok());
    }

    #[tokio::test]
    async fn corrupt_record_is_reported_per_type() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);
        db.put("news", json!(1)).await.unwrap();

        let path = db.root().join(STORE_DIR).join("drivers.json");
        std::fs::write(&path, "{truncated").unwrap();

        assert!(matches!(
            db.get_record("drivers").await,
            Err(CacheError::CorruptRecord { .. })
        ));
        // Other records are unaffected.
        assert_eq!(db.get("news").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn rejects_path_like_content_types() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);

        assert!(matches!(
            db.put("../escape", json!(1)).await,
            Err(CacheError::InvalidContentType(_))
        ));
    }
}
