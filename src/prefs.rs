//! Offline preference storage.
//!
//! Preferences are a singleton configuration blob: loaded once at
//! initialization with hard-coded defaults as the fallback, shallow-merged on
//! every update, and persisted immediately. Persistence is best-effort - a
//! failed save is logged by the caller, never surfaced.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry;

/// Default refresh interval. An hour balances freshness against refetching
/// slowly-changing dashboard data.
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u32 = 60;

/// Default storage ceiling for cached payloads.
pub const DEFAULT_MAX_STORAGE_MB: u32 = 50;

/// Preference file name under the config directory.
const PREFS_FILE: &str = "preferences.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub enable_offline_mode: bool,
    pub auto_sync: bool,
    pub sync_interval_minutes: u32,
    pub max_storage_mb: u32,
    /// Per-bucket opt-in flags, surfaced to settings views.
    pub content_types: HashMap<String, bool>,
}

impl Default for Preferences {
    fn default() -> Self {
        let content_types = registry::KNOWN_CONTENT_TYPES
            .iter()
            .map(|ct| (ct.to_string(), true))
            .collect();
        Self {
            enable_offline_mode: true,
            auto_sync: true,
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            max_storage_mb: DEFAULT_MAX_STORAGE_MB,
            content_types,
        }
    }
}

impl Preferences {
    /// Shallow merge: only the fields present in the update change.
    pub fn merge(&mut self, update: PreferenceUpdate) {
        if let Some(v) = update.enable_offline_mode {
            self.enable_offline_mode = v;
        }
        if let Some(v) = update.auto_sync {
            self.auto_sync = v;
        }
        if let Some(v) = update.sync_interval_minutes {
            self.sync_interval_minutes = v;
        }
        if let Some(v) = update.max_storage_mb {
            self.max_storage_mb = v;
        }
        if let Some(v) = update.content_types {
            self.content_types = v;
        }
    }

    pub fn sync_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.sync_interval_minutes))
    }

    pub fn max_storage_bytes(&self) -> u64 {
        u64::from(self.max_storage_mb) * 1024 * 1024
    }
}

/// Partial preference change, applied as a shallow merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    pub enable_offline_mode: Option<bool>,
    pub auto_sync: Option<bool>,
    pub sync_interval_minutes: Option<u32>,
    pub max_storage_mb: Option<u32>,
    pub content_types: Option<HashMap<String, bool>>,
}

/// Durable key-value home for the preference blob.
pub trait PreferenceStore: Send + Sync {
    /// Missing or unparsable blobs yield the defaults; this never errors.
    fn load(&self) -> Preferences;

    /// Best-effort write. The manager logs a failure and moves on.
    fn save(&self, prefs: &Preferences) -> Result<()>;
}

/// File-backed preference store at a fixed path.
pub struct JsonFilePreferences {
    path: PathBuf,
}

impl JsonFilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.config/gridcache/preferences.json` (platform equivalent).
    pub fn at_default_location() -> Result<Self> {
        let config_dir =
            dirs::config_dir().context("could not determine a config directory")?;
        Ok(Self::new(config_dir.join("gridcache").join(PREFS_FILE)))
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn load(&self) -> Preferences {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "no stored preferences, using defaults");
                return Preferences::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(prefs) => prefs,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "unparsable preferences, using defaults");
                Preferences::default()
            }
        }
    }

    fn save(&self, prefs: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory preference store for tests and ephemeral embedders.
#[derive(Clone, Default)]
pub struct MemoryPreferences {
    stored: Arc<Mutex<Option<Preferences>>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self) -> Preferences {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }

    fn save(&self, prefs: &Preferences) -> Result<()> {
        *self.stored.lock().unwrap_or_else(PoisonError::into_inner) = Some(prefs.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_all_known_types() {
        let prefs = Preferences::default();
        assert!(prefs.enable_offline_mode);
        assert!(prefs.auto_sync);
        assert_eq!(prefs.sync_interval_minutes, DEFAULT_SYNC_INTERVAL_MINUTES);
        for ct in registry::KNOWN_CONTENT_TYPES {
            assert_eq!(prefs.content_types.get(*ct), Some(&true));
        }
    }

    #[test]
    fn merge_is_shallow() {
        let mut prefs = Preferences::default();
        prefs.merge(PreferenceUpdate {
            auto_sync: Some(false),
            ..Default::default()
        });
        assert!(!prefs.auto_sync);
        // Everything else untouched.
        assert!(prefs.enable_offline_mode);
        assert_eq!(prefs.sync_interval_minutes, DEFAULT_SYNC_INTERVAL_MINUTES);
        assert_eq!(prefs.max_storage_mb, DEFAULT_MAX_STORAGE_MB);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFilePreferences::new(dir.path().join("prefs.json"));

        let mut prefs = Preferences::default();
        prefs.max_storage_mb = 10;
        store.save(&prefs).unwrap();

        assert_eq!(store.load(), prefs);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let store = JsonFilePreferences::new("/nonexistent/gridcache/prefs.json");
        assert_eq!(store.load(), Preferences::default());
    }

    #[test]
    fn garbage_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFilePreferences::new(path);
        assert_eq!(store.load(), Preferences::default());
    }
}
