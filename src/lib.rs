//! gridcache - offline content caching for the gridview dashboard.
//!
//! Makes a fixed set of content buckets (drivers, news, dashboard stats,
//! bookmarks) available without a live connection. The
//! [`OfflineContentManager`] composes a versioned local database, a
//! best-effort background worker mirror, an in-memory content registry, a
//! network monitor, and a preference-driven sync controller.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gridcache::{
//!     ContentDatabase, HttpContentSource, JsonFilePreferences, OfflineContentManager,
//! };
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let manager = OfflineContentManager::new(
//!     ContentDatabase::at_default_location()?,
//!     Box::new(JsonFilePreferences::at_default_location()?),
//!     Arc::new(HttpContentSource::new("https://api.gridview.example")?),
//! );
//! manager.initialize().await;
//!
//! if manager.cache("news", serde_json::json!({ "articles": [] })).await {
//!     assert!(manager.is_available("news"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod error;
pub mod estimate;
pub mod events;
pub mod manager;
pub mod network;
pub mod prefs;
pub mod registry;
pub mod source;
pub mod sync;
pub mod worker;

pub use db::{CachedPayload, ContentDatabase, DropAndRecreate, Migration, SCHEMA_VERSION};
pub use error::CacheError;
pub use estimate::{DirectoryEstimator, NoEstimator, StorageEstimate, StorageEstimator};
pub use events::Event;
pub use manager::{ManagerState, OfflineContentManager, StorageUsage};
pub use network::NetworkMonitor;
pub use prefs::{
    JsonFilePreferences, MemoryPreferences, PreferenceStore, PreferenceUpdate, Preferences,
};
pub use registry::{ContentDescriptor, ContentRegistry, ListFilter};
pub use source::{ContentSource, HttpContentSource, StaticContentSource};
pub use worker::{WorkerBridge, WorkerMessage};
