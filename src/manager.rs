//! The offline content manager.
//!
//! Public facade over the database adapter, worker bridge, content registry,
//! network monitor and sync controller. Constructed explicitly with its
//! collaborators injected - there is no global instance - and cheap to clone
//! for sharing across views and background tasks.
//!
//! Nothing from this module reaches callers as an error: every operation
//! resolves to a meaningful value (`bool`, data, `None`) after logging its
//! root cause internally. The one condition worth a human's attention,
//! repeated reset failure, logs at error severity.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::db::ContentDatabase;
use crate::estimate::{NoEstimator, StorageEstimator};
use crate::events::{Event, EventBus};
use crate::network::{NetworkMonitor, Transition};
use crate::prefs::{PreferenceStore, PreferenceUpdate, Preferences};
use crate::registry::{self, ContentDescriptor, ContentRegistry, ListFilter};
use crate::source::ContentSource;
use crate::sync;
use crate::worker::WorkerBridge;

/// Overall readiness, observable by status views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    Initializing,
    /// Hydration succeeded; the registry reflects stored content.
    Ready,
    /// Hydration failed even after one reset-and-retry. Cache and retrieve
    /// still work against the freshly emptied database; the registry stays
    /// empty until new content is cached.
    Degraded,
}

/// Storage usage report. Both fields are zero when the platform offers no
/// estimate facility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

struct Inner {
    db: ContentDatabase,
    bridge: Mutex<WorkerBridge>,
    prefs: Mutex<Preferences>,
    pref_store: Box<dyn PreferenceStore>,
    source: Arc<dyn ContentSource>,
    estimator: Box<dyn StorageEstimator>,
    registry: Mutex<ContentRegistry>,
    network: NetworkMonitor,
    events: EventBus,
    state: Mutex<ManagerState>,
}

#[derive(Clone)]
pub struct OfflineContentManager {
    inner: Arc<Inner>,
}

pub struct ManagerBuilder {
    db: ContentDatabase,
    pref_store: Box<dyn PreferenceStore>,
    source: Arc<dyn ContentSource>,
    estimator: Box<dyn StorageEstimator>,
    registry: ContentRegistry,
    bridge: WorkerBridge,
    initially_online: bool,
}

impl ManagerBuilder {
    pub fn estimator(mut self, estimator: Box<dyn StorageEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Replace the default content buckets.
    pub fn descriptors(mut self, descriptors: Vec<ContentDescriptor>) -> Self {
        self.registry = ContentRegistry::new(descriptors);
        self
    }

    /// Provide a bridge up front (tests intercept the message channel, or
    /// pass [`WorkerBridge::disabled`] to run worker-less).
    pub fn bridge(mut self, bridge: WorkerBridge) -> Self {
        self.bridge = bridge;
        self
    }

    /// Seed the network monitor; defaults to online.
    pub fn initially_online(mut self, online: bool) -> Self {
        self.initially_online = online;
        self
    }

    pub fn build(self) -> OfflineContentManager {
        OfflineContentManager {
            inner: Arc::new(Inner {
                db: self.db,
                bridge: Mutex::new(self.bridge),
                prefs: Mutex::new(Preferences::default()),
                pref_store: self.pref_store,
                source: self.source,
                estimator: self.estimator,
                registry: Mutex::new(self.registry),
                network: NetworkMonitor::new(self.initially_online),
                events: EventBus::new(),
                state: Mutex::new(ManagerState::Uninitialized),
            }),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OfflineContentManager {
    pub fn builder(
        db: ContentDatabase,
        pref_store: Box<dyn PreferenceStore>,
        source: Arc<dyn ContentSource>,
    ) -> ManagerBuilder {
        ManagerBuilder {
            db,
            pref_store,
            source,
            estimator: Box::new(NoEstimator),
            registry: ContentRegistry::with_defaults(),
            bridge: WorkerBridge::unregistered(),
            initially_online: true,
        }
    }

    pub fn new(
        db: ContentDatabase,
        pref_store: Box<dyn PreferenceStore>,
        source: Arc<dyn ContentSource>,
    ) -> Self {
        Self::builder(db, pref_store, source).build()
    }

    /// Register the worker, load preferences, and hydrate the registry from
    /// the database. A failed hydration triggers the destructive reset and
    /// exactly one retry; a second failure leaves the manager degraded but
    /// usable.
    pub async fn initialize(&self) {
        self.set_state(ManagerState::Initializing);

        let worker_registered = {
            let mut bridge = lock(&self.inner.bridge);
            if bridge.wants_registration() {
                *bridge = WorkerBridge::register();
            }
            bridge.is_registered()
        };
        if worker_registered {
            self.inner.events.emit(Event::WorkerUpdate);
        }

        *lock(&self.inner.prefs) = self.inner.pref_store.load();

        match registry::hydrate(&self.inner.registry, &self.inner.db).await {
            Ok(()) => {
                info!("offline content manager ready");
                self.set_state(ManagerState::Ready);
            }
            Err(err) => {
                warn!(error = %err, "hydration failed, resetting database");
                if self.reset_and_rehydrate().await {
                    info!("recovered after database reset");
                    self.set_state(ManagerState::Ready);
                } else {
                    error!("hydration failed even after reset; continuing degraded");
                    self.set_state(ManagerState::Degraded);
                }
            }
        }
    }

    /// Store a payload for one content bucket.
    ///
    /// Returns `false` without writing when offline mode is disabled, the
    /// quota guard refuses the payload, or the database write fails. The
    /// quota guard fails open when no storage estimate is available.
    pub async fn cache(&self, content_type: &str, data: Value) -> bool {
        if !self.preferences().enable_offline_mode {
            debug!(content_type, "offline mode disabled, refusing to cache");
            return false;
        }

        let payload_len = match serde_json::to_vec(&data) {
            Ok(bytes) => bytes.len() as u64,
            Err(err) => {
                warn!(content_type, error = %err, "payload is not serializable");
                return false;
            }
        };

        if let Some(estimate) = self.inner.estimator.estimate().await {
            let limit = self.preferences().max_storage_bytes();
            if estimate.usage_bytes + payload_len > limit {
                warn!(
                    content_type,
                    usage = estimate.usage_bytes,
                    payload = payload_len,
                    limit,
                    "storage quota exceeded, refusing to cache"
                );
                return false;
            }
        }

        let record = match self.inner.db.put(content_type, data).await {
            Ok(record) => record,
            Err(err) => {
                warn!(content_type, error = %err, "cache write failed");
                return false;
            }
        };

        lock(&self.inner.registry).mark_cached(content_type, payload_len, record.timestamp);
        self.bridge().mirror_cache(content_type, &record.data);
        true
    }

    /// Read a cached payload: local database first, worker cache as the
    /// fallback, `None` when both are empty.
    pub async fn retrieve(&self, content_type: &str) -> Option<Value> {
        match self.inner.db.get(content_type).await {
            Ok(Some(data)) => return Some(data),
            Ok(None) => {}
            Err(err) => {
                debug!(content_type, error = %err, "database read failed, trying worker cache");
            }
        }
        self.bridge().fetch_cached(content_type).await
    }

    /// Registry lookup; no I/O.
    pub fn is_available(&self, content_type: &str) -> bool {
        lock(&self.inner.registry).is_available(content_type)
    }

    pub fn list(&self, filter: ListFilter) -> Vec<ContentDescriptor> {
        lock(&self.inner.registry).list(filter)
    }

    pub fn list_available(&self) -> Vec<ContentDescriptor> {
        self.list(ListFilter::Available)
    }

    /// Delete one bucket. The return value mirrors the database delete; the
    /// worker mirror and registry update follow a successful delete only.
    pub async fn remove(&self, content_type: &str) -> bool {
        if let Err(err) = self.inner.db.delete(content_type).await {
            warn!(content_type, error = %err, "failed to remove cached content");
            return false;
        }
        self.bridge().mirror_remove(content_type);
        lock(&self.inner.registry).mark_removed(content_type);
        true
    }

    /// Delete every bucket from the database and the worker cache.
    pub async fn clear_all(&self) -> bool {
        if let Err(err) = self.inner.db.clear().await {
            warn!(error = %err, "failed to clear cached content");
            return false;
        }
        self.bridge().mirror_clear();
        lock(&self.inner.registry).mark_all_removed();
        true
    }

    /// Run a refresh pass. No-op when offline or auto-sync is off.
    pub async fn sync(&self) {
        sync::sync_all(self).await;
    }

    /// Shallow-merge a preference change and persist immediately.
    /// Persistence is best-effort; a failed save is logged only.
    pub fn update_preferences(&self, update: PreferenceUpdate) {
        let snapshot = {
            let mut prefs = lock(&self.inner.prefs);
            prefs.merge(update);
            prefs.clone()
        };
        if let Err(err) = self.inner.pref_store.save(&snapshot) {
            warn!(error = %err, "failed to persist preferences");
        }
    }

    /// Destroy the entire database, wipe the worker mirror, and re-derive
    /// the registry from the (now empty) store. The recovery primitive for
    /// corruption, also exposed as a user-triggered troubleshooting action.
    /// Readiness as observed by callers does not change.
    pub async fn reset_database(&self) {
        let _ = self.reset_and_rehydrate().await;
    }

    async fn reset_and_rehydrate(&self) -> bool {
        if let Err(err) = self.inner.db.reset().await {
            error!(error = %err, "database reset failed");
            return false;
        }
        // The mirror holds pre-reset payloads; a reset that left them
        // reachable through the retrieve fallback would not be a reset.
        self.bridge().mirror_clear();
        lock(&self.inner.registry).mark_all_removed();
        match registry::hydrate(&self.inner.registry, &self.inner.db).await {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "hydration failed after reset");
                false
            }
        }
    }

    /// Current storage footprint; `{0, 0}` when no estimate is available.
    pub async fn storage_usage(&self) -> StorageUsage {
        match self.inner.estimator.estimate().await {
            Some(estimate) => StorageUsage {
                used_bytes: estimate.usage_bytes,
                total_bytes: estimate.quota_bytes,
            },
            None => StorageUsage::default(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.inner.network.is_online()
    }

    /// Record a connectivity change reported by the host. Emits a status
    /// event on every transition; restoring connectivity additionally
    /// schedules a background sync whose outcome is logged, not surfaced.
    pub fn set_network_online(&self, online: bool) {
        let Some(transition) = self.inner.network.set_online(online) else {
            return;
        };
        self.inner
            .events
            .emit(Event::NetworkStatusChanged { is_online: online });

        if transition == Transition::CameOnline {
            info!("network restored, scheduling sync");
            let manager = self.clone();
            tokio::spawn(async move {
                manager.sync().await;
            });
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> ManagerState {
        *lock(&self.inner.state)
    }

    pub fn preferences(&self) -> Preferences {
        lock(&self.inner.prefs).clone()
    }

    pub(crate) fn source(&self) -> Arc<dyn ContentSource> {
        Arc::clone(&self.inner.source)
    }

    fn bridge(&self) -> WorkerBridge {
        lock(&self.inner.bridge).clone()
    }

    fn set_state(&self, state: ManagerState) {
        *lock(&self.inner.state) = state;
    }
}
