//! Best-effort mirror into the background worker cache.
//!
//! The bridge posts typed messages to a separately-owned cache task. Mirror
//! writes are at-most-once with no delivery confirmation - callers must not
//! treat them as durable. The only request/response exchange is
//! `GetCachedContent`, the fallback read path when the primary database has
//! nothing. With no worker registered, mirrors are silent no-ops and reads
//! resolve to `None`; the bridge never blocks or fails a primary operation.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// Messages understood by the worker cache task.
#[derive(Debug)]
pub enum WorkerMessage {
    CacheContent {
        content_type: String,
        data: Value,
    },
    RemoveCachedContent {
        content_type: String,
    },
    ClearCache,
    GetCachedContent {
        content_type: String,
        reply: oneshot::Sender<Option<Value>>,
    },
}

#[derive(Debug, Clone)]
pub struct WorkerBridge {
    tx: Option<mpsc::UnboundedSender<WorkerMessage>>,
    /// `false` means the manager must never spawn a worker for this bridge.
    enabled: bool,
}

impl WorkerBridge {
    /// Bridge with no worker yet; the manager registers one at initialization.
    pub fn unregistered() -> Self {
        Self {
            tx: None,
            enabled: true,
        }
    }

    /// Bridge that stays worker-less forever. Every mirror is a no-op and
    /// every read resolves `None`.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            enabled: false,
        }
    }

    /// Spawn the worker cache task and return a bridge connected to it.
    pub fn register() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(rx));
        debug!("background worker registered");
        Self {
            tx: Some(tx),
            enabled: true,
        }
    }

    /// Bridge over a caller-owned channel. Tests drive the receiving end to
    /// observe the message protocol directly.
    pub fn with_channel(tx: mpsc::UnboundedSender<WorkerMessage>) -> Self {
        Self {
            tx: Some(tx),
            enabled: true,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.tx.is_some()
    }

    pub(crate) fn wants_registration(&self) -> bool {
        self.enabled && self.tx.is_none()
    }

    fn send(&self, message: WorkerMessage) {
        let Some(tx) = &self.tx else {
            trace!("no worker registered, dropping message");
            return;
        };
        if tx.send(message).is_err() {
            debug!("worker channel closed, message dropped");
        }
    }

    pub fn mirror_cache(&self, content_type: &str, data: &Value) {
        self.send(WorkerMessage::CacheContent {
            content_type: content_type.to_string(),
            data: data.clone(),
        });
    }

    pub fn mirror_remove(&self, content_type: &str) {
        self.send(WorkerMessage::RemoveCachedContent {
            content_type: content_type.to_string(),
        });
    }

    pub fn mirror_clear(&self) {
        self.send(WorkerMessage::ClearCache);
    }

    /// Fallback read through the worker cache. Resolves `None` when no worker
    /// is registered, the worker is gone, or it holds nothing for the type.
    pub async fn fetch_cached(&self, content_type: &str) -> Option<Value> {
        let tx = self.tx.as_ref()?;
        let (reply, rx) = oneshot::channel();
        tx.send(WorkerMessage::GetCachedContent {
            content_type: content_type.to_string(),
            reply,
        })
        .ok()?;
        rx.await.ok().flatten()
    }
}

/// The worker-side cache. Messages are applied in arrival order, so a read
/// queued after a mirror write observes that write.
async fn run_worker(mut rx: mpsc::UnboundedReceiver<WorkerMessage>) {
    let mut cache: HashMap<String, Value> = HashMap::new();
    while let Some(message) = rx.recv().await {
        match message {
            WorkerMessage::CacheContent { content_type, data } => {
                cache.insert(content_type, data);
            }
            WorkerMessage::RemoveCachedContent { content_type } => {
                cache.remove(&content_type);
            }
            WorkerMessage::ClearCache => {
                cache.clear();
            }
            WorkerMessage::GetCachedContent {
                content_type,
                reply,
            } => {
                // Receiver may have lost interest; that's fine.
                let _ = reply.send(cache.get(&content_type).cloned());
            }
        }
    }
    trace!("worker cache task shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unregistered_bridge_is_inert() {
        let bridge = WorkerBridge::unregistered();
        bridge.mirror_cache("news", &json!(1));
        bridge.mirror_remove("news");
        bridge.mirror_clear();
        assert_eq!(bridge.fetch_cached("news").await, None);
    }

    #[tokio::test]
    async fn mirror_then_fetch_round_trip() {
        let bridge = WorkerBridge::register();
        bridge.mirror_cache("news", &json!({ "articles": [] }));
        assert_eq!(
            bridge.fetch_cached("news").await,
            Some(json!({ "articles": [] }))
        );
    }

    #[tokio::test]
    async fn remove_and_clear_are_applied_in_order() {
        let bridge = WorkerBridge::register();

        bridge.mirror_cache("news", &json!(1));
        bridge.mirror_remove("news");
        assert_eq!(bridge.fetch_cached("news").await, None);

        bridge.mirror_cache("news", &json!(1));
        bridge.mirror_cache("drivers", &json!(2));
        bridge.mirror_clear();
        assert_eq!(bridge.fetch_cached("news").await, None);
        assert_eq!(bridge.fetch_cached("drivers").await, None);
    }

    #[tokio::test]
    async fn fetch_resolves_none_when_worker_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let bridge = WorkerBridge::with_channel(tx);

        bridge.mirror_cache("news", &json!(1));
        assert_eq!(bridge.fetch_cached("news").await, None);
    }
}
