//! Preference-driven refresh of cached content.
//!
//! Staleness is a client-side heuristic: a bucket is due when more time has
//! elapsed since its last update than the configured interval. The pass only
//! refreshes buckets already marked available - it never discovers content
//! that was never cached.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::manager::OfflineContentManager;
use crate::registry::{ContentDescriptor, ListFilter};

/// Whether a bucket needs a refresh at `now`.
pub fn due_for_refresh(
    descriptor: &ContentDescriptor,
    interval: chrono::Duration,
    now: DateTime<Utc>,
) -> bool {
    if !descriptor.is_available {
        return false;
    }
    match descriptor.last_updated {
        Some(updated) => now - updated > interval,
        // Available but never stamped; treat as stale.
        None => true,
    }
}

/// Refresh every due bucket. No-op when offline or auto-sync is disabled.
/// Buckets are processed independently: one failed fetch is logged and the
/// others proceed.
pub(crate) async fn sync_all(manager: &OfflineContentManager) {
    if !manager.is_online() {
        debug!("offline, skipping sync");
        return;
    }
    let prefs = manager.preferences();
    if !prefs.auto_sync {
        debug!("auto-sync disabled, skipping sync");
        return;
    }

    let interval = prefs.sync_interval();
    let now = Utc::now();
    let due: Vec<String> = manager
        .list(ListFilter::Available)
        .into_iter()
        .filter(|d| due_for_refresh(d, interval, now))
        .map(|d| d.content_type)
        .collect();

    if due.is_empty() {
        debug!("nothing due for refresh");
        return;
    }
    debug!(count = due.len(), "refreshing stale content");

    let refreshes = due.into_iter().map(|content_type| {
        let manager = manager.clone();
        async move {
            match manager.source().fetch_fresh(&content_type).await {
                Ok(data) => {
                    if !manager.cache(&content_type, data).await {
                        warn!(content_type, "refreshed payload was not cached");
                    }
                }
                Err(err) => {
                    warn!(content_type, error = %err, "refresh failed, continuing with other types");
                }
            }
        }
    });
    join_all(refreshes).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ContentDescriptor;
    use chrono::Duration;

    fn available(updated_minutes_ago: i64) -> ContentDescriptor {
        let mut d = ContentDescriptor::new("news", "News", "");
        d.is_available = true;
        d.last_updated = Some(Utc::now() - Duration::minutes(updated_minutes_ago));
        d
    }

    #[test]
    fn unavailable_is_never_due() {
        let d = ContentDescriptor::new("news", "News", "");
        assert!(!due_for_refresh(&d, Duration::minutes(60), Utc::now()));
    }

    #[test]
    fn stale_is_due() {
        assert!(due_for_refresh(
            &available(61),
            Duration::minutes(60),
            Utc::now()
        ));
    }

    #[test]
    fn fresh_is_not_due() {
        assert!(!due_for_refresh(
            &available(5),
            Duration::minutes(60),
            Utc::now()
        ));
    }

    #[test]
    fn available_without_timestamp_is_due() {
        let mut d = ContentDescriptor::new("news", "News", "");
        d.is_available = true;
        assert!(due_for_refresh(&d, Duration::minutes(60), Utc::now()));
    }
}
