//! External data source seam.
//!
//! The sync controller refreshes stale buckets through this trait. Fetches
//! must be idempotent and side-effect-free per content type, so a failed
//! refresh can simply be retried on the next pass.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CacheError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while still failing fast enough that a
/// sync pass cannot hang indefinitely.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch a fresh payload for one content type.
    async fn fetch_fresh(&self, content_type: &str) -> Result<Value, CacheError>;
}

/// Fetches content from the dashboard backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpContentSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CacheError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch_fresh(&self, content_type: &str) -> Result<Value, CacheError> {
        let url = format!(
            "{}/api/{}",
            self.base_url.trim_end_matches('/'),
            content_type
        );
        let response = self.client.get(&url).send().await?;
        let response = response.error_for_status()?;
        let data = response.json().await?;
        Ok(data)
    }
}

/// Fixed in-memory source for demos and offline development.
#[derive(Debug, Clone, Default)]
pub struct StaticContentSource {
    payloads: HashMap<String, Value>,
}

impl StaticContentSource {
    pub fn new(payloads: HashMap<String, Value>) -> Self {
        Self { payloads }
    }

    pub fn insert(&mut self, content_type: impl Into<String>, data: Value) {
        self.payloads.insert(content_type.into(), data);
    }
}

#[async_trait]
impl ContentSource for StaticContentSource {
    async fn fetch_fresh(&self, content_type: &str) -> Result<Value, CacheError> {
        self.payloads
            .get(content_type)
            .cloned()
            .ok_or_else(|| CacheError::Fetch {
                content_type: content_type.to_string(),
                message: "no payload configured".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn static_source_serves_configured_payloads() {
        let mut source = StaticContentSource::default();
        source.insert("news", json!({ "articles": [] }));

        assert_eq!(
            source.fetch_fresh("news").await.unwrap(),
            json!({ "articles": [] })
        );
        assert!(matches!(
            source.fetch_fresh("drivers").await,
            Err(CacheError::Fetch { .. })
        ));
    }
}
