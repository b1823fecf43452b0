//! Platform storage-estimate seam.
//!
//! The quota guard asks an estimator how much storage the cache already uses.
//! `None` means the facility is unavailable; the guard then fails open -
//! every write is permitted and reported usage is zero.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageEstimate {
    pub usage_bytes: u64,
    pub quota_bytes: u64,
}

#[async_trait]
pub trait StorageEstimator: Send + Sync {
    async fn estimate(&self) -> Option<StorageEstimate>;
}

/// Estimator that sums the on-disk footprint of the database root.
pub struct DirectoryEstimator {
    root: PathBuf,
    quota_bytes: u64,
}

impl DirectoryEstimator {
    pub fn new(root: impl Into<PathBuf>, quota_bytes: u64) -> Self {
        Self {
            root: root.into(),
            quota_bytes,
        }
    }

    async fn usage(&self) -> std::io::Result<u64> {
        let mut total = 0u64;
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    pending.push(entry.path());
                } else {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl StorageEstimator for DirectoryEstimator {
    async fn estimate(&self) -> Option<StorageEstimate> {
        match self.usage().await {
            Ok(usage_bytes) => Some(StorageEstimate {
                usage_bytes,
                quota_bytes: self.quota_bytes,
            }),
            Err(err) => {
                debug!(root = %self.root.display(), error = %err, "storage estimate unavailable");
                None
            }
        }
    }
}

/// Estimator standing in for a platform without the facility.
pub struct NoEstimator;

#[async_trait]
impl StorageEstimator for NoEstimator {
    async fn estimate(&self) -> Option<StorageEstimate> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sums_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("store")).unwrap();
        std::fs::write(dir.path().join("VERSION"), "2").unwrap();
        std::fs::write(dir.path().join("store/news.json"), vec![0u8; 100]).unwrap();

        let estimator = DirectoryEstimator::new(dir.path(), 1024);
        let estimate = estimator.estimate().await.unwrap();
        assert_eq!(estimate.usage_bytes, 101);
        assert_eq!(estimate.quota_bytes, 1024);
    }

    #[tokio::test]
    async fn missing_root_counts_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let estimator = DirectoryEstimator::new(dir.path().join("absent"), 1024);
        assert_eq!(
            estimator.estimate().await.unwrap(),
            StorageEstimate {
                usage_bytes: 0,
                quota_bytes: 1024
            }
        );
    }

    #[tokio::test]
    async fn no_estimator_reports_nothing() {
        assert_eq!(NoEstimator.estimate().await, None);
    }
}
