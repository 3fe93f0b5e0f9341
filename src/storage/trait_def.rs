use crate::models::{Ad, AdFilter, AdPatch, AdScope, AdSummary, Counter, NewAd};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("ad not found")]
    NotFound,
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, indexes, etc.)
    async fn init(&self) -> Result<()>;

    /// Insert a new ad with zeroed counters and return it with its generated id
    async fn create(&self, ad: NewAd) -> StorageResult<Ad>;

    /// Get an ad by id, scoped to its package
    async fn get(&self, package_name: &str, id: &str) -> StorageResult<Option<Ad>>;

    /// List every ad of a package
    async fn list(&self, package_name: &str) -> StorageResult<Vec<Ad>>;

    /// List the ads of a package matching every criterion set in `filter`
    async fn filter(&self, package_name: &str, filter: &AdFilter) -> StorageResult<Vec<Ad>>;

    /// Overwrite the fields set in `patch` and return the updated ad
    async fn update(&self, package_name: &str, id: &str, patch: &AdPatch) -> StorageResult<Ad>;

    /// Remove every ad regardless of package, returning how many were removed
    async fn delete_all(&self) -> StorageResult<u64>;

    /// Atomically add one to `counter` on the ad matching `id` and `scope`
    async fn increment(&self, id: &str, counter: Counter, scope: &AdScope) -> StorageResult<Ad>;

    /// Sum every counter across the whole collection
    async fn summary(&self) -> StorageResult<AdSummary>;

    async fn increment_click(&self, id: &str, scope: &AdScope) -> StorageResult<Ad> {
        self.increment(id, Counter::Click, scope).await
    }

    async fn increment_view(&self, id: &str, scope: &AdScope) -> StorageResult<Ad> {
        self.increment(id, Counter::View, scope).await
    }

    async fn increment_completed_view(&self, id: &str, scope: &AdScope) -> StorageResult<Ad> {
        self.increment(id, Counter::CompletedView, scope).await
    }
}

/// Reject an empty patch before it reaches a backend.
pub(crate) fn ensure_patch(patch: &AdPatch) -> StorageResult<()> {
    if patch.is_empty() {
        return Err(StorageError::InvalidInput(
            "no fields provided for update".to_string(),
        ));
    }
    Ok(())
}
