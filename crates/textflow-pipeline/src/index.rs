use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use textflow_core::{Metadata, TextUnit};

use crate::BoxFuture;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredUnit {
    pub unit: TextUnit,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub count: usize,
}

/// Embedding storage and retrieval, implemented by the host. Embedding happens on the
/// store's side.
pub trait VectorStore: Send + Sync {
    fn add_units(
        &self,
        units: Vec<TextUnit>,
        collection: &str,
    ) -> BoxFuture<'_, Result<usize, VectorStoreError>>;

    fn similarity_search(
        &self,
        query: &str,
        limit: usize,
        collection: &str,
        filter: Option<Metadata>,
    ) -> BoxFuture<'_, Result<Vec<ScoredUnit>, VectorStoreError>>;

    fn collection_info(
        &self,
        name: &str,
    ) -> BoxFuture<'_, Result<Option<CollectionInfo>, VectorStoreError>>;

    fn delete_collection(&self, name: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub batches: usize,
    pub indexed: usize,
}

/// Pushes units into a [`VectorStore`] in fixed-size batches with a delay between them.
pub struct BatchIndexer {
    store: Arc<dyn VectorStore>,
    collection: String,
    batch_size: usize,
    delay: Duration,
}

impl std::fmt::Debug for BatchIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchIndexer")
            .field("collection", &self.collection)
            .field("batch_size", &self.batch_size)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl BatchIndexer {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        batch_size: usize,
        delay: Duration,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            batch_size: batch_size.max(1),
            delay,
        }
    }

    /// # Errors
    ///
    /// Returns the store error of the first failing batch; earlier batches stay indexed.
    pub async fn index(&self, units: Vec<TextUnit>) -> Result<IndexReport, VectorStoreError> {
        let mut report = IndexReport::default();
        let total_batches = units.len().div_ceil(self.batch_size);
        let mut units = units.into_iter().peekable();

        while units.peek().is_some() {
            let batch: Vec<TextUnit> = units.by_ref().take(self.batch_size).collect();
            report.indexed += self.store.add_units(batch, &self.collection).await?;
            report.batches += 1;
            tracing::debug!(
                collection = %self.collection,
                batch = report.batches,
                total_batches,
                "indexed batch"
            );
            if units.peek().is_some() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        Ok(report)
    }

    /// # Errors
    ///
    /// Returns the store error.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredUnit>, VectorStoreError> {
        self.store
            .similarity_search(query, limit, &self.collection, None)
            .await
    }
}
