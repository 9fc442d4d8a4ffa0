use std::sync::Arc;

use textflow_core::TextUnit;

use crate::config::ChunkStrategy;
use crate::error::ChunkError;
use crate::hierarchical::HierarchicalSplitter;
use crate::length::{LengthFunction, TokenEstimate};
use crate::semantic::SemanticSplitter;
use crate::splitter::TextSplitter;
use crate::types::Chunk;

/// Dispatches a [`ChunkStrategy`] to the matching splitter.
#[derive(Clone)]
pub struct Chunker {
    token_counter: Arc<dyn LengthFunction>,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("token_counter", &self.token_counter.name())
            .finish()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            token_counter: Arc::new(TokenEstimate),
        }
    }

    /// Replace the length function used by the token strategy.
    #[must_use]
    pub fn with_token_counter(mut self, counter: Arc<dyn LengthFunction>) -> Self {
        self.token_counter = counter;
        self
    }

    /// # Errors
    ///
    /// Returns `ChunkError::InvalidConfig` if the strategy's config is invalid.
    pub fn chunk(&self, unit: &TextUnit, strategy: &ChunkStrategy) -> Result<Vec<Chunk>, ChunkError> {
        match strategy {
            ChunkStrategy::Recursive(config) => TextSplitter::new(config.clone()).split(unit),
            ChunkStrategy::Token(config) => {
                TextSplitter::with_tokens(config.clone(), Arc::clone(&self.token_counter)).split(unit)
            }
            ChunkStrategy::Semantic(config) => SemanticSplitter::new(config.clone()).split(unit),
            ChunkStrategy::Hierarchical(config) => {
                let hierarchy = HierarchicalSplitter::new(config.clone()).split(unit)?;
                Ok(hierarchy.into_chunks(config.include_parents))
            }
        }
    }

    /// Chunk and convert straight into units carrying chunk metadata.
    ///
    /// # Errors
    ///
    /// Returns `ChunkError::InvalidConfig` if the strategy's config is invalid.
    pub fn chunk_units(
        &self,
        unit: &TextUnit,
        strategy: &ChunkStrategy,
    ) -> Result<Vec<TextUnit>, ChunkError> {
        Ok(self
            .chunk(unit, strategy)?
            .into_iter()
            .map(Chunk::into_unit)
            .collect())
    }
}
