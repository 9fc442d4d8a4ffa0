use serde::{Deserialize, Serialize};

use crate::error::ChunkError;

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ". ", " ", ""]
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
}

fn default_keep_separator() -> bool {
    true
}

fn default_min_chunk_size() -> usize {
    100
}

fn default_include_parents() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChunkConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Tried in order; an empty string means raw character slicing.
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
    #[serde(default = "default_keep_separator")]
    pub keep_separator: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
            keep_separator: default_keep_separator(),
        }
    }
}

impl ChunkConfig {
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_separators<S: Into<String>>(mut self, separators: impl IntoIterator<Item = S>) -> Self {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_keep_separator(mut self, keep: bool) -> Self {
        self.keep_separator = keep;
        self
    }

    /// Chunk size clamped to at least one.
    #[must_use]
    pub fn effective_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Length budget of a chunk before the overlap tail is appended.
    #[must_use]
    pub fn core_budget(&self) -> usize {
        self.effective_size().saturating_sub(self.chunk_overlap).max(1)
    }

    /// # Errors
    ///
    /// Returns `ChunkError::InvalidConfig` when the overlap is not smaller than the size.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunk_overlap >= self.effective_size() {
            return Err(ChunkError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap,
                self.effective_size()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SemanticConfig {
    #[serde(flatten)]
    pub base: ChunkConfig,
    /// Chunks shorter than this are merged into a neighbor.
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            base: ChunkConfig::default(),
            min_chunk_size: default_min_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HierarchicalConfig {
    pub parent: ChunkConfig,
    pub child: ChunkConfig,
    /// Emit parent chunks alongside their children when flattening.
    #[serde(default = "default_include_parents")]
    pub include_parents: bool,
}

impl Default for HierarchicalConfig {
    fn default() -> Self {
        Self {
            parent: ChunkConfig::new(2000, 200),
            child: ChunkConfig::new(400, 50),
            include_parents: true,
        }
    }
}

impl HierarchicalConfig {
    /// # Errors
    ///
    /// Returns `ChunkError::InvalidConfig` if either level is invalid.
    pub fn validate(&self) -> Result<(), ChunkError> {
        self.parent.validate()?;
        self.child.validate()
    }
}

/// Strategy selector, as written in pipeline definitions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum ChunkStrategy {
    Recursive(ChunkConfig),
    Semantic(SemanticConfig),
    Token(ChunkConfig),
    Hierarchical(HierarchicalConfig),
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        Self::Recursive(ChunkConfig::default())
    }
}

impl ChunkStrategy {
    /// # Errors
    ///
    /// Returns `ChunkError::InvalidConfig` if the wrapped config is invalid.
    pub fn validate(&self) -> Result<(), ChunkError> {
        match self {
            Self::Recursive(c) | Self::Token(c) => c.validate(),
            Self::Semantic(c) => c.base.validate(),
            Self::Hierarchical(c) => c.validate(),
        }
    }
}
