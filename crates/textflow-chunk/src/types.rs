use std::fmt;

use serde::{Deserialize, Serialize};
use textflow_core::{Metadata, TextUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMethod {
    Recursive,
    Semantic,
    Token,
    Hierarchical,
}

impl ChunkMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recursive => "recursive",
            Self::Semantic => "semantic",
            Self::Token => "token",
            Self::Hierarchical => "hierarchical",
        }
    }
}

impl fmt::Display for ChunkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit produced by splitting a larger one.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    /// Metadata inherited from the source unit.
    pub metadata: Metadata,
    pub index: usize,
    pub total: usize,
    pub method: ChunkMethod,
    /// Set on hierarchical parents.
    pub id: Option<String>,
    /// Set on hierarchical children; points at the parent's `id`.
    pub parent_id: Option<String>,
    /// 0 for parents, 1 for children; `None` outside hierarchical chunking.
    pub level: Option<u8>,
}

impl Chunk {
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.content.len()
    }

    /// Convert into a plain unit, recording chunk attributes as metadata.
    #[must_use]
    pub fn into_unit(self) -> TextUnit {
        let char_len = self.char_len();
        let byte_len = self.byte_len();
        let mut unit = TextUnit {
            content: self.content,
            metadata: self.metadata,
        }
        .with_metadata("chunk_index", self.index)
        .with_metadata("chunk_total", self.total)
        .with_metadata("chunk_chars", char_len)
        .with_metadata("chunk_bytes", byte_len)
        .with_metadata("chunk_method", self.method.as_str());
        if let Some(id) = self.id {
            unit = unit.with_metadata("chunk_id", id);
        }
        if let Some(parent) = self.parent_id {
            unit = unit.with_metadata("parent_id", parent);
        }
        if let Some(level) = self.level {
            unit = unit.with_metadata("chunk_level", i64::from(level));
        }
        unit
    }
}

pub(crate) fn build_chunks(source: &TextUnit, pieces: Vec<String>, method: ChunkMethod) -> Vec<Chunk> {
    let total = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, content)| Chunk {
            content,
            metadata: source.metadata.clone(),
            index,
            total,
            method,
            id: None,
            parent_id: None,
            level: None,
        })
        .collect()
}
