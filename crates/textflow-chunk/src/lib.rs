//! Text chunking: recursive, semantic, token-measured and hierarchical strategies.

pub mod chunker;
pub mod config;
pub mod error;
pub mod hierarchical;
pub mod length;
pub mod semantic;
pub mod splitter;
pub mod types;

pub use chunker::Chunker;
pub use config::{ChunkConfig, ChunkStrategy, HierarchicalConfig, SemanticConfig};
pub use error::ChunkError;
pub use hierarchical::{Hierarchy, HierarchicalSplitter};
pub use length::{CharLength, LengthFunction, TokenEstimate};
pub use semantic::SemanticSplitter;
pub use splitter::TextSplitter;
pub use types::{Chunk, ChunkMethod};
