//! Declarative staged pipelines over text units: registry, retrying executor with
//! fallback and cancellation, run history, and the collaborator contracts (loaders,
//! extractors, vector stores) the stages plug into.

pub mod config;
pub mod definition;
pub mod engine;
pub mod error;
pub mod events;
pub mod extract;
pub mod handler;
pub mod history;
pub mod index;
pub mod loader;
pub mod result;
pub mod state;

use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use config::{ChainConfig, Config, EngineConfig};
pub use definition::{ErrorPolicy, ExecutionMode, PipelineDefinition, Stage, StageAction, StageKind};
pub use engine::{EngineSettings, PipelineEngine};
pub use error::PipelineError;
pub use events::PipelineEvent;
pub use extract::{ExtractError, MetadataExtractor, StatsExtractor, extract_batched};
pub use handler::{HandlerContext, StageContext, StageHandler, StageObserver, handler_fn};
pub use history::{ExecutionHistory, ExecutionRecord, PipelineMetrics};
pub use index::{BatchIndexer, CollectionInfo, IndexReport, ScoredUnit, VectorStore, VectorStoreError};
pub use loader::{DocumentLoader, LoadedDocument, LoaderError, TextLoader, ValidationReport};
pub use result::{ExecutionResult, StageOutcome};
pub use state::{RunState, RunStatus};
