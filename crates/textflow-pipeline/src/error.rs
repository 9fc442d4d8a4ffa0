use std::time::Duration;

use textflow_chunk::ChunkError;
use textflow_transform::TransformError;
use textflow_version::VersionError;

use crate::extract::ExtractError;
use crate::loader::LoaderError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("invalid pipeline: {0}")]
    Validation(String),

    #[error("no {kind} registered under {name:?}")]
    UnknownCollaborator { kind: &'static str, name: String },

    #[error("stage {stage} failed: {message}")]
    StageExecution {
        stage: String,
        duration: Duration,
        message: String,
    },

    #[error("stage {stage} timed out after {timeout:?}")]
    Timeout { stage: String, timeout: Duration },

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("{0}")]
    Custom(String),

    #[error("engine state lock poisoned")]
    LockPoisoned,
}

impl PipelineError {
    /// Configuration and cancellation errors are not worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Cancelled
                | Self::Validation(_)
                | Self::UnknownCollaborator { .. }
                | Self::PipelineNotFound(_)
                | Self::Chunk(_)
                | Self::Version(VersionError::VersioningDisabled)
        )
    }
}
