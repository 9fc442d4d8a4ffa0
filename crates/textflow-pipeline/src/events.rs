use serde::Serialize;
use uuid::Uuid;

use crate::state::RunStatus;

/// Lifecycle notifications broadcast by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        run_id: Uuid,
        pipeline: String,
    },
    StageStarted {
        run_id: Uuid,
        stage: String,
    },
    StageRetrying {
        run_id: Uuid,
        stage: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    StageCompleted {
        run_id: Uuid,
        stage: String,
        duration_ms: u64,
        output_count: usize,
    },
    StageFailed {
        run_id: Uuid,
        stage: String,
        error: String,
    },
    FallbackTriggered {
        run_id: Uuid,
        pipeline: String,
        fallback: String,
    },
    RunCancelled {
        run_id: Uuid,
    },
    RunFinished {
        run_id: Uuid,
        pipeline: String,
        status: RunStatus,
        success: bool,
    },
}

impl PipelineEvent {
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StageStarted { run_id, .. }
            | Self::StageRetrying { run_id, .. }
            | Self::StageCompleted { run_id, .. }
            | Self::StageFailed { run_id, .. }
            | Self::FallbackTriggered { run_id, .. }
            | Self::RunCancelled { run_id }
            | Self::RunFinished { run_id, .. } => *run_id,
        }
    }
}
