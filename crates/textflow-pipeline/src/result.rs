use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use textflow_core::TextUnit;
use textflow_version::Version;
use uuid::Uuid;

use crate::definition::StageKind;
use crate::error::PipelineError;
use crate::state::RunStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome {
    pub stage: String,
    pub kind: StageKind,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub output_count: usize,
    pub attempts: u32,
}

impl StageOutcome {
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// The failure as a stage execution error, if the stage failed.
    #[must_use]
    pub fn to_error(&self) -> Option<PipelineError> {
        self.error.as_ref().map(|message| PipelineError::StageExecution {
            stage: self.stage.clone(),
            duration: self.duration(),
            message: message.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub status: RunStatus,
    pub stages: Vec<StageOutcome>,
    pub errors: Vec<String>,
    pub units: Vec<TextUnit>,
    pub versions: Vec<Version>,
    /// The primary pipeline when this result came from its fallback.
    pub fallback_from: Option<String>,
}

impl ExecutionResult {
    #[must_use]
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at).to_std().unwrap_or_default()
    }

    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.stage == name)
    }
}
