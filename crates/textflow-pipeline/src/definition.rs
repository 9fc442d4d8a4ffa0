use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use textflow_chunk::ChunkStrategy;
use textflow_core::Metadata;
use textflow_version::VersionPolicy;

use crate::error::PipelineError;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    /// Every enabled stage runs on the input and outputs are merged.
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorPolicy {
    #[serde(default = "default_true")]
    pub stop_on_error: bool,
    /// Attempt budget for stages without their own `retries`.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Base delay of the retry backoff; the engine default applies when unset.
    #[serde(default)]
    pub retry_base_ms: Option<u64>,
    #[serde(default)]
    pub fallback_pipeline: Option<String>,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            max_retries: None,
            retry_base_ms: None,
            fallback_pipeline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Load,
    Transform,
    Chunk,
    Extract,
    Version,
    Custom,
}

impl StageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Transform => "transform",
            Self::Chunk => "chunk",
            Self::Extract => "extract",
            Self::Version => "version",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific stage configuration, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StageAction {
    /// Load `sources` with a registered loader and append the units.
    Load {
        #[serde(default = "default_loader")]
        loader: String,
        #[serde(default)]
        sources: Vec<String>,
    },
    /// Run a registered chain, or an inline list of transforms.
    Transform {
        #[serde(default)]
        chain: Option<String>,
        #[serde(default)]
        transforms: Vec<String>,
    },
    /// Replace every unit with its chunks.
    Chunk {
        #[serde(default)]
        chunking: ChunkStrategy,
    },
    /// Merge metadata produced by a registered extractor.
    Extract {
        #[serde(default = "default_extractor")]
        extractor: String,
        #[serde(default)]
        config: Metadata,
    },
    /// Snapshot units into the version store. Falls back to the pipeline policy.
    Version {
        #[serde(default)]
        policy: Option<VersionPolicy>,
    },
    /// Call a registered stage handler.
    Custom {
        handler: String,
        #[serde(default)]
        config: Metadata,
    },
}

fn default_loader() -> String {
    "text".into()
}

fn default_extractor() -> String {
    "stats".into()
}

impl StageAction {
    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Load { .. } => StageKind::Load,
            Self::Transform { .. } => StageKind::Transform,
            Self::Chunk { .. } => StageKind::Chunk,
            Self::Extract { .. } => StageKind::Extract,
            Self::Version { .. } => StageKind::Version,
            Self::Custom { .. } => StageKind::Custom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Stage {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Attempt budget override.
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Keep going after this stage fails even when the pipeline stops on errors.
    #[serde(default)]
    pub continue_on_error: bool,
    /// Consecutive parallel stages run concurrently on the same input.
    #[serde(default)]
    pub parallel: bool,
    #[serde(flatten)]
    pub action: StageAction,
}

impl Stage {
    #[must_use]
    pub fn new(name: impl Into<String>, action: StageAction) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            retries: None,
            timeout_ms: None,
            continue_on_error: false,
            parallel: false,
            action,
        }
    }

    #[must_use]
    pub fn transform<S: Into<String>>(name: impl Into<String>, transforms: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            name,
            StageAction::Transform {
                chain: None,
                transforms: transforms.into_iter().map(Into::into).collect(),
            },
        )
    }

    #[must_use]
    pub fn chunk(name: impl Into<String>, chunking: ChunkStrategy) -> Self {
        Self::new(name, StageAction::Chunk { chunking })
    }

    #[must_use]
    pub fn custom(name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(
            name,
            StageAction::Custom {
                handler: handler.into(),
                config: Metadata::new(),
            },
        )
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, attempts: u32) -> Self {
        self.retries = Some(attempts);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    #[must_use]
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.action.kind()
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub versioning: Option<VersionPolicy>,
}

impl PipelineDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            stages: Vec::new(),
            mode: ExecutionMode::default(),
            error_policy: ErrorPolicy::default(),
            versioning: None,
        }
    }

    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    #[must_use]
    pub fn with_versioning(mut self, policy: VersionPolicy) -> Self {
        self.versioning = Some(policy);
        self
    }

    #[must_use]
    pub fn fallback(&self) -> Option<&str> {
        self.error_policy.fallback_pipeline.as_deref()
    }

    /// Enabled stages grouped for execution. Each group runs concurrently; groups run
    /// in order.
    #[must_use]
    pub fn stage_groups(&self) -> Vec<Vec<&Stage>> {
        let enabled = self.stages.iter().filter(|s| s.enabled);
        if self.mode == ExecutionMode::Parallel {
            let all: Vec<&Stage> = enabled.collect();
            return if all.is_empty() { Vec::new() } else { vec![all] };
        }

        let mut groups: Vec<Vec<&Stage>> = Vec::new();
        let mut open_parallel = false;
        for stage in enabled {
            if stage.parallel
                && open_parallel
                && let Some(group) = groups.last_mut()
            {
                group.push(stage);
            } else {
                groups.push(vec![stage]);
            }
            open_parallel = stage.parallel;
        }
        groups
    }

    /// # Errors
    ///
    /// Returns `PipelineError::Validation` for an empty name, empty or duplicate stage
    /// names, a self-referencing fallback or an invalid chunking config.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::Validation("pipeline name is empty".into()));
        }
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(PipelineError::Validation(format!(
                    "pipeline {}: stage name is empty",
                    self.name
                )));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(PipelineError::Validation(format!(
                    "pipeline {}: duplicate stage {}",
                    self.name, stage.name
                )));
            }
            match &stage.action {
                StageAction::Chunk { chunking } => chunking.validate().map_err(|e| {
                    PipelineError::Validation(format!("stage {}: {e}", stage.name))
                })?,
                StageAction::Transform { chain: None, transforms } if transforms.is_empty() => {
                    return Err(PipelineError::Validation(format!(
                        "stage {}: transform stage needs a chain or transforms",
                        stage.name
                    )));
                }
                _ => {}
            }
        }
        if self.fallback() == Some(self.name.as_str()) {
            return Err(PipelineError::Validation(format!(
                "pipeline {} falls back to itself",
                self.name
            )));
        }
        Ok(())
    }
}
