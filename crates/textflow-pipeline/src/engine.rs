use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use textflow_chunk::Chunker;
use textflow_core::{Backoff, RetryPolicy, TextUnit, merge_parallel_outputs};
use textflow_transform::{ChainComposer, ComposedChain, ExecuteOptions};
use textflow_version::{ChangeMeta, Version, VersionPolicy, VersionStore};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::definition::{PipelineDefinition, Stage, StageAction};
use crate::error::PipelineError;
use crate::events::PipelineEvent;
use crate::extract::{MetadataExtractor, StatsExtractor, extract_batched};
use crate::handler::{HandlerContext, StageContext, StageHandler, StageObserver};
use crate::history::{DEFAULT_HISTORY_LIMIT, ExecutionHistory, ExecutionRecord, PipelineMetrics};
use crate::loader::{DocumentLoader, TextLoader};
use crate::result::{ExecutionResult, StageOutcome};
use crate::state::{RunState, RunStatus};

const EVENT_CAPACITY: usize = 256;

/// Engine-wide knobs, usually built from [`crate::config::EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub history_limit: usize,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub backoff: Backoff,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            batch_size: 10,
            batch_delay: Duration::from_millis(100),
            backoff: Backoff::default(),
        }
    }
}

struct ActiveRun {
    state: RunState,
    cancel: CancellationToken,
}

struct StageOutput {
    units: Vec<TextUnit>,
    versions: Vec<Version>,
}

impl StageOutput {
    fn units(units: Vec<TextUnit>) -> Self {
        Self {
            units,
            versions: Vec::new(),
        }
    }
}

struct StageRun {
    outcome: StageOutcome,
    result: Result<StageOutput, PipelineError>,
}

struct RunOutcome {
    result: ExecutionResult,
    aborted: bool,
}

/// Registry of pipeline definitions and collaborators, and the executor for runs.
///
/// One instance is meant to live for the whole process. Definitions and collaborators
/// are registered at startup and read by every run.
pub struct PipelineEngine {
    pipelines: RwLock<HashMap<String, Arc<PipelineDefinition>>>,
    composer: Arc<ChainComposer>,
    chunker: Chunker,
    versions: Arc<VersionStore>,
    loaders: RwLock<HashMap<String, Arc<dyn DocumentLoader>>>,
    extractors: RwLock<HashMap<String, Arc<dyn MetadataExtractor>>>,
    handlers: RwLock<HashMap<String, Arc<dyn StageHandler>>>,
    observers: RwLock<Vec<Arc<dyn StageObserver>>>,
    runs: Mutex<HashMap<Uuid, ActiveRun>>,
    history: Mutex<ExecutionHistory>,
    events: broadcast::Sender<PipelineEvent>,
    metrics: watch::Sender<PipelineMetrics>,
    settings: EngineSettings,
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("pipelines", &self.pipeline_names())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for PipelineEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl PipelineEngine {
    /// Engine with the built-in transforms, the text loader and the stats extractor.
    #[must_use]
    pub fn new(settings: EngineSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (metrics, _) = watch::channel(PipelineMetrics::default());

        let mut loaders: HashMap<String, Arc<dyn DocumentLoader>> = HashMap::new();
        loaders.insert("text".into(), Arc::new(TextLoader::default()));
        let mut extractors: HashMap<String, Arc<dyn MetadataExtractor>> = HashMap::new();
        extractors.insert("stats".into(), Arc::new(StatsExtractor));

        Self {
            pipelines: RwLock::new(HashMap::new()),
            composer: Arc::new(ChainComposer::with_builtins()),
            chunker: Chunker::new(),
            versions: Arc::new(VersionStore::new()),
            loaders: RwLock::new(loaders),
            extractors: RwLock::new(extractors),
            handlers: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
            runs: Mutex::new(HashMap::new()),
            history: Mutex::new(ExecutionHistory::new(settings.history_limit)),
            events,
            metrics,
            settings,
        }
    }

    #[must_use]
    pub fn with_composer(mut self, composer: Arc<ChainComposer>) -> Self {
        self.composer = composer;
        self
    }

    #[must_use]
    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    #[must_use]
    pub fn with_version_store(mut self, store: Arc<VersionStore>) -> Self {
        self.versions = store;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn composer(&self) -> &Arc<ChainComposer> {
        &self.composer
    }

    #[must_use]
    pub fn version_store(&self) -> &Arc<VersionStore> {
        &self.versions
    }

    /// Validate and register `definition`, replacing any pipeline of the same name.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` if the definition is invalid.
    pub fn register_pipeline(&self, definition: PipelineDefinition) -> Result<(), PipelineError> {
        definition.validate()?;
        let name = definition.name.clone();
        let stages = definition.stages.len();
        let replaced = self
            .pipelines
            .write()
            .map_err(|_| PipelineError::LockPoisoned)?
            .insert(name.clone(), Arc::new(definition))
            .is_some();
        tracing::debug!(pipeline = %name, stages, replaced, "registered pipeline");
        Ok(())
    }

    #[must_use]
    pub fn pipeline(&self, name: &str) -> Option<Arc<PipelineDefinition>> {
        self.pipelines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    #[must_use]
    pub fn pipeline_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .pipelines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn unregister_pipeline(&self, name: &str) -> bool {
        self.pipelines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Register a loader under its own name.
    pub fn register_loader(&self, loader: Arc<dyn DocumentLoader>) {
        let name = loader.name().to_owned();
        self.loaders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, loader);
    }

    /// Register an extractor under its own name.
    pub fn register_extractor(&self, extractor: Arc<dyn MetadataExtractor>) {
        let name = extractor.name().to_owned();
        self.extractors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, extractor);
    }

    pub fn register_handler(&self, name: impl Into<String>, handler: Arc<dyn StageHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), handler);
    }

    pub fn add_observer(&self, observer: Arc<dyn StageObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Aggregate metrics over the whole history, refreshed after every run.
    #[must_use]
    pub fn subscribe_metrics(&self) -> watch::Receiver<PipelineMetrics> {
        self.metrics.subscribe()
    }

    #[must_use]
    pub fn metrics(&self, pipeline: Option<&str>) -> PipelineMetrics {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .metrics(pipeline)
    }

    /// Finished runs, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// State of a run that has not finished yet.
    #[must_use]
    pub fn run_state(&self, run_id: Uuid) -> Option<RunState> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&run_id)
            .map(|run| run.state.clone())
    }

    #[must_use]
    pub fn active_runs(&self) -> Vec<RunState> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|run| run.state.clone())
            .collect()
    }

    /// Move a running run to `cancelled` and stop its in-flight stage. Returns false,
    /// changing nothing, when the run is unknown or not running.
    pub fn cancel_pipeline(&self, run_id: Uuid) -> bool {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        match runs.get_mut(&run_id) {
            Some(run) => {
                if !run.state.transition(RunStatus::Cancelled) {
                    return false;
                }
                run.cancel.cancel();
                tracing::info!(run_id = %run_id, pipeline = %run.state.pipeline, "run cancelled");
                self.emit(PipelineEvent::RunCancelled { run_id });
                true
            }
            None => false,
        }
    }

    /// Run the pipeline registered as `name` over `units`.
    ///
    /// Stage failures never surface as `Err`: they are recorded in the result, which is
    /// marked unsuccessful when the run aborted. When an aborted pipeline names a
    /// fallback, the fallback runs once on the original `units` and its result is
    /// returned instead.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::PipelineNotFound` if no pipeline is registered as `name`.
    pub async fn execute_pipeline(
        &self,
        name: &str,
        units: Vec<TextUnit>,
    ) -> Result<ExecutionResult, PipelineError> {
        let definition = self
            .pipeline(name)
            .ok_or_else(|| PipelineError::PipelineNotFound(name.to_owned()))?;

        let primary = self.run_definition(&definition, &units).await?;
        if !primary.aborted {
            return Ok(primary.result);
        }
        let Some(fallback_name) = definition.fallback() else {
            return Ok(primary.result);
        };
        let Some(fallback) = self.pipeline(fallback_name) else {
            tracing::warn!(
                pipeline = %definition.name,
                fallback = fallback_name,
                "fallback pipeline not registered"
            );
            return Ok(primary.result);
        };

        tracing::info!(
            pipeline = %definition.name,
            fallback = %fallback.name,
            run_id = %primary.result.run_id,
            "running fallback pipeline"
        );
        self.emit(PipelineEvent::FallbackTriggered {
            run_id: primary.result.run_id,
            pipeline: definition.name.clone(),
            fallback: fallback.name.clone(),
        });

        let mut result = self.run_definition(&fallback, &units).await?.result;
        result.fallback_from = Some(definition.name.clone());
        Ok(result)
    }

    #[allow(clippy::too_many_lines)]
    async fn run_definition(
        &self,
        definition: &PipelineDefinition,
        input: &[TextUnit],
    ) -> Result<RunOutcome, PipelineError> {
        let mut state = RunState::new(&definition.name);
        let run_id = state.run_id;
        let started_at = state.started_at;
        let cancel = CancellationToken::new();
        state.transition(RunStatus::Running);
        state.documents_processed = input.len();
        self.runs
            .lock()
            .map_err(|_| PipelineError::LockPoisoned)?
            .insert(
                run_id,
                ActiveRun {
                    state,
                    cancel: cancel.clone(),
                },
            );

        tracing::info!(pipeline = %definition.name, run_id = %run_id, units = input.len(), "pipeline run started");
        self.emit(PipelineEvent::RunStarted {
            run_id,
            pipeline: definition.name.clone(),
        });

        let groups = definition.stage_groups();
        let total: usize = groups.iter().map(Vec::len).sum();
        let mut done = 0usize;
        let mut working = input.to_vec();
        let mut stages = Vec::with_capacity(total);
        let mut errors = Vec::new();
        let mut versions = Vec::new();
        let mut aborted = false;

        for group in &groups {
            if cancel.is_cancelled() {
                break;
            }
            let runs = futures::future::join_all(
                group
                    .iter()
                    .map(|stage| self.run_stage(definition, stage, working.clone(), run_id, &cancel)),
            )
            .await;

            let mut outputs = Vec::with_capacity(runs.len());
            for (stage, run) in group.iter().zip(runs) {
                done += 1;
                match run.result {
                    Ok(output) => {
                        versions.extend(output.versions);
                        outputs.push(output.units);
                    }
                    Err(PipelineError::Cancelled) => {}
                    Err(_) => {
                        if let Some(error) = run.outcome.to_error() {
                            errors.push(error.to_string());
                        }
                        if definition.error_policy.stop_on_error && !stage.continue_on_error {
                            aborted = true;
                        }
                    }
                }
                stages.push(run.outcome);
            }

            if aborted || cancel.is_cancelled() {
                self.update_run(run_id, |s| s.errors.clone_from(&errors));
                break;
            }
            if group.len() == 1 {
                if let Some(output) = outputs.pop() {
                    working = output;
                }
            } else {
                working = merge_parallel_outputs(&working, outputs);
            }

            let progress = u8::try_from(done * 100 / total.max(1)).unwrap_or(100);
            let count = working.len();
            self.update_run(run_id, |s| {
                s.progress = progress;
                s.documents_processed = count;
                s.errors.clone_from(&errors);
            });
        }

        if !aborted
            && !cancel.is_cancelled()
            && let Some(policy) = definition.versioning.as_ref().filter(|p| p.enabled)
        {
            let reason = format!("pipeline {}", definition.name);
            match self.snapshot(&working, policy, &reason) {
                Ok(created) => versions.extend(created),
                Err(e) => {
                    tracing::warn!(pipeline = %definition.name, run_id = %run_id, "versioning failed: {e}");
                    errors.push(format!("versioning failed: {e}"));
                    aborted = definition.error_policy.stop_on_error;
                }
            }
        }

        let computed = if cancel.is_cancelled() {
            RunStatus::Cancelled
        } else if aborted {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        let status = self.finish_run(run_id, computed);

        let result = ExecutionResult {
            run_id,
            pipeline_name: definition.name.clone(),
            started_at,
            finished_at: Utc::now(),
            success: status == RunStatus::Completed,
            status,
            stages,
            errors,
            units: working,
            versions,
            fallback_from: None,
        };
        self.record(&result);

        tracing::info!(
            pipeline = %definition.name,
            run_id = %run_id,
            status = %status,
            stages = result.stages.len(),
            errors = result.errors.len(),
            duration_ms = u64::try_from(result.duration().as_millis()).unwrap_or(u64::MAX),
            "pipeline run finished"
        );
        self.emit(PipelineEvent::RunFinished {
            run_id,
            pipeline: definition.name.clone(),
            status,
            success: result.success,
        });

        Ok(RunOutcome { result, aborted })
    }

    async fn run_stage(
        &self,
        definition: &PipelineDefinition,
        stage: &Stage,
        units: Vec<TextUnit>,
        run_id: Uuid,
        cancel: &CancellationToken,
    ) -> StageRun {
        let started = Instant::now();
        self.update_run(run_id, |s| s.current_stage = Some(stage.name.clone()));
        tracing::debug!(pipeline = %definition.name, stage = %stage.name, run_id = %run_id, kind = %stage.kind(), "stage started");
        self.emit(PipelineEvent::StageStarted {
            run_id,
            stage: stage.name.clone(),
        });

        let policy = self.retry_policy(definition, stage);
        let units = &units;
        let result = policy
            .run_until(
                move |attempt| self.attempt_stage(definition, stage, units, run_id, attempt, cancel),
                PipelineError::is_retryable,
                |attempt, error: &PipelineError, delay: Duration| {
                    self.emit(PipelineEvent::StageRetrying {
                        run_id,
                        stage: stage.name.clone(),
                        attempt,
                        delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error: error.to_string(),
                    });
                },
                cancel.cancelled(),
            )
            .await;

        let duration = started.elapsed();
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let (attempts, result) = match result {
            Ok((output, attempts)) => (attempts, Ok(output)),
            Err(e) if cancel.is_cancelled() => (e.attempts(), Err(PipelineError::Cancelled)),
            Err(e) => (e.attempts(), Err(e.into_inner())),
        };

        let outcome = match &result {
            Ok(output) => {
                tracing::debug!(stage = %stage.name, run_id = %run_id, attempts, duration_ms, "stage completed");
                self.emit(PipelineEvent::StageCompleted {
                    run_id,
                    stage: stage.name.clone(),
                    duration_ms,
                    output_count: output.units.len(),
                });
                StageOutcome {
                    stage: stage.name.clone(),
                    kind: stage.kind(),
                    success: true,
                    duration_ms,
                    error: None,
                    output_count: output.units.len(),
                    attempts,
                }
            }
            Err(error) => {
                tracing::warn!(
                    pipeline = %definition.name,
                    stage = %stage.name,
                    run_id = %run_id,
                    attempts,
                    "stage failed: {error}"
                );
                self.emit(PipelineEvent::StageFailed {
                    run_id,
                    stage: stage.name.clone(),
                    error: error.to_string(),
                });
                StageOutcome {
                    stage: stage.name.clone(),
                    kind: stage.kind(),
                    success: false,
                    duration_ms,
                    error: Some(error.to_string()),
                    output_count: 0,
                    attempts,
                }
            }
        };

        StageRun { outcome, result }
    }

    fn retry_policy(&self, definition: &PipelineDefinition, stage: &Stage) -> RetryPolicy {
        let attempts = stage
            .retries
            .or(definition.error_policy.max_retries)
            .unwrap_or(1);
        let backoff = match definition.error_policy.retry_base_ms {
            Some(ms) => Backoff {
                base: Duration::from_millis(ms),
                ..self.settings.backoff
            },
            None => self.settings.backoff,
        };
        RetryPolicy::new(attempts, backoff)
    }

    async fn attempt_stage(
        &self,
        definition: &PipelineDefinition,
        stage: &Stage,
        units: &[TextUnit],
        run_id: Uuid,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<StageOutput, PipelineError> {
        let ctx = StageContext {
            run_id,
            pipeline: &definition.name,
            stage: &stage.name,
            kind: stage.kind(),
            attempt: attempt + 1,
        };
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &observers {
            observer.before_stage(&ctx);
        }

        let started = Instant::now();
        let work = self.dispatch(definition, stage, units.to_vec(), run_id, cancel);
        let bounded = async {
            match stage.timeout() {
                Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
                    Err(PipelineError::Timeout {
                        stage: stage.name.clone(),
                        timeout: limit,
                    })
                }),
                None => work.await,
            }
        };
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = bounded => result,
        };

        let elapsed = started.elapsed();
        for observer in &observers {
            observer.after_stage(&ctx, result.as_ref().map(|o| o.units.len()), elapsed);
        }
        result
    }

    async fn dispatch(
        &self,
        definition: &PipelineDefinition,
        stage: &Stage,
        units: Vec<TextUnit>,
        run_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<StageOutput, PipelineError> {
        match &stage.action {
            StageAction::Load { loader, sources } => {
                let loader = lookup(&self.loaders, "loader", loader)?;
                let mut units = units;
                for source in sources {
                    let document = loader.load(source).await?;
                    tracing::debug!(stage = %stage.name, source = %source, units = document.units.len(), "loaded source");
                    units.extend(document.units);
                }
                Ok(StageOutput::units(units))
            }
            StageAction::Transform { chain, transforms } => {
                let composed = self.resolve_chain(chain.as_deref(), transforms)?;
                let label = chain.as_deref().unwrap_or(&stage.name);
                let opts = ExecuteOptions::default();
                let mut out = Vec::with_capacity(units.len());
                for unit in &units {
                    let outcome = ChainComposer::execute_chain(unit, label, &composed, &opts).await;
                    match outcome.error {
                        Some(error) => return Err(error.into()),
                        None => out.push(outcome.unit),
                    }
                }
                Ok(StageOutput::units(out))
            }
            StageAction::Chunk { chunking } => {
                let mut out = Vec::with_capacity(units.len());
                for unit in &units {
                    out.extend(self.chunker.chunk_units(unit, chunking)?);
                }
                tracing::debug!(stage = %stage.name, input = units.len(), chunks = out.len(), "chunked units");
                Ok(StageOutput::units(out))
            }
            StageAction::Extract { extractor, config } => {
                let extractor = lookup(&self.extractors, "extractor", extractor)?;
                let out = extract_batched(
                    extractor.as_ref(),
                    units,
                    config,
                    self.settings.batch_size,
                    self.settings.batch_delay,
                )
                .await?;
                Ok(StageOutput::units(out))
            }
            StageAction::Version { policy } => {
                let policy = policy
                    .clone()
                    .or_else(|| definition.versioning.clone())
                    .unwrap_or_else(VersionPolicy::enabled);
                let reason = format!("pipeline {} stage {}", definition.name, stage.name);
                let versions = self.snapshot(&units, &policy, &reason)?;
                Ok(StageOutput { units, versions })
            }
            StageAction::Custom { handler, config } => {
                let handler = lookup(&self.handlers, "handler", handler)?;
                let ctx = HandlerContext {
                    run_id,
                    stage: stage.name.clone(),
                    config: config.clone(),
                    cancel: cancel.clone(),
                };
                let out = handler.handle(units, &ctx).await?;
                Ok(StageOutput::units(out))
            }
        }
    }

    fn resolve_chain(
        &self,
        chain: Option<&str>,
        transforms: &[String],
    ) -> Result<ComposedChain, PipelineError> {
        match chain {
            Some(name) => self
                .composer
                .chain(name)
                .ok_or_else(|| PipelineError::UnknownCollaborator {
                    kind: "chain",
                    name: name.to_owned(),
                }),
            None => Ok(self.composer.compose(transforms)?),
        }
    }

    fn snapshot(
        &self,
        units: &[TextUnit],
        policy: &VersionPolicy,
        reason: &str,
    ) -> Result<Vec<Version>, PipelineError> {
        units
            .iter()
            .map(|unit| {
                self.versions
                    .create_version(unit, policy, ChangeMeta::reason(reason))
                    .map_err(PipelineError::from)
            })
            .collect()
    }

    fn update_run(&self, run_id: Uuid, f: impl FnOnce(&mut RunState)) {
        if let Some(run) = self
            .runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&run_id)
        {
            f(&mut run.state);
        }
    }

    /// Drop the run from the active table and settle its terminal status. A status set
    /// earlier by `cancel_pipeline` is kept.
    fn finish_run(&self, run_id: Uuid, status: RunStatus) -> RunStatus {
        let removed = self
            .runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&run_id);
        match removed {
            Some(mut run) => {
                run.state.transition(status);
                run.state.status
            }
            None => status,
        }
    }

    fn record(&self, result: &ExecutionResult) {
        let snapshot = {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push(ExecutionRecord::from(result));
            history.metrics(None)
        };
        self.metrics.send_modify(|m| *m = snapshot);
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn lookup<T: ?Sized>(
    registry: &RwLock<HashMap<String, Arc<T>>>,
    kind: &'static str,
    name: &str,
) -> Result<Arc<T>, PipelineError> {
    registry
        .read()
        .map_err(|_| PipelineError::LockPoisoned)?
        .get(name)
        .cloned()
        .ok_or_else(|| PipelineError::UnknownCollaborator {
            kind,
            name: name.to_owned(),
        })
}

#[cfg(test)]
mod tests;
