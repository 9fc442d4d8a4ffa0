use std::sync::atomic::{AtomicU32, Ordering};

use textflow_chunk::{ChunkConfig, ChunkStrategy};
use textflow_core::{Metadata, MetadataValue};

use super::*;
use crate::BoxFuture;
use crate::definition::{ErrorPolicy, ExecutionMode};
use crate::handler::handler_fn;

fn fast_engine() -> PipelineEngine {
    PipelineEngine::new(EngineSettings {
        batch_delay: Duration::ZERO,
        backoff: Backoff::new(Duration::from_millis(1), Duration::from_millis(2)),
        ..EngineSettings::default()
    })
}

fn upper(units: Vec<TextUnit>, _: &HandlerContext) -> Result<Vec<TextUnit>, PipelineError> {
    Ok(units
        .into_iter()
        .map(|u| {
            let content = u.content.to_uppercase();
            u.with_content(content)
        })
        .collect())
}

fn boom(_: Vec<TextUnit>, _: &HandlerContext) -> Result<Vec<TextUnit>, PipelineError> {
    Err(PipelineError::Custom("boom".into()))
}

fn tagger(key: &'static str, value: &'static str) -> Arc<dyn StageHandler> {
    handler_fn(move |units: Vec<TextUnit>, _: &HandlerContext| {
        Ok(units
            .into_iter()
            .map(|u| u.with_metadata(key, value).with_metadata("k", value))
            .collect())
    })
}

fn engine_with_handlers() -> PipelineEngine {
    let engine = fast_engine();
    engine.register_handler("upper", handler_fn(upper));
    engine.register_handler("boom", handler_fn(boom));
    engine
}

/// Sleeps, then passes the units through. Leaves cancellation to the engine.
struct Sleepy(Duration);

impl StageHandler for Sleepy {
    fn handle<'a>(
        &'a self,
        units: Vec<TextUnit>,
        _ctx: &'a HandlerContext,
    ) -> BoxFuture<'a, Result<Vec<TextUnit>, PipelineError>> {
        Box::pin(async move {
            tokio::time::sleep(self.0).await;
            Ok(units)
        })
    }
}

#[derive(Default)]
struct CountingObserver {
    before: AtomicU32,
    after_ok: AtomicU32,
    after_err: AtomicU32,
}

impl StageObserver for CountingObserver {
    fn before_stage(&self, _ctx: &StageContext<'_>) {
        self.before.fetch_add(1, Ordering::SeqCst);
    }

    fn after_stage(&self, _ctx: &StageContext<'_>, result: Result<usize, &PipelineError>, _elapsed: Duration) {
        if result.is_ok() {
            self.after_ok.fetch_add(1, Ordering::SeqCst);
        } else {
            self.after_err.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn continue_policy() -> ErrorPolicy {
    ErrorPolicy {
        stop_on_error: false,
        ..ErrorPolicy::default()
    }
}

#[tokio::test]
async fn unknown_pipeline_is_an_error() {
    let engine = fast_engine();
    let err = engine.execute_pipeline("missing", Vec::new()).await.unwrap_err();
    assert!(matches!(err, PipelineError::PipelineNotFound(name) if name == "missing"));
}

#[test]
fn invalid_definition_is_rejected() {
    let engine = fast_engine();
    let def = PipelineDefinition::new("p")
        .stage(Stage::transform("a", ["trim"]))
        .stage(Stage::transform("a", ["trim"]));
    assert!(engine.register_pipeline(def).is_err());
    assert!(engine.pipeline_names().is_empty());
}

#[test]
fn registry_roundtrip() {
    let engine = fast_engine();
    engine
        .register_pipeline(PipelineDefinition::new("b").stage(Stage::transform("t", ["trim"])))
        .unwrap();
    engine
        .register_pipeline(PipelineDefinition::new("a").stage(Stage::transform("t", ["trim"])))
        .unwrap();
    assert_eq!(engine.pipeline_names(), vec!["a", "b"]);
    assert!(engine.pipeline("a").is_some());
    assert!(engine.unregister_pipeline("a"));
    assert!(!engine.unregister_pipeline("a"));
    assert_eq!(engine.pipeline_names(), vec!["b"]);
}

#[tokio::test]
async fn sequential_transform_then_chunk() {
    let engine = fast_engine();
    engine
        .register_pipeline(
            PipelineDefinition::new("ingest")
                .stage(Stage::transform("clean", ["normalize_whitespace", "trim"]))
                .stage(Stage::chunk("split", ChunkStrategy::Recursive(ChunkConfig::new(20, 0)))),
        )
        .unwrap();

    let input = vec![TextUnit::new("  alpha   beta gamma delta epsilon zeta eta theta  ")];
    let result = engine.execute_pipeline("ingest", input).await.unwrap();
    assert!(result.success);
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.pipeline_name, "ingest");
    assert!(result.errors.is_empty());
    assert_eq!(result.stages.len(), 2);
    assert!(result.units.len() > 1);
    assert!(result.units.iter().all(|u| u.char_len() <= 20));
    assert!(result.units[0].content.starts_with("alpha beta"));
    assert_eq!(result.stage("split").unwrap().output_count, result.units.len());
    assert!(engine.active_runs().is_empty());
}

#[tokio::test]
async fn continue_mode_keeps_pre_failure_units() {
    let engine = engine_with_handlers();
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .with_error_policy(continue_policy())
                .stage(Stage::custom("broken", "boom"))
                .stage(Stage::custom("shout", "upper")),
        )
        .unwrap();

    let result = engine
        .execute_pipeline("p", vec![TextUnit::new("hello")])
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.errors, vec!["stage broken failed: boom"]);
    assert_eq!(result.units[0].content, "HELLO");
    assert!(!result.stage("broken").unwrap().success);
    assert!(result.stage("shout").unwrap().success);
}

#[tokio::test]
async fn continue_on_error_stage_overrides_stop_policy() {
    let engine = engine_with_handlers();
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .stage(Stage::custom("broken", "boom").continue_on_error())
                .stage(Stage::custom("shout", "upper")),
        )
        .unwrap();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("a")]).await.unwrap();
    assert!(result.success);
    assert_eq!(result.units[0].content, "A");
    assert_eq!(result.errors.len(), 1);
}

#[tokio::test]
async fn disabled_stage_is_skipped() {
    let engine = engine_with_handlers();
    let observer = Arc::new(CountingObserver::default());
    engine.add_observer(observer.clone());
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .stage(Stage::custom("a", "boom").disabled().with_retries(5))
                .stage(Stage::custom("b", "upper")),
        )
        .unwrap();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("x")]).await.unwrap();
    assert_eq!(result.stages.len(), 1);
    assert_eq!(result.stages[0].stage, "b");
    assert_eq!(observer.before.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_on_error_aborts() {
    let engine = engine_with_handlers();
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .stage(Stage::custom("broken", "boom"))
                .stage(Stage::custom("shout", "upper")),
        )
        .unwrap();
    let input = vec![TextUnit::new("keep")];
    let result = engine.execute_pipeline("p", input.clone()).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.stages.len(), 1);
    assert_eq!(result.units, input);
    assert!(result.fallback_from.is_none());
}

#[tokio::test]
async fn fallback_runs_on_original_input() {
    let engine = engine_with_handlers();
    engine
        .register_pipeline(
            PipelineDefinition::new("primary")
                .with_error_policy(ErrorPolicy {
                    fallback_pipeline: Some("basic".into()),
                    ..ErrorPolicy::default()
                })
                .stage(Stage::transform("lower", ["lowercase"]))
                .stage(Stage::custom("broken", "boom")),
        )
        .unwrap();
    engine
        .register_pipeline(PipelineDefinition::new("basic").stage(Stage::custom("shout", "upper")))
        .unwrap();

    let mut events = engine.subscribe();
    let result = engine
        .execute_pipeline("primary", vec![TextUnit::new("MiXeD")])
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.pipeline_name, "basic");
    assert_eq!(result.fallback_from.as_deref(), Some("primary"));
    assert_eq!(result.units[0].content, "MIXED");

    let mut saw_fallback = false;
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::FallbackTriggered { pipeline, fallback, .. } = event {
            assert_eq!((pipeline.as_str(), fallback.as_str()), ("primary", "basic"));
            saw_fallback = true;
        }
    }
    assert!(saw_fallback);
    assert_eq!(engine.history().len(), 2);
}

#[tokio::test]
async fn fallback_takes_at_most_one_hop() {
    let engine = engine_with_handlers();
    for (name, fallback) in [("a", "b"), ("b", "a")] {
        engine
            .register_pipeline(
                PipelineDefinition::new(name)
                    .with_error_policy(ErrorPolicy {
                        fallback_pipeline: Some(fallback.into()),
                        ..ErrorPolicy::default()
                    })
                    .stage(Stage::custom("broken", "boom")),
            )
            .unwrap();
    }
    let result = engine.execute_pipeline("a", vec![TextUnit::new("x")]).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.pipeline_name, "b");
    assert_eq!(result.fallback_from.as_deref(), Some("a"));
    assert_eq!(engine.history().len(), 2);
}

#[tokio::test]
async fn unregistered_fallback_returns_primary_result() {
    let engine = engine_with_handlers();
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .with_error_policy(ErrorPolicy {
                    fallback_pipeline: Some("gone".into()),
                    ..ErrorPolicy::default()
                })
                .stage(Stage::custom("broken", "boom")),
        )
        .unwrap();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("x")]).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.pipeline_name, "p");
}

#[tokio::test]
async fn stage_retries_until_success() {
    let engine = fast_engine();
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    engine.register_handler(
        "flaky",
        handler_fn(move |units: Vec<TextUnit>, _: &HandlerContext| {
            if c.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(PipelineError::Custom("transient".into()))
            } else {
                Ok(units)
            }
        }),
    );
    engine
        .register_pipeline(PipelineDefinition::new("p").stage(Stage::custom("f", "flaky").with_retries(3)))
        .unwrap();

    let mut events = engine.subscribe();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("x")]).await.unwrap();
    assert!(result.success);
    assert_eq!(result.stages[0].attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let mut retries = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, PipelineEvent::StageRetrying { .. }) {
            retries += 1;
        }
    }
    assert_eq!(retries, 2);
}

#[tokio::test]
async fn pipeline_retry_budget_applies_to_stages() {
    let engine = engine_with_handlers();
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .with_error_policy(ErrorPolicy {
                    max_retries: Some(2),
                    ..ErrorPolicy::default()
                })
                .stage(Stage::custom("broken", "boom")),
        )
        .unwrap();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("x")]).await.unwrap();
    assert_eq!(result.stages[0].attempts, 2);
}

#[tokio::test]
async fn unknown_handler_is_not_retried() {
    let engine = fast_engine();
    engine
        .register_pipeline(PipelineDefinition::new("p").stage(Stage::custom("c", "nobody").with_retries(4)))
        .unwrap();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("x")]).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.stages[0].attempts, 1);
    assert!(result.errors[0].contains("nobody"));
}

#[tokio::test]
async fn disabled_versioning_is_not_retried() {
    let engine = fast_engine();
    engine
        .register_pipeline(
            PipelineDefinition::new("p").stage(
                Stage::new(
                    "snap",
                    StageAction::Version {
                        policy: Some(VersionPolicy::default()),
                    },
                )
                .with_retries(4),
            ),
        )
        .unwrap();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("x")]).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.stages[0].attempts, 1);
}

#[tokio::test]
async fn stage_timeout_fails_the_stage() {
    let engine = fast_engine();
    engine.register_handler("slow", Arc::new(Sleepy(Duration::from_secs(5))));
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .stage(Stage::custom("wait", "slow").with_timeout(Duration::from_millis(20))),
        )
        .unwrap();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("x")]).await.unwrap();
    assert!(!result.success);
    assert!(result.errors[0].contains("timed out"), "{:?}", result.errors);
}

#[tokio::test]
async fn cancel_stops_running_stage() {
    let engine = Arc::new(fast_engine());
    engine.register_handler("slow", Arc::new(Sleepy(Duration::from_secs(30))));
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .stage(Stage::custom("wait", "slow"))
                .stage(Stage::transform("never", ["trim"])),
        )
        .unwrap();

    let mut events = engine.subscribe();
    let runner = Arc::clone(&engine);
    let handle =
        tokio::spawn(async move { runner.execute_pipeline("p", vec![TextUnit::new("x")]).await });

    let run_id = loop {
        if let PipelineEvent::StageStarted { run_id, .. } = events.recv().await.unwrap() {
            break run_id;
        }
    };
    let state = engine.run_state(run_id).unwrap();
    assert_eq!(state.status, RunStatus::Running);
    assert_eq!(state.current_stage.as_deref(), Some("wait"));

    assert!(engine.cancel_pipeline(run_id));
    assert!(!engine.cancel_pipeline(run_id));

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(!result.success);
    assert_eq!(result.stages.len(), 1);
    assert!(engine.run_state(run_id).is_none());
    assert!(!engine.cancel_pipeline(run_id));
    assert_eq!(engine.metrics(None).cancelled_runs, 1);
}

#[tokio::test]
async fn cancel_cuts_retry_backoff_short() {
    let engine = Arc::new(PipelineEngine::new(EngineSettings {
        batch_delay: Duration::ZERO,
        backoff: Backoff::new(Duration::from_secs(30), Duration::from_secs(60)),
        ..EngineSettings::default()
    }));
    engine.register_handler("boom", handler_fn(boom));
    engine
        .register_pipeline(PipelineDefinition::new("p").stage(Stage::custom("broken", "boom").with_retries(3)))
        .unwrap();

    let mut events = engine.subscribe();
    let runner = Arc::clone(&engine);
    let handle =
        tokio::spawn(async move { runner.execute_pipeline("p", vec![TextUnit::new("x")]).await });

    let run_id = loop {
        if let PipelineEvent::StageRetrying { run_id, .. } = events.recv().await.unwrap() {
            break run_id;
        }
    };
    assert!(engine.cancel_pipeline(run_id));

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.stages[0].attempts, 1);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
}

#[test]
fn cancel_unknown_run_is_false() {
    assert!(!fast_engine().cancel_pipeline(Uuid::new_v4()));
}

#[tokio::test]
async fn parallel_stages_merge_metadata() {
    let engine = engine_with_handlers();
    engine.register_handler("tag_a", tagger("a", "from_a"));
    engine.register_handler("tag_b", tagger("b", "from_b"));
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .with_mode(ExecutionMode::Parallel)
                .stage(Stage::custom("first", "tag_a"))
                .stage(Stage::custom("shout", "upper"))
                .stage(Stage::custom("second", "tag_b")),
        )
        .unwrap();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("text")]).await.unwrap();
    assert!(result.success);
    assert_eq!(result.stages.len(), 3);
    let unit = &result.units[0];
    assert_eq!(unit.content, "TEXT");
    assert_eq!(unit.get("a").and_then(MetadataValue::as_str), Some("from_a"));
    assert_eq!(unit.get("b").and_then(MetadataValue::as_str), Some("from_b"));
    assert_eq!(unit.get("k").and_then(MetadataValue::as_str), Some("from_b"));
}

#[tokio::test]
async fn parallel_failure_contributes_nothing() {
    let engine = engine_with_handlers();
    engine.register_handler("tag_a", tagger("a", "x"));
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .with_error_policy(continue_policy())
                .stage(Stage::custom("tag", "tag_a").parallel())
                .stage(Stage::custom("broken", "boom").parallel()),
        )
        .unwrap();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("t")]).await.unwrap();
    assert!(result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.units[0].get("a").and_then(MetadataValue::as_str), Some("x"));
}

#[tokio::test]
async fn history_is_bounded() {
    let engine = PipelineEngine::new(EngineSettings {
        history_limit: 3,
        ..EngineSettings::default()
    });
    engine
        .register_pipeline(PipelineDefinition::new("p").stage(Stage::transform("t", ["trim"])))
        .unwrap();
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(engine.execute_pipeline("p", vec![TextUnit::new(" x ")]).await.unwrap().run_id);
    }
    let history = engine.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].run_id, ids[2]);
    let metrics = engine.metrics(Some("p"));
    assert_eq!(metrics.total_runs, 3);
    assert_eq!(metrics.successful_runs, 3);
    assert!((metrics.average_documents_processed - 1.0).abs() < f64::EPSILON);
    assert_eq!(*engine.subscribe_metrics().borrow(), engine.metrics(None));
}

#[tokio::test]
async fn metrics_count_top_errors() {
    let engine = engine_with_handlers();
    engine
        .register_pipeline(PipelineDefinition::new("bad").stage(Stage::custom("broken", "boom")))
        .unwrap();
    engine
        .register_pipeline(PipelineDefinition::new("good").stage(Stage::custom("shout", "upper")))
        .unwrap();
    for _ in 0..2 {
        engine.execute_pipeline("bad", vec![TextUnit::new("x")]).await.unwrap();
    }
    engine.execute_pipeline("good", vec![TextUnit::new("x")]).await.unwrap();

    let all = engine.metrics(None);
    assert_eq!(all.total_runs, 3);
    assert_eq!(all.failed_runs, 2);
    assert_eq!(all.top_errors, vec![("stage broken failed: boom".to_owned(), 2)]);
    assert_eq!(engine.metrics(Some("good")).failed_runs, 0);
}

#[tokio::test]
async fn pipeline_versioning_snapshots_final_units() {
    let engine = fast_engine();
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .with_versioning(VersionPolicy::enabled())
                .stage(Stage::transform("t", ["trim"])),
        )
        .unwrap();
    let unit = TextUnit::new("  Version 1 ").with_metadata("document_id", "doc-1");
    let first = engine.execute_pipeline("p", vec![unit]).await.unwrap();
    assert_eq!(first.versions.len(), 1);
    assert_eq!(first.versions[0].unit.content, "Version 1");

    let unit = TextUnit::new("Version 2").with_metadata("document_id", "doc-1");
    engine.execute_pipeline("p", vec![unit]).await.unwrap();
    let versions = engine.version_store().list_versions("doc-1").unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].valid_to, Some(versions[1].valid_from));
}

#[tokio::test]
async fn version_stage_uses_own_policy() {
    let engine = fast_engine();
    engine
        .register_pipeline(PipelineDefinition::new("p").stage(Stage::new(
            "snap",
            StageAction::Version { policy: None },
        )))
        .unwrap();
    let result = engine
        .execute_pipeline("p", vec![TextUnit::new("a"), TextUnit::new("b")])
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.versions.len(), 2);
    assert_eq!(result.stage("snap").unwrap().kind, crate::definition::StageKind::Version);
}

#[tokio::test]
async fn extract_stage_adds_stats() {
    let engine = fast_engine();
    let mut config = Metadata::new();
    config.insert("prefix".into(), "s_".into());
    engine
        .register_pipeline(PipelineDefinition::new("p").stage(Stage::new(
            "stats",
            StageAction::Extract {
                extractor: "stats".into(),
                config,
            },
        )))
        .unwrap();
    let result = engine
        .execute_pipeline("p", vec![TextUnit::new("one two"), TextUnit::new("three")])
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.units[0].get("s_word_count").and_then(MetadataValue::as_i64), Some(2));
    assert_eq!(result.units[1].get("s_word_count").and_then(MetadataValue::as_i64), Some(1));
}

#[tokio::test]
async fn load_stage_appends_units() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("doc.md");
    std::fs::write(&file, "# Loaded").unwrap();

    let engine = fast_engine();
    engine
        .register_pipeline(PipelineDefinition::new("p").stage(Stage::new(
            "load",
            StageAction::Load {
                loader: "text".into(),
                sources: vec![file.to_string_lossy().into_owned()],
            },
        )))
        .unwrap();
    let result = engine
        .execute_pipeline("p", vec![TextUnit::new("given")])
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.units.len(), 2);
    assert_eq!(result.units[1].content, "# Loaded");
    assert_eq!(result.units[1].get("format").and_then(MetadataValue::as_str), Some("markdown"));
}

#[tokio::test]
async fn transform_stage_uses_registered_chain() {
    let engine = fast_engine();
    engine
        .composer()
        .register_chain("clean", &["trim", "lowercase"])
        .unwrap();
    engine
        .register_pipeline(PipelineDefinition::new("p").stage(Stage::new(
            "clean",
            StageAction::Transform {
                chain: Some("clean".into()),
                transforms: Vec::new(),
            },
        )))
        .unwrap();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("  HeLLo ")]).await.unwrap();
    assert_eq!(result.units[0].content, "hello");
}

#[tokio::test]
async fn observer_sees_every_attempt() {
    let engine = engine_with_handlers();
    let observer = Arc::new(CountingObserver::default());
    engine.add_observer(observer.clone());
    engine
        .register_pipeline(
            PipelineDefinition::new("p")
                .with_error_policy(continue_policy())
                .stage(Stage::custom("broken", "boom").with_retries(2))
                .stage(Stage::custom("shout", "upper")),
        )
        .unwrap();
    engine.execute_pipeline("p", vec![TextUnit::new("x")]).await.unwrap();
    assert_eq!(observer.before.load(Ordering::SeqCst), 3);
    assert_eq!(observer.after_err.load(Ordering::SeqCst), 2);
    assert_eq!(observer.after_ok.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn run_lifecycle_events_in_order() {
    let engine = engine_with_handlers();
    engine
        .register_pipeline(PipelineDefinition::new("p").stage(Stage::custom("shout", "upper")))
        .unwrap();
    let mut events = engine.subscribe();
    let result = engine.execute_pipeline("p", vec![TextUnit::new("x")]).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.run_id(), result.run_id);
        seen.push(serde_json::to_value(&event).unwrap()["event"].as_str().unwrap().to_owned());
    }
    assert_eq!(seen, ["run_started", "stage_started", "stage_completed", "run_finished"]);
}
