use std::io::Write;

use serial_test::serial;
use textflow_core::TextUnit;

use super::*;

const ENV_KEYS: [&str; 5] = [
    "TEXTFLOW_HISTORY_LIMIT",
    "TEXTFLOW_BATCH_SIZE",
    "TEXTFLOW_BATCH_DELAY_MS",
    "TEXTFLOW_RETRY_BASE_MS",
    "TEXTFLOW_RETRY_MAX_MS",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

const FULL: &str = r#"
[engine]
history_limit = 20
batch_size = 4
batch_delay_ms = 0
retry_base_ms = 5
retry_max_ms = 50

[[chains]]
name = "clean"
transforms = ["normalize_line_endings", "normalize_whitespace", "trim"]

[[pipelines]]
name = "ingest"
description = "clean and split"

[pipelines.error_policy]
fallback_pipeline = "basic"

[[pipelines.stages]]
name = "clean"
kind = "transform"
chain = "clean"

[[pipelines.stages]]
name = "split"
kind = "chunk"

[pipelines.stages.chunking]
strategy = "recursive"
chunk_size = 100
chunk_overlap = 10

[[pipelines]]
name = "basic"

[[pipelines.stages]]
name = "trim"
kind = "transform"
transforms = ["trim"]
"#;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn missing_file_gives_defaults() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/textflow.toml")).unwrap();
    assert_eq!(config.engine, EngineConfig::default());
    assert_eq!(config.engine.history_limit, 100);
    assert_eq!(config.engine.batch_size, 10);
    assert!(config.pipelines.is_empty());
    config.validate().unwrap();
}

#[test]
#[serial]
fn parses_full_file() {
    clear_env();
    let file = write_config(FULL);
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.engine.history_limit, 20);
    assert_eq!(config.engine.batch_size, 4);
    assert_eq!(config.chains.len(), 1);
    assert_eq!(config.pipelines.len(), 2);
    assert_eq!(config.pipelines[0].fallback(), Some("basic"));
    config.validate().unwrap();

    let settings = config.settings();
    assert_eq!(settings.history_limit, 20);
    assert_eq!(settings.batch_delay, Duration::ZERO);
    assert_eq!(settings.backoff.base, Duration::from_millis(5));
    assert_eq!(settings.backoff.max, Duration::from_millis(50));
}

#[test]
#[serial]
fn malformed_file_is_an_error() {
    clear_env();
    let file = write_config("[engine\nhistory_limit = ");
    let err = Config::load(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    let file = write_config(FULL);
    unsafe {
        std::env::set_var("TEXTFLOW_HISTORY_LIMIT", "7");
        std::env::set_var("TEXTFLOW_BATCH_SIZE", " 3 ");
        std::env::set_var("TEXTFLOW_RETRY_MAX_MS", "900");
    }
    let config = Config::load(file.path()).unwrap();
    clear_env();
    assert_eq!(config.engine.history_limit, 7);
    assert_eq!(config.engine.batch_size, 3);
    assert_eq!(config.engine.retry_max_ms, 900);
    assert_eq!(config.engine.retry_base_ms, 5);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("TEXTFLOW_BATCH_SIZE", "lots");
        std::env::set_var("TEXTFLOW_BATCH_DELAY_MS", "-1");
    }
    let config = Config::load(Path::new("/nonexistent/textflow.toml")).unwrap();
    clear_env();
    assert_eq!(config.engine.batch_size, 10);
    assert_eq!(config.engine.batch_delay_ms, 100);
}

#[test]
fn zero_batch_size_rejected() {
    let mut config = Config::default();
    config.engine.batch_size = 0;
    assert!(config.validate().is_err());
    config.engine.batch_size = 1;
    config.engine.history_limit = 0;
    assert!(config.validate().is_err());
}

#[test]
fn unknown_fallback_rejected() {
    let mut config: Config = toml::from_str(FULL).unwrap();
    config.pipelines.retain(|p| p.name != "basic");
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("unknown pipeline basic"));
}

#[test]
fn duplicate_pipelines_rejected() {
    let mut config: Config = toml::from_str(FULL).unwrap();
    let copy = config.pipelines[1].clone();
    config.pipelines.push(copy);
    assert!(config.validate().unwrap_err().to_string().contains("duplicate pipeline"));
}

#[test]
fn invalid_chunking_rejected() {
    let broken = FULL.replace("chunk_overlap = 10", "chunk_overlap = 100");
    let config: Config = toml::from_str(&broken).unwrap();
    let err = config.validate().unwrap_err();
    assert!(format!("{err:#}").contains("invalid pipeline ingest"));
}

#[tokio::test]
async fn built_engine_runs_configured_pipeline() {
    let config: Config = toml::from_str(FULL).unwrap();
    let engine = config.build_engine().unwrap();
    assert_eq!(engine.pipeline_names(), vec!["basic", "ingest"]);
    assert_eq!(engine.composer().chain_names(), vec!["clean"]);

    let result = engine
        .execute_pipeline("ingest", vec![TextUnit::new("  one\r\ntwo   three  ")])
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.units.len(), 1);
    assert_eq!(result.units[0].content, "one\ntwo three");
}

#[test]
fn chain_of_unknown_transforms_fails_to_build() {
    let config: Config = toml::from_str(
        r#"
[[chains]]
name = "bogus"
transforms = ["does_not_exist"]
"#,
    )
    .unwrap();
    let err = config.build_engine().unwrap_err();
    assert!(err.to_string().contains("failed to register chain bogus"));
}
