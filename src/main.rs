use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use textflow_chunk::{ChunkConfig, ChunkStrategy, Chunker, HierarchicalConfig, SemanticConfig};
use textflow_core::TextUnit;
use textflow_pipeline::{Config, DocumentLoader, ExecutionResult, PipelineEngine, TextLoader};

#[derive(Parser)]
#[command(name = "textflow")]
#[command(about = "Normalize, chunk and version documents through declarative pipelines")]
#[command(version)]
struct Cli {
    /// Config file (default: $TEXTFLOW_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a configured pipeline over files and print a JSON summary
    Run {
        pipeline: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Include the output units in the summary
        #[arg(long)]
        units: bool,
    },

    /// List configured pipelines and their stages
    Pipelines,

    /// Load and validate the config
    Validate,

    /// Chunk a file and print the chunks as JSON
    Chunk {
        file: PathBuf,

        #[arg(long, default_value_t = 1000)]
        size: usize,

        #[arg(long, default_value_t = 200)]
        overlap: usize,

        #[arg(long, value_enum, default_value_t = StrategyArg::Recursive)]
        strategy: StrategyArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Recursive,
    Token,
    Semantic,
    Hierarchical,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Command::Run {
            pipeline,
            files,
            units,
        } => run_command(&config_path, pipeline, &files, units).await,
        Command::Pipelines => pipelines_command(&config_path),
        Command::Validate => validate_command(&config_path),
        Command::Chunk {
            file,
            size,
            overlap,
            strategy,
        } => chunk_command(&config_path, &file, strategy, size, overlap).await,
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if let Ok(path) = std::env::var("TEXTFLOW_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

async fn load_files(loader: &TextLoader, files: &[PathBuf]) -> anyhow::Result<Vec<TextUnit>> {
    let mut units = Vec::new();
    for file in files {
        let source = file.to_string_lossy();
        let document = loader
            .load(&source)
            .await
            .with_context(|| format!("failed to load {}", file.display()))?;
        units.extend(document.units);
    }
    Ok(units)
}

async fn run_command(
    config_path: &Path,
    pipeline: String,
    files: &[PathBuf],
    include_units: bool,
) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let engine = Arc::new(config.build_engine()?);
    let loader = TextLoader::new(config.engine.max_file_size);
    let units = load_files(&loader, files).await?;
    tracing::info!(pipeline = %pipeline, files = files.len(), units = units.len(), "starting run");

    let runner = Arc::clone(&engine);
    let mut handle = tokio::spawn(async move { runner.execute_pipeline(&pipeline, units).await });
    let finished = tokio::select! {
        joined = &mut handle => Some(joined),
        _ = tokio::signal::ctrl_c() => None,
    };
    let joined = match finished {
        Some(joined) => joined,
        None => {
            tracing::warn!("interrupted, cancelling active runs");
            cancel_all(&engine);
            handle.await
        }
    };
    let result = joined.context("pipeline task failed")??;

    println!("{}", serde_json::to_string_pretty(&summary(&result, include_units))?);
    if !result.success {
        bail!(
            "pipeline {} finished with status {}",
            result.pipeline_name,
            result.status
        );
    }
    Ok(())
}

fn cancel_all(engine: &PipelineEngine) {
    for run in engine.active_runs() {
        engine.cancel_pipeline(run.run_id);
    }
}

fn summary(result: &ExecutionResult, include_units: bool) -> serde_json::Value {
    let mut value = serde_json::json!({
        "run_id": result.run_id,
        "pipeline": result.pipeline_name,
        "fallback_from": result.fallback_from,
        "status": result.status,
        "success": result.success,
        "duration_ms": u64::try_from(result.duration().as_millis()).unwrap_or(u64::MAX),
        "stages": result.stages,
        "errors": result.errors,
        "unit_count": result.units.len(),
        "version_ids": result.versions.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(),
    });
    if include_units {
        value["units"] = serde_json::json!(result.units);
    }
    value
}

fn pipelines_command(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    if config.pipelines.is_empty() {
        println!("no pipelines configured in {}", config_path.display());
        return Ok(());
    }
    for pipeline in &config.pipelines {
        let mode = serde_json::to_value(pipeline.mode)?;
        println!("{} ({})", pipeline.name, mode.as_str().unwrap_or("sequential"));
        if let Some(description) = &pipeline.description {
            println!("  {description}");
        }
        for stage in &pipeline.stages {
            let mut flags = Vec::new();
            if !stage.enabled {
                flags.push("disabled");
            }
            if stage.parallel {
                flags.push("parallel");
            }
            if stage.continue_on_error {
                flags.push("continue-on-error");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            println!("  - {} ({}){flags}", stage.name, stage.kind());
        }
        if let Some(fallback) = pipeline.fallback() {
            println!("  fallback: {fallback}");
        }
    }
    Ok(())
}

fn validate_command(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    println!(
        "{}: ok ({} chains, {} pipelines)",
        config_path.display(),
        config.chains.len(),
        config.pipelines.len()
    );
    Ok(())
}

fn chunk_strategy(strategy: StrategyArg, size: usize, overlap: usize) -> ChunkStrategy {
    let base = ChunkConfig::new(size, overlap);
    match strategy {
        StrategyArg::Recursive => ChunkStrategy::Recursive(base),
        StrategyArg::Token => ChunkStrategy::Token(base),
        StrategyArg::Semantic => ChunkStrategy::Semantic(SemanticConfig {
            base,
            ..SemanticConfig::default()
        }),
        StrategyArg::Hierarchical => ChunkStrategy::Hierarchical(HierarchicalConfig {
            parent: ChunkConfig::new(size.saturating_mul(4), overlap),
            child: base,
            include_parents: true,
        }),
    }
}

async fn chunk_command(
    config_path: &Path,
    file: &Path,
    strategy: StrategyArg,
    size: usize,
    overlap: usize,
) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let strategy = chunk_strategy(strategy, size, overlap);
    strategy.validate().context("invalid chunking options")?;

    let loader = TextLoader::new(config.engine.max_file_size);
    let units = load_files(&loader, &[file.to_path_buf()]).await?;
    let chunker = Chunker::new();
    let mut chunks = Vec::new();
    for unit in &units {
        chunks.extend(chunker.chunk_units(unit, &strategy)?);
    }
    tracing::info!(file = %file.display(), chunks = chunks.len(), "chunked file");
    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}
