mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use textflow_core::Backoff;

use crate::engine::{EngineSettings, PipelineEngine};
use crate::loader::TextLoader;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error for zero batch size or history limit, duplicate chain or
    /// pipeline names, fallbacks naming unknown pipelines, or an invalid pipeline.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.engine.history_limit == 0 {
            bail!("engine.history_limit must be at least 1");
        }
        if self.engine.batch_size == 0 {
            bail!("engine.batch_size must be at least 1");
        }
        if self.engine.retry_base_ms > self.engine.retry_max_ms {
            bail!(
                "engine.retry_base_ms ({}) exceeds engine.retry_max_ms ({})",
                self.engine.retry_base_ms,
                self.engine.retry_max_ms
            );
        }

        let mut chains = HashSet::new();
        for chain in &self.chains {
            if !chains.insert(chain.name.as_str()) {
                bail!("duplicate chain {}", chain.name);
            }
            if chain.transforms.is_empty() {
                bail!("chain {} has no transforms", chain.name);
            }
        }

        let mut names = HashSet::new();
        for pipeline in &self.pipelines {
            if !names.insert(pipeline.name.as_str()) {
                bail!("duplicate pipeline {}", pipeline.name);
            }
            pipeline
                .validate()
                .with_context(|| format!("invalid pipeline {}", pipeline.name))?;
        }
        for pipeline in &self.pipelines {
            if let Some(fallback) = pipeline.fallback()
                && !names.contains(fallback)
            {
                bail!(
                    "pipeline {} falls back to unknown pipeline {fallback}",
                    pipeline.name
                );
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            history_limit: self.engine.history_limit,
            batch_size: self.engine.batch_size,
            batch_delay: Duration::from_millis(self.engine.batch_delay_ms),
            backoff: Backoff::new(
                Duration::from_millis(self.engine.retry_base_ms),
                Duration::from_millis(self.engine.retry_max_ms),
            ),
        }
    }

    /// Validate, then build an engine with every configured chain and pipeline
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or a chain resolves to no transforms.
    pub fn build_engine(&self) -> anyhow::Result<PipelineEngine> {
        self.validate()?;
        let engine = PipelineEngine::new(self.settings());
        engine.register_loader(Arc::new(TextLoader::new(self.engine.max_file_size)));

        for chain in &self.chains {
            engine
                .composer()
                .register_chain(chain.name.clone(), &chain.transforms)
                .with_context(|| format!("failed to register chain {}", chain.name))?;
        }
        for pipeline in &self.pipelines {
            engine
                .register_pipeline(pipeline.clone())
                .with_context(|| format!("failed to register pipeline {}", pipeline.name))?;
        }
        tracing::info!(
            chains = self.chains.len(),
            pipelines = self.pipelines.len(),
            "pipeline engine ready"
        );
        Ok(engine)
    }
}
