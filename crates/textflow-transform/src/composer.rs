use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use textflow_core::{Backoff, RetryError, RetryPolicy, TextUnit, merge_parallel_outputs};

use crate::error::TransformError;

/// A named pure transform. Consumes a unit and yields a new one.
pub type TransformFn = Arc<dyn Fn(TextUnit) -> Result<TextUnit, TransformError> + Send + Sync>;

/// Ordered list of resolved transforms.
#[derive(Clone, Default)]
pub struct ComposedChain {
    names: Vec<String>,
    steps: Vec<TransformFn>,
}

impl std::fmt::Debug for ComposedChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedChain")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl ComposedChain {
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every transform in order.
    ///
    /// # Errors
    ///
    /// Returns the first transform error.
    pub fn apply(&self, unit: TextUnit) -> Result<TextUnit, TransformError> {
        self.steps.iter().try_fold(unit, |unit, step| step(unit))
    }

    /// Like [`ComposedChain::apply`], yielding to the runtime between steps so a
    /// surrounding timeout can fire.
    async fn apply_yielding(&self, mut unit: TextUnit) -> Result<TextUnit, TransformError> {
        for step in &self.steps {
            unit = step(unit)?;
            tokio::task::yield_now().await;
        }
        Ok(unit)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    pub timeout: Option<Duration>,
    /// Extra attempts after the first one.
    pub retries: u32,
    pub backoff: Backoff,
}

impl ExecuteOptions {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32, backoff: Backoff) -> Self {
        self.retries = retries;
        self.backoff = backoff;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformStats {
    pub original_length: usize,
    pub transformed_length: usize,
    pub length_delta: i64,
    /// `transformed / original`; 1.0 for empty input.
    pub compression_ratio: f64,
    pub metadata_keys_added: Vec<String>,
    pub attempts: u32,
    pub duration: Duration,
}

impl TransformStats {
    fn measure(before: &TextUnit, after: &TextUnit, attempts: u32, duration: Duration) -> Self {
        let original_length = before.char_len();
        let transformed_length = after.char_len();
        #[allow(clippy::cast_possible_wrap)]
        let length_delta = transformed_length as i64 - original_length as i64;
        #[allow(clippy::cast_precision_loss)]
        let compression_ratio = if original_length == 0 {
            1.0
        } else {
            transformed_length as f64 / original_length as f64
        };
        let metadata_keys_added = after
            .metadata
            .keys()
            .filter(|k| !before.metadata.contains_key(*k))
            .cloned()
            .collect();
        Self {
            original_length,
            transformed_length,
            length_delta,
            compression_ratio,
            metadata_keys_added,
            attempts,
            duration,
        }
    }
}

/// Result of [`ChainComposer::execute`]. On failure `unit` is the original input.
#[derive(Debug)]
pub struct TransformOutcome {
    pub chain: String,
    pub unit: TextUnit,
    pub success: bool,
    pub error: Option<TransformError>,
    pub stats: TransformStats,
}

#[derive(Debug)]
pub struct ParallelOutcome {
    /// Merged unit; the original when every chain failed or changed nothing.
    pub unit: TextUnit,
    pub outcomes: Vec<TransformOutcome>,
}

impl ParallelOutcome {
    #[must_use]
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }
}

/// Registry of named transforms and named chains.
#[derive(Default)]
pub struct ChainComposer {
    transforms: RwLock<HashMap<String, TransformFn>>,
    chains: RwLock<HashMap<String, ComposedChain>>,
}

impl std::fmt::Debug for ChainComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainComposer")
            .field("transforms", &self.transform_names())
            .field("chains", &self.chain_names())
            .finish()
    }
}

impl ChainComposer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Composer preloaded with the built-in normalizers.
    #[must_use]
    pub fn with_builtins() -> Self {
        let composer = Self::new();
        crate::builtin::register_builtins(&composer);
        composer
    }

    /// Register a transform. A later registration under the same name replaces it.
    pub fn register<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(TextUnit) -> Result<TextUnit, TransformError> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut transforms = self
            .transforms
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if transforms.insert(name.clone(), Arc::new(f)).is_some() {
            tracing::debug!(transform = %name, "replaced transform");
        }
    }

    /// Resolve `names` into a chain. Unknown names are skipped.
    ///
    /// # Errors
    ///
    /// Returns `TransformError::UnknownChain` when no name resolves.
    pub fn compose<S: AsRef<str>>(&self, names: &[S]) -> Result<ComposedChain, TransformError> {
        let transforms = self
            .transforms
            .read()
            .map_err(|_| TransformError::LockPoisoned)?;
        let mut chain = ComposedChain::default();
        for name in names {
            let name = name.as_ref();
            match transforms.get(name) {
                Some(f) => {
                    chain.names.push(name.to_owned());
                    chain.steps.push(Arc::clone(f));
                }
                None => tracing::warn!(transform = name, "unknown transform skipped"),
            }
        }
        if chain.is_empty() {
            let requested: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
            return Err(TransformError::UnknownChain(requested.join(", ")));
        }
        Ok(chain)
    }

    /// Compose `names` and store the chain under `name`.
    ///
    /// # Errors
    ///
    /// Returns `TransformError::UnknownChain` when no name resolves.
    pub fn register_chain<S: AsRef<str>>(
        &self,
        name: impl Into<String>,
        names: &[S],
    ) -> Result<(), TransformError> {
        let chain = self.compose(names)?;
        let name = name.into();
        tracing::debug!(chain = %name, steps = chain.len(), "registered chain");
        self.chains
            .write()
            .map_err(|_| TransformError::LockPoisoned)?
            .insert(name, chain);
        Ok(())
    }

    /// A registered chain, or a single registered transform of that name.
    #[must_use]
    pub fn chain(&self, name: &str) -> Option<ComposedChain> {
        if let Some(chain) = self
            .chains
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
        {
            return Some(chain.clone());
        }
        self.compose(&[name]).ok()
    }

    #[must_use]
    pub fn chain_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .chains
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn transform_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .transforms
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Run the chain named `chain` over `unit`. Never fails: errors are reported in the
    /// outcome alongside the original unit.
    pub async fn execute(&self, unit: &TextUnit, chain: &str, opts: &ExecuteOptions) -> TransformOutcome {
        match self.chain(chain) {
            Some(resolved) => Self::execute_chain(unit, chain, &resolved, opts).await,
            None => {
                tracing::warn!(chain, "unknown chain");
                TransformOutcome {
                    chain: chain.to_owned(),
                    unit: unit.clone(),
                    success: false,
                    error: Some(TransformError::UnknownChain(chain.to_owned())),
                    stats: TransformStats::measure(unit, unit, 0, Duration::ZERO),
                }
            }
        }
    }

    /// Run an already composed chain with timeout and retry wrapping.
    pub async fn execute_chain(
        unit: &TextUnit,
        label: &str,
        chain: &ComposedChain,
        opts: &ExecuteOptions,
    ) -> TransformOutcome {
        let started = Instant::now();
        let policy = RetryPolicy::new(opts.retries.saturating_add(1), opts.backoff);

        let result = policy
            .run(move |_| {
                let fut = chain.apply_yielding(unit.clone());
                let timeout = opts.timeout;
                async move {
                    match timeout {
                        Some(limit) => tokio::time::timeout(limit, fut)
                            .await
                            .map_err(|_| TransformError::Timeout(limit))?,
                        None => fut.await,
                    }
                }
            })
            .await;

        match result {
            Ok((transformed, attempts)) => {
                let stats = TransformStats::measure(unit, &transformed, attempts, started.elapsed());
                tracing::debug!(
                    chain = label,
                    attempts,
                    length_delta = stats.length_delta,
                    "chain applied"
                );
                TransformOutcome {
                    chain: label.to_owned(),
                    unit: transformed,
                    success: true,
                    error: None,
                    stats,
                }
            }
            Err(err) => {
                let attempts = err.attempts();
                let error = match err {
                    RetryError::Exhausted { attempts, last } if attempts > 1 => {
                        TransformError::RetryExhausted {
                            attempts,
                            last: Box::new(last),
                        }
                    }
                    other => other.into_inner(),
                };
                tracing::warn!(chain = label, attempts, "chain failed: {error}");
                TransformOutcome {
                    chain: label.to_owned(),
                    unit: unit.clone(),
                    success: false,
                    error: Some(error),
                    stats: TransformStats::measure(unit, unit, attempts, started.elapsed()),
                }
            }
        }
    }

    /// Run several chains concurrently on the same input and merge their outputs.
    /// Failed chains contribute nothing to the merge.
    pub async fn execute_parallel<S: AsRef<str>>(
        &self,
        unit: &TextUnit,
        chains: &[S],
        opts: &ExecuteOptions,
    ) -> ParallelOutcome {
        let outcomes = futures::future::join_all(
            chains.iter().map(|name| self.execute(unit, name.as_ref(), opts)),
        )
        .await;

        let outputs = outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| vec![o.unit.clone()])
            .collect();
        let unit = merge_parallel_outputs(std::slice::from_ref(unit), outputs)
            .pop()
            .unwrap_or_else(|| unit.clone());

        ParallelOutcome { unit, outcomes }
    }
}
