use std::time::Duration;

use textflow_core::{Metadata, MetadataValue, TextUnit};

use crate::BoxFuture;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("extractor {extractor} failed: {message}")]
    Failed { extractor: String, message: String },

    #[error("invalid extractor config: {0}")]
    InvalidConfig(String),
}

/// Produces a metadata fragment for a unit. The engine merges the fragment into the
/// unit's metadata, fragment keys winning.
pub trait MetadataExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract<'a>(
        &'a self,
        unit: &'a TextUnit,
        config: &'a Metadata,
    ) -> BoxFuture<'a, Result<Metadata, ExtractError>>;
}

/// Word, line, sentence, paragraph and character counts.
///
/// Config: `prefix` (text) is prepended to every key.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsExtractor;

impl StatsExtractor {
    fn stats(content: &str) -> [(&'static str, usize); 5] {
        let sentences = content
            .split_inclusive(['.', '!', '?'])
            .filter(|s| s.trim().chars().any(char::is_alphanumeric))
            .count();
        let paragraphs = content
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .count();
        [
            ("char_count", content.chars().count()),
            ("word_count", content.split_whitespace().count()),
            ("line_count", content.lines().count()),
            ("sentence_count", sentences),
            ("paragraph_count", paragraphs),
        ]
    }
}

impl MetadataExtractor for StatsExtractor {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn extract<'a>(
        &'a self,
        unit: &'a TextUnit,
        config: &'a Metadata,
    ) -> BoxFuture<'a, Result<Metadata, ExtractError>> {
        Box::pin(async move {
            let prefix = match config.get("prefix") {
                None => "",
                Some(MetadataValue::Text(p)) => p.as_str(),
                Some(other) => {
                    return Err(ExtractError::InvalidConfig(format!(
                        "prefix must be text, got {other}"
                    )));
                }
            };
            Ok(Self::stats(&unit.content)
                .into_iter()
                .map(|(key, value)| (format!("{prefix}{key}"), MetadataValue::from(value)))
                .collect())
        })
    }
}

/// Run `extractor` over `units` in batches of `batch_size`, sleeping `delay` between
/// batches. Units within a batch are processed concurrently.
///
/// # Errors
///
/// Returns the first extractor error.
pub async fn extract_batched(
    extractor: &dyn MetadataExtractor,
    units: Vec<TextUnit>,
    config: &Metadata,
    batch_size: usize,
    delay: Duration,
) -> Result<Vec<TextUnit>, ExtractError> {
    let batch_size = batch_size.max(1);
    let total_batches = units.len().div_ceil(batch_size);
    let mut out = Vec::with_capacity(units.len());

    for (i, batch) in units.chunks(batch_size).enumerate() {
        let fragments = futures::future::try_join_all(
            batch.iter().map(|unit| extractor.extract(unit, config)),
        )
        .await?;
        for (unit, fragment) in batch.iter().zip(fragments) {
            let mut enriched = unit.clone();
            enriched.metadata.extend(fragment);
            out.push(enriched);
        }
        tracing::debug!(
            extractor = extractor.name(),
            batch = i + 1,
            total_batches,
            "extracted batch"
        );
        if i + 1 < total_batches && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    Ok(out)
}
