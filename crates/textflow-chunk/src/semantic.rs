//! Structure-aware splitting: paragraphs, headings and list blocks become the
//! preferred boundaries, and chunks are nudged onto sentence ends.

use std::sync::LazyLock;

use regex::Regex;
use textflow_core::TextUnit;

use crate::config::SemanticConfig;
use crate::error::ChunkError;
use crate::length::{CharLength, LengthFunction};
use crate::splitter::{attach_overlap, core_segments};
use crate::types::{Chunk, ChunkMethod, build_chunks};

static INLINE_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*+]|\d+[.)])\s").expect("valid regex"));

/// Boundaries produced by the normalization pre-pass, tried before generic separators.
const STRUCTURAL_SEPARATORS: [&str; 2] = ["\n\n", "\n"];
const SENTENCE_SEPARATORS: [&str; 3] = [". ", "! ", "? "];

/// Fraction of a chunk's tail searched for a sentence boundary.
const SENTENCE_TAIL_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct SemanticSplitter {
    config: SemanticConfig,
}

impl SemanticSplitter {
    #[must_use]
    pub fn new(config: SemanticConfig) -> Self {
        Self { config }
    }

    /// # Errors
    ///
    /// Returns `ChunkError::InvalidConfig` if the overlap is not smaller than the size.
    pub fn split(&self, unit: &TextUnit) -> Result<Vec<Chunk>, ChunkError> {
        self.config.base.validate()?;
        let normalized = normalize_structure(&unit.content);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let base = &self.config.base;
        let length = CharLength;
        let pieces = if length.measure(&normalized) <= base.effective_size() {
            vec![normalized]
        } else {
            let separators = self.separators();
            let cores = core_segments(
                &normalized,
                &separators,
                base.keep_separator,
                base.core_budget(),
                &length,
            );
            let budget = base.core_budget();
            let cores = carry_partial_sentences(cores, budget, &length);
            let cores = merge_small(cores, self.config.min_chunk_size, budget, &length);
            let cores = cores.into_iter().map(|c| collapse_blank_lines(&c)).collect();
            attach_overlap(cores, base.chunk_overlap, &length)
        };

        tracing::debug!(chunks = pieces.len(), "semantic split");
        Ok(build_chunks(unit, pieces, ChunkMethod::Semantic))
    }

    fn separators(&self) -> Vec<String> {
        let mut separators: Vec<String> = STRUCTURAL_SEPARATORS
            .iter()
            .chain(SENTENCE_SEPARATORS.iter())
            .map(|s| (*s).to_owned())
            .collect();
        for sep in &self.config.base.separators {
            if !separators.contains(sep) {
                separators.push(sep.clone());
            }
        }
        if !separators.iter().any(String::is_empty) {
            separators.push(String::new());
        }
        separators
    }
}

fn is_list_item(line: &str) -> bool {
    LIST_ITEM.is_match(line.trim_start())
}

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Normalize whitespace and force blank lines around headings and list blocks so they
/// surface as paragraph boundaries.
pub(crate) fn normalize_structure(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out: Vec<String> = Vec::new();
    let mut prev_list = false;

    for raw in text.lines() {
        let line = INLINE_WS.replace_all(raw, " ").trim_end().to_owned();
        let blank = line.is_empty();
        let list = !blank && is_list_item(&line);
        let prev_blank = out.last().is_none_or(String::is_empty);

        if !blank && !prev_blank && (is_heading(&line) || list != prev_list) {
            out.push(String::new());
        }
        prev_list = list;
        out.push(line);
    }

    let joined = out.join("\n");
    BLANK_RUNS.replace_all(joined.trim(), "\n\n").into_owned()
}

fn collapse_blank_lines(text: &str) -> String {
    BLANK_RUNS.replace_all(text, "\n\n").into_owned()
}

/// Byte offset where the trailing partial sentence of `text` starts, if the last
/// sentence boundary lies within the final fifth of the text.
fn partial_sentence_start(text: &str) -> Option<usize> {
    let trimmed = text.trim_end();
    if trimmed.is_empty() || trimmed.ends_with(['.', '!', '?']) {
        return None;
    }
    let boundary = trimmed
        .char_indices()
        .zip(trimmed.chars().skip(1))
        .filter(|((_, c), next)| matches!(c, '.' | '!' | '?') && next.is_whitespace())
        .map(|((i, _), _)| i + 1)
        .last()?;
    let rest = &trimmed[boundary..];
    let start = boundary + (rest.len() - rest.trim_start().len());

    #[allow(clippy::cast_precision_loss)]
    let threshold = trimmed.len() as f64 * (1.0 - SENTENCE_TAIL_FRACTION);
    #[allow(clippy::cast_precision_loss)]
    let past_threshold = boundary as f64 >= threshold;
    (past_threshold && start < text.len()).then_some(start)
}

/// Move a trailing partial sentence to the front of the next segment, as long as the
/// next segment stays within `budget`.
fn carry_partial_sentences(
    mut cores: Vec<String>,
    budget: usize,
    length: &dyn LengthFunction,
) -> Vec<String> {
    for i in 0..cores.len().saturating_sub(1) {
        let Some(start) = partial_sentence_start(&cores[i]) else {
            continue;
        };
        let tail_len = length.measure(&cores[i][start..]);
        if tail_len + length.measure(&cores[i + 1]) > budget {
            continue;
        }
        let tail = cores[i].split_off(start);
        cores[i + 1].insert_str(0, &tail);
    }
    cores.retain(|c| !c.is_empty());
    cores
}

/// Merge segments shorter than `min_size` into the previous segment, or into the next
/// one when there is no previous. A merge that would exceed `budget` is skipped and the
/// small segment is kept on its own.
fn merge_small(
    cores: Vec<String>,
    min_size: usize,
    budget: usize,
    length: &dyn LengthFunction,
) -> Vec<String> {
    let fits = |a: &str, b: &str| length.measure(a) + length.measure(b) <= budget;
    let mut merged: Vec<String> = Vec::with_capacity(cores.len());
    let mut pending: Option<String> = None;
    for core in cores {
        let core = match pending.take() {
            Some(mut head) if fits(&head, &core) => {
                head.push_str(&core);
                head
            }
            Some(head) => {
                merged.push(head);
                core
            }
            None => core,
        };
        if length.measure(&core) >= min_size {
            merged.push(core);
            continue;
        }
        match merged.last_mut() {
            Some(prev) if fits(prev, &core) => prev.push_str(&core),
            Some(_) => merged.push(core),
            None => pending = Some(core),
        }
    }
    if let Some(rest) = pending {
        merged.push(rest);
    }
    merged
}
