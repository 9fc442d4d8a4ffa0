use std::ops::Range;
use std::sync::Arc;

use textflow_core::TextUnit;

use crate::config::ChunkConfig;
use crate::error::ChunkError;
use crate::length::{CharLength, LengthFunction};
use crate::types::{Chunk, ChunkMethod, build_chunks};

/// Recursive separator splitter. Measures characters by default; a custom
/// [`LengthFunction`] turns it into the token-measured variant.
pub struct TextSplitter {
    config: ChunkConfig,
    length: Arc<dyn LengthFunction>,
    method: ChunkMethod,
}

impl std::fmt::Debug for TextSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSplitter")
            .field("config", &self.config)
            .field("length", &self.length.name())
            .field("method", &self.method)
            .finish()
    }
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            length: Arc::new(CharLength),
            method: ChunkMethod::Recursive,
        }
    }

    /// Token-measured splitter: `chunk_size` and `chunk_overlap` count tokens.
    #[must_use]
    pub fn with_tokens(config: ChunkConfig, length: Arc<dyn LengthFunction>) -> Self {
        Self {
            config,
            length,
            method: ChunkMethod::Token,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// # Errors
    ///
    /// Returns `ChunkError::InvalidConfig` if the overlap is not smaller than the size.
    pub fn split(&self, unit: &TextUnit) -> Result<Vec<Chunk>, ChunkError> {
        self.config.validate()?;
        let pieces = self.split_text(&unit.content);
        tracing::debug!(
            method = %self.method,
            chunks = pieces.len(),
            chunk_size = self.config.chunk_size,
            "split unit"
        );
        Ok(build_chunks(unit, pieces, self.method))
    }

    pub(crate) fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let length = self.length.as_ref();
        if length.measure(text) <= self.config.effective_size() {
            return vec![text.to_owned()];
        }
        let cores = core_segments(
            text,
            &self.config.separators,
            self.config.keep_separator,
            self.config.core_budget(),
            length,
        );
        attach_overlap(cores, self.config.chunk_overlap, length)
    }
}

/// Split `text` into segments that each measure at most `budget`.
///
/// With `keep_separator` the segments tile the input exactly.
pub(crate) fn core_segments(
    text: &str,
    separators: &[String],
    keep_separator: bool,
    budget: usize,
    length: &dyn LengthFunction,
) -> Vec<String> {
    let mut ranges = Vec::new();
    split_ranges(text, 0, separators, keep_separator, budget, length, &mut ranges);
    ranges
        .into_iter()
        .map(|r| text[r].to_owned())
        .filter(|s| keep_separator || !s.trim().is_empty())
        .collect()
}

fn split_ranges(
    text: &str,
    offset: usize,
    separators: &[String],
    keep_separator: bool,
    budget: usize,
    length: &dyn LengthFunction,
    out: &mut Vec<Range<usize>>,
) {
    if text.is_empty() {
        return;
    }
    if length.measure(text) <= budget {
        out.push(offset..offset + text.len());
        return;
    }

    let Some(pos) = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
    else {
        hard_slice(text, offset, budget, length, out);
        return;
    };
    let separator = &separators[pos];
    if separator.is_empty() {
        hard_slice(text, offset, budget, length, out);
        return;
    }
    let remaining = &separators[pos + 1..];

    let mut current: Option<Range<usize>> = None;
    for piece in split_pieces(text, separator, keep_separator) {
        let piece_text = &text[piece.clone()];
        if length.measure(piece_text) > budget {
            if let Some(cur) = current.take() {
                out.push(offset + cur.start..offset + cur.end);
            }
            split_ranges(
                piece_text,
                offset + piece.start,
                remaining,
                keep_separator,
                budget,
                length,
                out,
            );
            continue;
        }
        current = match current {
            Some(cur) => {
                let merged = cur.start..piece.end;
                if length.measure(&text[merged.clone()]) <= budget {
                    Some(merged)
                } else {
                    out.push(offset + cur.start..offset + cur.end);
                    Some(piece)
                }
            }
            None => Some(piece),
        };
    }
    if let Some(cur) = current {
        out.push(offset + cur.start..offset + cur.end);
    }
}

/// Byte ranges between occurrences of `separator`. A kept separator stays attached to
/// the end of the preceding piece.
fn split_pieces(text: &str, separator: &str, keep_separator: bool) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(separator) {
        let end = if keep_separator {
            idx + separator.len()
        } else {
            idx
        };
        if end > last {
            pieces.push(last..end);
        }
        last = idx + separator.len();
    }
    if last < text.len() {
        pieces.push(last..text.len());
    }
    pieces
}

fn hard_slice(
    text: &str,
    offset: usize,
    budget: usize,
    length: &dyn LengthFunction,
    out: &mut Vec<Range<usize>>,
) {
    let mut start = 0;
    while start < text.len() {
        let rest = &text[start..];
        let mut end = length.prefix_end(rest, budget);
        if end == 0 {
            // Always make progress, even when one character exceeds the budget.
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        out.push(offset + start..offset + start + end);
        start += end;
    }
}

/// Append to each segment the first `overlap` units of the text that follows it.
///
/// When everything after a segment fits inside the overlap window, it is absorbed and
/// that chunk becomes the last one.
pub(crate) fn attach_overlap(
    cores: Vec<String>,
    overlap: usize,
    length: &dyn LengthFunction,
) -> Vec<String> {
    if overlap == 0 || cores.len() < 2 {
        return cores;
    }

    let mut chunks = Vec::with_capacity(cores.len());
    for (i, core) in cores.iter().enumerate() {
        let mut chunk = core.clone();
        if i + 1 == cores.len() {
            chunks.push(chunk);
            break;
        }

        let mut following = String::new();
        for next in &cores[i + 1..] {
            following.push_str(next);
            if length.measure(&following) > overlap {
                break;
            }
        }

        if length.measure(&following) <= overlap {
            chunk.push_str(&following);
            chunks.push(chunk);
            break;
        }
        let end = length.prefix_end(&following, overlap);
        chunk.push_str(&following[..end]);
        chunks.push(chunk);
    }
    chunks
}
