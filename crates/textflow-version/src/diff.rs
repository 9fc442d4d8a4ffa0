use std::collections::HashSet;

use serde::Serialize;
use textflow_core::Metadata;

use crate::types::Version;

/// A line that changed in place: same position, different text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineChange {
    /// One-based line number.
    pub line: usize,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

impl MetadataDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionComparison {
    pub document_id: String,
    pub from: String,
    pub to: String,
    /// Lines present in `to` but not in `from`.
    pub added: Vec<String>,
    /// Lines present in `from` but not in `to`.
    pub removed: Vec<String>,
    pub modified: Vec<LineChange>,
    pub metadata: MetadataDiff,
    /// In `[0, 1]`; 1.0 for identical content.
    pub similarity: f64,
    pub unified_diff: String,
}

impl VersionComparison {
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.metadata.is_empty()
    }
}

pub(crate) fn compare(document_id: &str, from: &Version, to: &Version) -> VersionComparison {
    let old = &from.unit.content;
    let new = &to.unit.content;
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let old_set: HashSet<&str> = old_lines.iter().copied().collect();
    let new_set: HashSet<&str> = new_lines.iter().copied().collect();

    let added = unique_missing(&new_lines, &old_set);
    let removed = unique_missing(&old_lines, &new_set);
    let modified = old_lines
        .iter()
        .zip(&new_lines)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, (a, b))| LineChange {
            line: i + 1,
            before: (*a).to_owned(),
            after: (*b).to_owned(),
        })
        .collect();

    let unified_diff = similar::TextDiff::from_lines(old.as_str(), new.as_str())
        .unified_diff()
        .header(&from.id, &to.id)
        .to_string();

    VersionComparison {
        document_id: document_id.to_owned(),
        from: from.id.clone(),
        to: to.id.clone(),
        added,
        removed,
        modified,
        metadata: metadata_diff(&from.unit.metadata, &to.unit.metadata),
        similarity: similarity(old, new),
        unified_diff,
    }
}

/// Lines of `lines` absent from `other`, first occurrence only, in order.
fn unique_missing(lines: &[&str], other: &HashSet<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .iter()
        .filter(|l| !other.contains(*l) && seen.insert(**l))
        .map(|l| (*l).to_owned())
        .collect()
}

fn metadata_diff(old: &Metadata, new: &Metadata) -> MetadataDiff {
    let mut diff = MetadataDiff::default();
    for (key, value) in new {
        match old.get(key) {
            None => diff.added.push(key.clone()),
            Some(prev) if prev != value => diff.modified.push(key.clone()),
            Some(_) => {}
        }
    }
    diff.removed = old.keys().filter(|k| !new.contains_key(*k)).cloned().collect();
    diff
}

/// Character-level edit distance.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized similarity `(longer - distance) / longer`; 1.0 when identical.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let longer = a.chars().count().max(b.chars().count());
    if longer == 0 {
        return 1.0;
    }
    let distance = levenshtein(a, b);
    #[allow(clippy::cast_precision_loss)]
    let score = (longer - distance) as f64 / longer as f64;
    score.clamp(0.0, 1.0)
}
