use crate::unit::TextUnit;

/// Merge outputs of stages (or chains) that ran independently on the same input.
///
/// When every output keeps the input's length the merge is positional: metadata is
/// layered in declaration order so a later output wins on conflicting keys, and the
/// content comes from the last output whose content differs from the original.
/// When any output changes the unit count, the last output that differs from the
/// input is taken as a whole.
#[must_use]
pub fn merge_parallel_outputs(original: &[TextUnit], outputs: Vec<Vec<TextUnit>>) -> Vec<TextUnit> {
    if outputs.is_empty() {
        return original.to_vec();
    }

    if outputs.iter().any(|out| out.len() != original.len()) {
        return outputs
            .into_iter()
            .rev()
            .find(|out| out.as_slice() != original)
            .unwrap_or_else(|| original.to_vec());
    }

    original
        .iter()
        .enumerate()
        .map(|(i, base)| {
            let mut merged = base.clone();
            for out in &outputs {
                let candidate = &out[i];
                for (key, value) in &candidate.metadata {
                    merged.metadata.insert(key.clone(), value.clone());
                }
                if candidate.content != base.content {
                    merged.content.clone_from(&candidate.content);
                }
            }
            merged
        })
        .collect()
}
