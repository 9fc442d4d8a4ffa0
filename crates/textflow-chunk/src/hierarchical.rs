use textflow_core::TextUnit;

use crate::config::HierarchicalConfig;
use crate::error::ChunkError;
use crate::splitter::TextSplitter;
use crate::types::{Chunk, ChunkMethod};

/// Two-level chunking result. Children point at parents through `parent_id`;
/// parents hold no references to their children.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    pub parents: Vec<Chunk>,
    pub children: Vec<Chunk>,
}

impl Hierarchy {
    /// Children of the parent with `parent_id`, in order.
    pub fn children_of<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a Chunk> + 'a {
        self.children
            .iter()
            .filter(move |c| c.parent_id.as_deref() == Some(parent_id))
    }

    /// Flatten into one list: parents first (when requested), then children.
    #[must_use]
    pub fn into_chunks(self, include_parents: bool) -> Vec<Chunk> {
        let mut out = if include_parents {
            self.parents
        } else {
            Vec::new()
        };
        out.extend(self.children);
        out
    }
}

#[derive(Debug)]
pub struct HierarchicalSplitter {
    config: HierarchicalConfig,
    parent: TextSplitter,
    child: TextSplitter,
}

impl HierarchicalSplitter {
    #[must_use]
    pub fn new(config: HierarchicalConfig) -> Self {
        let parent = TextSplitter::new(config.parent.clone());
        let child = TextSplitter::new(config.child.clone());
        Self {
            config,
            parent,
            child,
        }
    }

    #[must_use]
    pub fn config(&self) -> &HierarchicalConfig {
        &self.config
    }

    /// # Errors
    ///
    /// Returns `ChunkError::InvalidConfig` if either level config is invalid.
    pub fn split(&self, unit: &TextUnit) -> Result<Hierarchy, ChunkError> {
        self.config.validate()?;
        let hash = unit.content_hash();
        let prefix = &hash[..8];

        let mut hierarchy = Hierarchy::default();
        for mut parent in self.parent.split(unit)? {
            let parent_id = format!("{prefix}-p{}", parent.index);
            parent.method = ChunkMethod::Hierarchical;
            parent.id = Some(parent_id.clone());
            parent.level = Some(0);

            let parent_unit = TextUnit {
                content: parent.content.clone(),
                metadata: unit.metadata.clone(),
            };
            for mut child in self.child.split(&parent_unit)? {
                child.method = ChunkMethod::Hierarchical;
                child.parent_id = Some(parent_id.clone());
                child.level = Some(1);
                hierarchy.children.push(child);
            }
            hierarchy.parents.push(parent);
        }

        tracing::debug!(
            parents = hierarchy.parents.len(),
            children = hierarchy.children.len(),
            "hierarchical split"
        );
        Ok(hierarchy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkConfig;

    fn config() -> HierarchicalConfig {
        HierarchicalConfig {
            parent: ChunkConfig::new(60, 0),
            child: ChunkConfig::new(20, 0),
            include_parents: true,
        }
    }

    fn text() -> String {
        "The quick brown fox jumps over the lazy dog. ".repeat(6)
    }

    #[test]
    fn every_child_references_an_existing_parent() {
        let hierarchy = HierarchicalSplitter::new(config())
            .split(&TextUnit::new(text()))
            .unwrap();
        assert!(hierarchy.parents.len() > 1);
        assert!(hierarchy.children.len() > hierarchy.parents.len());
        for child in &hierarchy.children {
            let parent_id = child.parent_id.as_deref().unwrap();
            assert!(hierarchy.parents.iter().any(|p| p.id.as_deref() == Some(parent_id)));
            assert_eq!(child.level, Some(1));
        }
        assert!(hierarchy.parents.iter().all(|p| p.level == Some(0)));
    }

    #[test]
    fn children_reassemble_their_parent() {
        let hierarchy = HierarchicalSplitter::new(config())
            .split(&TextUnit::new(text()))
            .unwrap();
        for parent in &hierarchy.parents {
            let id = parent.id.as_deref().unwrap();
            let joined: String = hierarchy.children_of(id).map(|c| c.content.as_str()).collect();
            assert_eq!(joined, parent.content);
        }
    }

    #[test]
    fn parent_ids_are_stable_across_runs() {
        let splitter = HierarchicalSplitter::new(config());
        let a = splitter.split(&TextUnit::new(text())).unwrap();
        let b = splitter.split(&TextUnit::new(text())).unwrap();
        let ids = |h: &Hierarchy| h.parents.iter().map(|p| p.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn flatten_without_parents() {
        let hierarchy = HierarchicalSplitter::new(config())
            .split(&TextUnit::new(text()))
            .unwrap();
        let children = hierarchy.children.len();
        let flat = hierarchy.into_chunks(false);
        assert_eq!(flat.len(), children);
        assert!(flat.iter().all(|c| c.level == Some(1)));
    }

    #[test]
    fn empty_unit_has_no_levels() {
        let hierarchy = HierarchicalSplitter::new(config())
            .split(&TextUnit::new(""))
            .unwrap();
        assert!(hierarchy.parents.is_empty());
        assert!(hierarchy.children.is_empty());
    }
}
