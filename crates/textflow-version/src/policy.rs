use serde::{Deserialize, Serialize};

/// How version ids are minted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// `v{n}-{unix_millis}`
    #[default]
    Timestamp,
    /// `v{n}-{first 8 hex chars of the content hash}`
    Hash,
    /// `v{n}`
    Incremental,
}

impl IdStrategy {
    #[must_use]
    pub fn version_id(self, number: u64, content_hash: &str, unix_millis: i64) -> String {
        match self {
            Self::Timestamp => format!("v{number}-{unix_millis}"),
            Self::Hash => format!("v{number}-{}", &content_hash[..content_hash.len().min(8)]),
            Self::Incremental => format!("v{number}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub id_strategy: IdStrategy,
    /// Keep at most this many versions per document; oldest are dropped first.
    #[serde(default)]
    pub max_versions: Option<usize>,
    /// Metadata key holding an explicit logical document id.
    #[serde(default = "default_document_id_key")]
    pub document_id_key: String,
}

fn default_document_id_key() -> String {
    "document_id".into()
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            id_strategy: IdStrategy::default(),
            max_versions: None,
            document_id_key: default_document_id_key(),
        }
    }
}

impl VersionPolicy {
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_max_versions(mut self, max: usize) -> Self {
        self.max_versions = Some(max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_strategies() {
        let hash = "abcdef0123456789";
        assert_eq!(IdStrategy::Timestamp.version_id(3, hash, 1_700_000_000_000), "v3-1700000000000");
        assert_eq!(IdStrategy::Hash.version_id(3, hash, 0), "v3-abcdef01");
        assert_eq!(IdStrategy::Incremental.version_id(3, hash, 0), "v3");
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: VersionPolicy = serde_json::from_str(r#"{"enabled": true, "id_strategy": "hash"}"#).unwrap();
        assert!(policy.enabled);
        assert_eq!(policy.id_strategy, IdStrategy::Hash);
        assert_eq!(policy.max_versions, None);
        assert_eq!(policy.document_id_key, "document_id");
    }

    #[test]
    fn default_is_disabled() {
        assert!(!VersionPolicy::default().enabled);
        assert!(VersionPolicy::enabled().enabled);
    }
}
