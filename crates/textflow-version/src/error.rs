#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("versioning is disabled")]
    VersioningDisabled,

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("version not found: {document_id}/{version_id}")]
    VersionNotFound {
        document_id: String,
        version_id: String,
    },

    #[error("versions not found for {document_id}: {missing:?}")]
    VersionsNotFound {
        document_id: String,
        missing: Vec<String>,
    },

    #[error("version store lock poisoned")]
    LockPoisoned,

    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
