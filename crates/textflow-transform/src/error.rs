use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("unknown transform: {0}")]
    UnknownTransform(String),

    #[error("no resolvable transforms in chain: {0}")]
    UnknownChain(String),

    #[error("transform timed out after {0:?}")]
    Timeout(Duration),

    #[error("transform failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<TransformError>,
    },

    #[error("transform {name} failed: {message}")]
    Failed { name: String, message: String },

    #[error("transform registry lock poisoned")]
    LockPoisoned,
}

impl TransformError {
    #[must_use]
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            name: name.into(),
            message: message.into(),
        }
    }
}
