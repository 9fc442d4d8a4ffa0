#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid chunk config: {0}")]
    InvalidConfig(String),
}
