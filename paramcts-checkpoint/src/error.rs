#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("failed to create checkpoint directory {path}: {source}")]
    CreateDir { path: String, #[source] source: std::io::Error },
    #[error("failed to write checkpoint {path}: {source}")]
    Write { path: String, #[source] source: std::io::Error },
    #[error("failed to serialize checkpoint: {0}")]
    Encode(#[from] bincode::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read checkpoint {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to decompress checkpoint: {0}")]
    Decompress(std::io::Error),
    #[error("failed to deserialize checkpoint: {0}")]
    Decode(#[from] bincode::Error),
}
