#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("argument \"{0}\" is not optional but resolved no variables")]
    Unresolvable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum VariableError {
    #[error("variable \"{0}\" is not optional but missing from the assignment")]
    Missing(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CallstringError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error(transparent)]
    Variable(#[from] VariableError),
}

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("invalid instance path \"{path}\": {source}")]
    Walk { path: String, #[source] source: walkdir::Error },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to parse configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}
